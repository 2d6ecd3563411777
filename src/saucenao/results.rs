use super::{RawResult, SauceNaoError};
use serde_json::Value;

/// Shown when a match names no author
pub const UNKNOWN_AUTHOR: &str = "unknown";
/// Shown when a match has no external link
pub const UNKNOWN_SOURCE: &str = "no source link";

/// Author fields in order of preference
const AUTHOR_FIELDS: &[&str] = &["member_name", "creator"];

/// A ranked match ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Similarity percentage
    pub similarity: f64,
    /// Similarity exactly as the API sent it
    pub similarity_text: String,
    /// Author, or [`UNKNOWN_AUTHOR`]
    pub author: String,
    /// First external link, or [`UNKNOWN_SOURCE`]
    pub source: String,
    /// Thumbnail of the matched image
    pub thumbnail: Option<String>,
}

/// Sorts raw matches by similarity (highest first) and keeps the top `limit`.
///
/// The API is asked for `limit` results already; the cut is repeated here
/// because nothing guarantees the upstream honours it or sorts its output.
/// Ties keep their API order.
///
/// # Errors
///
/// Returns `SauceNaoError::Malformed` if a similarity is not a number.
pub fn rank_results(raw: &[RawResult], limit: usize) -> Result<Vec<SearchResult>, SauceNaoError> {
    let mut scored = raw
        .iter()
        .map(|result| parse_similarity(&result.header.similarity).map(|s| (s, result)))
        .collect::<Result<Vec<_>, _>>()?;

    scored.sort_by(|((a, _), _), ((b, _), _)| b.total_cmp(a));

    Ok(scored
        .into_iter()
        .take(limit)
        .map(|((similarity, similarity_text), result)| SearchResult {
            similarity,
            similarity_text,
            author: extract_author(&result.data),
            source: extract_source(&result.data),
            thumbnail: result
                .header
                .thumbnail
                .clone()
                .filter(|url| !url.trim().is_empty()),
        })
        .collect())
}

/// Numeric score for ranking plus the text to show for it.
fn parse_similarity(value: &Value) -> Result<(f64, String), SauceNaoError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok().map(|n| (n, s.trim().to_string())),
        Value::Number(n) => n.as_f64().map(|f| (f, n.to_string())),
        _ => None,
    };

    parsed
        .filter(|(s, _)| s.is_finite())
        .ok_or_else(|| SauceNaoError::Malformed(format!("invalid similarity: {value}")))
}

fn extract_author(data: &Value) -> String {
    AUTHOR_FIELDS
        .iter()
        .find_map(|field| data.get(field).and_then(author_text))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
}

/// Some indexes send `creator` as a list of names.
fn author_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let names: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    }
}

fn extract_source(data: &Value) -> String {
    data.get("ext_urls")
        .and_then(Value::as_array)
        .and_then(|urls| urls.first())
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .map_or_else(|| UNKNOWN_SOURCE.to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saucenao::RawResultHeader;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(similarity: &str, data: Value) -> RawResult {
        RawResult {
            header: RawResultHeader {
                similarity: json!(similarity),
                thumbnail: None,
            },
            data,
        }
    }

    #[test]
    fn test_rank_orders_and_truncates() -> Result<(), SauceNaoError> {
        let input: Vec<RawResult> = [
            ("12.3", "a"),
            ("99.0", "b"),
            ("45.5", "c"),
            ("99.0", "d"),
            ("10.0", "e"),
            ("50.0", "f"),
        ]
        .iter()
        .map(|(s, name)| raw(s, json!({ "member_name": name })))
        .collect();

        let ranked = rank_results(&input, 5)?;
        let order: Vec<(f64, &str)> = ranked
            .iter()
            .map(|r| (r.similarity, r.author.as_str()))
            .collect();

        assert_eq!(
            order,
            vec![(99.0, "b"), (99.0, "d"), (50.0, "f"), (45.5, "c"), (12.3, "a")]
        );
        assert_eq!(ranked[0].similarity_text, "99.0");
        Ok(())
    }

    #[test]
    fn test_similarity_text_keeps_api_form() -> Result<(), SauceNaoError> {
        let ranked = rank_results(&[raw(" 92.5 ", json!({}))], 5)?;
        assert_eq!(ranked[0].similarity_text, "92.5");
        Ok(())
    }

    #[test]
    fn test_author_fallback_chain() {
        assert_eq!(extract_author(&json!({"member_name": "m", "creator": "c"})), "m");
        assert_eq!(extract_author(&json!({"member_name": "", "creator": "c"})), "c");
        assert_eq!(extract_author(&json!({"creator": ["x", "y"]})), "x, y");
        assert_eq!(extract_author(&json!({"creator": []})), UNKNOWN_AUTHOR);
        assert_eq!(extract_author(&json!({})), UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_source_fallback() {
        assert_eq!(
            extract_source(&json!({"ext_urls": ["https://a.test", "https://b.test"]})),
            "https://a.test"
        );
        assert_eq!(extract_source(&json!({"ext_urls": []})), UNKNOWN_SOURCE);
        assert_eq!(extract_source(&json!({})), UNKNOWN_SOURCE);
    }

    #[test]
    fn test_invalid_similarity_is_malformed() {
        let input = vec![raw("n/a", json!({}))];
        assert!(matches!(
            rank_results(&input, 5),
            Err(SauceNaoError::Malformed(_))
        ));
    }

    #[test]
    fn test_numeric_similarity_accepted() -> Result<(), SauceNaoError> {
        let input = vec![RawResult {
            header: RawResultHeader {
                similarity: json!(88.5),
                thumbnail: Some(String::new()),
            },
            data: json!({}),
        }];
        let ranked = rank_results(&input, 5)?;
        assert!((ranked[0].similarity - 88.5).abs() < f64::EPSILON);
        assert_eq!(ranked[0].similarity_text, "88.5");
        assert_eq!(ranked[0].thumbnail, None);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_ranked_is_sorted_and_capped(
            scores in proptest::collection::vec(0.0f64..100.0, 0..20),
            limit in 0usize..8,
        ) {
            let input: Vec<RawResult> = scores
                .iter()
                .map(|s| raw(&format!("{s:.2}"), json!({})))
                .collect();
            let ranked = rank_results(&input, limit).map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(ranked.len(), scores.len().min(limit));
            prop_assert!(ranked.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        }
    }
}
