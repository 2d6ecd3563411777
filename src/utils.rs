//! Utility functions for text handling and Telegram API retries.

use std::future::Future;
use std::time::Duration;
use teloxide::RequestError;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

/// Truncates a string to at most `max_chars` characters, respecting UTF-8 boundaries.
///
/// # Examples
///
/// ```
/// use oxide_sauce::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Splits a message into parts of at most `max_chars` characters.
///
/// Breaks on line boundaries so a line is only cut when it alone exceeds
/// the limit.
///
/// # Examples
///
/// ```
/// use oxide_sauce::utils::split_long_message;
/// let long_msg = "A very long message...\n".repeat(300);
/// let parts = split_long_message(&long_msg, 4000);
/// assert!(parts.len() > 1);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_chars: usize) -> Vec<String> {
    if message.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in message.lines() {
        let line_len = line.chars().count();

        if current_len > 0 && current_len + line_len + 1 > max_chars {
            parts.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for chunk in chars.chunks(max_chars) {
                parts.push(chunk.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current.push('\n');
        current_len += line_len + 1;
    }

    if !current.trim().is_empty() {
        parts.push(current.trim_end().to_string());
    }

    parts
}

/// Whether a Telegram request failure is worth another attempt.
///
/// Only transport-level failures qualify; API rejections are final.
#[must_use]
pub const fn is_transient(error: &RequestError) -> bool {
    matches!(error, RequestError::Network(_) | RequestError::Io(_))
}

/// Retry a Telegram API operation with exponential backoff.
///
/// The retry strategy uses exponential backoff with jitter:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3 (see constants in `config.rs`)
///
/// Only transient network errors are retried, so a message the API already
/// refused is never sent twice.
///
/// # Errors
///
/// Returns the last error if all attempts fail or the error is not transient.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    RetryIf::start(retry_strategy, operation, is_transient)
        .await
        .map_err(|e| {
            warn!("Telegram API operation failed: {e}");
            e
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_split_long_message_keeps_lines_whole() {
        let input = "Source: https://a.test/1\nSource: https://b.test/2\nSource: https://c.test/3";
        let parts = split_long_message(input, 50);
        assert_eq!(
            parts,
            vec![
                "Source: https://a.test/1\nSource: https://b.test/2",
                "Source: https://c.test/3",
            ]
        );
    }

    #[test]
    fn test_split_long_message_cuts_oversized_line() {
        let parts = split_long_message(&"я".repeat(25), 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(parts.concat(), "я".repeat(25));
    }

    #[test]
    fn test_split_long_message_short_input() {
        assert_eq!(split_long_message("hi", 10), vec!["hi"]);
        assert!(split_long_message("", 10).is_empty());
    }

    #[test]
    fn test_api_errors_are_not_transient() {
        let error = RequestError::Api(teloxide::ApiError::BotBlocked);
        assert!(!is_transient(&error));
    }

    #[tokio::test]
    async fn test_retry_stops_on_api_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let result: Result<(), RequestError> = retry_telegram_operation(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RequestError::Api(teloxide::ApiError::BotBlocked)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
