//! HTTP client for the SauceNAO search endpoint

use super::{SauceNaoError, SearchBackend, SearchResponse};
use crate::config::{Settings, SAUCENAO_OUTPUT_TYPE_JSON};
use crate::utils::truncate_str;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Creates an HTTP client with a request timeout.
///
/// Without it a stalled SauceNAO request would keep the user waiting forever.
#[must_use]
pub fn create_http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// SauceNAO search over HTTP
pub struct SauceNaoClient {
    http: HttpClient,
    endpoint: String,
}

impl SauceNaoClient {
    /// Create a client for `endpoint`
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: create_http_client(timeout),
            endpoint: endpoint.into(),
        }
    }

    /// Create a client from application settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.saucenao_endpoint.clone(),
            settings.saucenao_http_timeout(),
        )
    }
}

#[async_trait]
impl SearchBackend for SauceNaoClient {
    async fn search(
        &self,
        image_url: &str,
        api_key: &str,
        max_results: usize,
    ) -> Result<SearchResponse, SauceNaoError> {
        let output_type = SAUCENAO_OUTPUT_TYPE_JSON.to_string();
        let numres = max_results.to_string();
        let params = [
            ("url", image_url),
            ("output_type", output_type.as_str()),
            ("api_key", api_key),
            ("numres", numres.as_str()),
        ];

        let response = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| SauceNaoError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SauceNaoError::Json(e.without_url().to_string()))?;

        check_header(&body)?;
        Ok(body)
    }
}

/// Maps a non-success HTTP response to an error, without echoing HTML pages.
fn status_error(status: StatusCode, error_text: &str) -> SauceNaoError {
    let trimmed = error_text.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    let message = if is_html {
        "server returned HTML error page".to_string()
    } else if error_text.chars().count() > 500 {
        format!("{}... (truncated)", truncate_str(error_text, 500))
    } else {
        error_text.to_string()
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        SauceNaoError::RateLimited(message)
    } else {
        SauceNaoError::Api {
            status: i64::from(status.as_u16()),
            message,
        }
    }
}

/// SauceNAO reports bad keys and exhausted quotas in the JSON header.
fn check_header(body: &SearchResponse) -> Result<(), SauceNaoError> {
    let Some(header) = &body.header else {
        return Ok(());
    };

    debug!(
        short_remaining = ?header.short_remaining,
        long_remaining = ?header.long_remaining,
        "SauceNAO quota"
    );

    if header.status != 0 && body.results.is_empty() {
        let message = header
            .message
            .clone()
            .unwrap_or_else(|| "no message".to_string());
        warn!(status = header.status, "SauceNAO reported an error: {message}");
        return Err(SauceNaoError::Api {
            status: header.status,
            message,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saucenao::ResponseHeader;

    #[test]
    fn test_html_error_page_is_not_echoed() {
        let err = status_error(
            StatusCode::BAD_GATEWAY,
            "<!DOCTYPE html><html><body>502</body></html>",
        );
        let SauceNaoError::Api { status, message } = err else {
            panic!("expected API error");
        };
        assert_eq!(status, 502);
        assert!(!message.contains("<html"));
    }

    #[test]
    fn test_too_many_requests_is_rate_limited() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "Daily Search Limit Exceeded.");
        assert!(matches!(err, SauceNaoError::RateLimited(_)));
    }

    #[test]
    fn test_long_error_body_is_truncated() {
        let body = "x".repeat(2000);
        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.to_string().contains("(truncated)"));
        assert!(err.to_string().len() < 600);
    }

    #[test]
    fn test_header_error_without_results_fails() {
        let body = SearchResponse {
            header: Some(ResponseHeader {
                status: -1,
                message: Some("Invalid API key".to_string()),
                ..ResponseHeader::default()
            }),
            results: Vec::new(),
        };
        let err = check_header(&body).err();
        assert!(matches!(err, Some(SauceNaoError::Api { status: -1, .. })));
    }

    #[test]
    fn test_successful_header_passes() {
        let body = SearchResponse {
            header: Some(ResponseHeader::default()),
            results: Vec::new(),
        };
        assert!(check_header(&body).is_ok());
        assert!(check_header(&SearchResponse::default()).is_ok());
    }
}
