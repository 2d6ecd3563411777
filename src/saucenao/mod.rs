//! SauceNAO reverse image search
//!
//! Wire types for the JSON API (`output_type=2`), the HTTP client and the
//! ranking of raw results into [`SearchResult`]s.

mod client;
mod results;

pub use client::{create_http_client, SauceNaoClient};
pub use results::{rank_results, SearchResult, UNKNOWN_AUTHOR, UNKNOWN_SOURCE};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to SauceNAO
#[derive(Debug, Error)]
pub enum SauceNaoError {
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(String),
    /// Non-success HTTP status or an error reported in the response header
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status, or SauceNAO's own status code from the response header
        status: i64,
        /// Error message from the server
        message: String,
    },
    /// Search quota exhausted (429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    /// Body is not the expected JSON
    #[error("JSON error: {0}")]
    Json(String),
    /// JSON parsed but a field has an unusable value
    #[error("Malformed result: {0}")]
    Malformed(String),
}

/// Top-level search response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Request metadata (status, remaining quota)
    #[serde(default)]
    pub header: Option<ResponseHeader>,
    /// Matches as returned by the API, not necessarily sorted
    #[serde(default)]
    pub results: Vec<RawResult>,
}

/// Response metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseHeader {
    /// 0 on success, positive for server-side and negative for client-side failures
    #[serde(default)]
    pub status: i64,
    /// Error description when `status` is non-zero
    #[serde(default)]
    pub message: Option<String>,
    /// Searches left in the 30 second window
    #[serde(default)]
    pub short_remaining: Option<i64>,
    /// Searches left in the 24 hour window
    #[serde(default)]
    pub long_remaining: Option<i64>,
}

/// One match before ranking
#[derive(Debug, Clone, Deserialize)]
pub struct RawResult {
    /// Match metadata
    pub header: RawResultHeader,
    /// Index-specific fields (author, links, titles)
    pub data: Value,
}

/// Metadata of a single match
#[derive(Debug, Clone, Deserialize)]
pub struct RawResultHeader {
    /// Similarity percentage, sent as a string such as `"92.51"`
    pub similarity: Value,
    /// Thumbnail of the matched image
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Interface for reverse image search backends
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Look up `image_url`, asking for at most `max_results` matches
    async fn search(
        &self,
        image_url: &str,
        api_key: &str,
        max_results: usize,
    ) -> Result<SearchResponse, SauceNaoError>;
}
