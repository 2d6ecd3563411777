//! Search request handling
//!
//! Turns an image URL into a reply: checks configuration, queries the
//! backend once, ranks the matches and formats them. Every failure along
//! the way collapses into one outcome so users never see partial output.

use crate::config::{Settings, SAUCENAO_MAX_RESULTS};
use crate::reply::{self, Reply};
use crate::saucenao::{rank_results, SauceNaoClient, SearchBackend, SearchResult};
use tracing::{error, info, warn};

/// Result of one search request
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// No API key configured, nothing was sent
    MissingApiKey,
    /// The search succeeded without matches
    NoResults,
    /// Ranked matches, best first
    Found(Vec<SearchResult>),
    /// Network, HTTP or parse failure (details are logged)
    Failed,
}

impl SearchOutcome {
    /// Reply shown to the user
    #[must_use]
    pub fn into_reply(self) -> Reply {
        match self {
            Self::MissingApiKey => Reply::plain(reply::MISSING_API_KEY),
            Self::NoResults => Reply::plain(reply::NO_RESULTS),
            Self::Found(results) => reply::format_results(&results),
            Self::Failed => Reply::plain(reply::SEARCH_FAILED),
        }
    }
}

/// Runs reverse image searches against a backend
pub struct SearchHandler<B: SearchBackend = SauceNaoClient> {
    backend: B,
    api_key: String,
    max_results: usize,
}

impl SearchHandler<SauceNaoClient> {
    /// Handler using the SauceNAO HTTP client configured in `settings`
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.api_key().is_empty() {
            warn!("SAUCENAO_API_KEY is not set; searches will ask for configuration.");
        }
        Self::new(
            SauceNaoClient::from_settings(settings),
            settings.api_key(),
            settings.saucenao_max_results,
        )
    }
}

impl<B: SearchBackend> SearchHandler<B> {
    /// Create a handler. An empty `api_key` is allowed and reported per request.
    #[must_use]
    pub fn new(backend: B, api_key: impl Into<String>, max_results: usize) -> Self {
        let max_results = if max_results == 0 {
            SAUCENAO_MAX_RESULTS
        } else {
            max_results
        };
        Self {
            backend,
            api_key: api_key.into(),
            max_results,
        }
    }

    /// Whether an API key is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Search for `image_url`. Makes at most one backend call and never retries.
    pub async fn search(&self, image_url: &str) -> SearchOutcome {
        if !self.is_configured() {
            return SearchOutcome::MissingApiKey;
        }

        let response = match self
            .backend
            .search(image_url, &self.api_key, self.max_results)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("SauceNAO search failed: {e}");
                return SearchOutcome::Failed;
            }
        };

        if response.results.is_empty() {
            info!("SauceNAO returned no matches.");
            return SearchOutcome::NoResults;
        }

        match rank_results(&response.results, self.max_results) {
            Ok(results) => {
                info!(
                    matches = response.results.len(),
                    shown = results.len(),
                    "SauceNAO search completed"
                );
                SearchOutcome::Found(results)
            }
            Err(e) => {
                error!("SauceNAO search failed: {e}");
                SearchOutcome::Failed
            }
        }
    }

    /// Search and build the reply in one step
    pub async fn search_reply(&self, image_url: &str) -> Reply {
        self.search(image_url).await.into_reply()
    }
}
