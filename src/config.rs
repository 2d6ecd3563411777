//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the bot's constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// SauceNAO search endpoint
pub const SAUCENAO_ENDPOINT: &str = "https://saucenao.com/search.php";
/// `output_type` selector for JSON responses
pub const SAUCENAO_OUTPUT_TYPE_JSON: u8 = 2;
/// Number of results requested from SauceNAO and shown to the user
pub const SAUCENAO_MAX_RESULTS: usize = 5;
/// Default timeout for the outbound search request
pub const SAUCENAO_HTTP_TIMEOUT_SECS: u64 = 30;
/// How long a `/search` waits for an image
pub const SEARCH_SESSION_TIMEOUT_SECS: u64 = 30;

// Telegram API retry configuration
/// Maximum retries for transient Telegram API failures
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for a single backoff delay
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Telegram caption limit for photos and album items
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;
/// Maximum text message length with a safety margin below Telegram's 4096
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// SauceNAO API key. An absent key is reported to users, not a startup error.
    pub saucenao_api_key: Option<String>,

    /// Search endpoint, overridable for testing against a local stub
    #[serde(default = "default_saucenao_endpoint")]
    pub saucenao_endpoint: String,

    /// Seconds a pending search waits for an image
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    /// Timeout for the SauceNAO HTTP request
    #[serde(default = "default_saucenao_http_timeout_secs")]
    pub saucenao_http_timeout_secs: u64,

    /// Result cap sent as `numres` and applied again after ranking
    #[serde(default = "default_saucenao_max_results")]
    pub saucenao_max_results: usize,
}

fn default_saucenao_endpoint() -> String {
    SAUCENAO_ENDPOINT.to_string()
}

const fn default_search_timeout_secs() -> u64 {
    SEARCH_SESSION_TIMEOUT_SECS
}

const fn default_saucenao_http_timeout_secs() -> u64 {
    SAUCENAO_HTTP_TIMEOUT_SECS
}

const fn default_saucenao_max_results() -> usize {
    SAUCENAO_MAX_RESULTS
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oxide_sauce::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails, e.g. when `TELEGRAM_TOKEN` is unset.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__SEARCH_TIMEOUT_SECS=60 ./target/app`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables; empty values count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if settings.saucenao_api_key.is_none() {
            if let Ok(val) = std::env::var("SAUCENAO_API_KEY") {
                if !val.is_empty() {
                    settings.saucenao_api_key = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// API key as configured, empty when missing
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.saucenao_api_key.as_deref().unwrap_or_default().trim()
    }

    /// Window a pending search stays open
    #[must_use]
    pub const fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Timeout applied to the SauceNAO HTTP client
    #[must_use]
    pub const fn saucenao_http_timeout(&self) -> Duration {
        Duration::from_secs(self.saucenao_http_timeout_secs)
    }
}
