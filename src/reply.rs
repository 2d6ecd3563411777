//! Composite replies and the texts users see.
//!
//! A [`Reply`] is an ordered list of text and image segments that the
//! transport delivers as a single message.

use crate::saucenao::SearchResult;
use std::fmt::Write as _;

/// Sent after `/search`
pub const SEARCH_PROMPT: &str = "🔎 Send me the image you want to look up.";
/// Sent when no image arrives in time
pub const SEARCH_TIMEOUT: &str = "⌛ Search timed out. Send /search to try again.";
/// Sent when the SauceNAO API key is not configured
pub const MISSING_API_KEY: &str = "🚫 Please configure the SauceNAO API key first.";
/// Sent when the search returned nothing
pub const NO_RESULTS: &str = "No matching results found.";
/// Sent for any failure during the search
pub const SEARCH_FAILED: &str = "❌ Search failed. Please try again later.";
/// Sent after `/cancel` closed a pending search
pub const SEARCH_CANCELLED: &str = "Search cancelled.";
/// Sent after `/cancel` with nothing pending
pub const NOTHING_TO_CANCEL: &str = "There is no pending search.";
/// First line of a result list
pub const RESULTS_HEADER: &str = "Search results (most likely first):\n";

/// Part of a composite reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain text
    Text(String),
    /// Image by URL
    Image(String),
}

/// A message made of text and image segments, delivered as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    segments: Vec<Segment>,
}

impl Reply {
    /// Reply consisting of a single text
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Text(text.into())],
        }
    }

    /// Append a text segment, merging with a preceding text segment
    pub fn push_text(&mut self, text: impl AsRef<str>) {
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text.as_ref());
        } else {
            self.segments.push(Segment::Text(text.as_ref().to_string()));
        }
    }

    /// Append an image segment
    pub fn push_image(&mut self, url: impl Into<String>) {
        self.segments.push(Segment::Image(url.into()));
    }

    /// Segments in display order
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All text segments concatenated
    #[must_use]
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(text.as_str()),
                Segment::Image(_) => None,
            })
            .collect()
    }

    /// URLs of all image segments
    #[must_use]
    pub fn images(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Image(url) => Some(url.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Whether the reply is text only
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Text(_)))
    }
}

/// Sent on `/start` and `/help`
#[must_use]
pub fn welcome(timeout_secs: u64) -> String {
    format!(
        "👋 I find the source of images using SauceNAO.\n\n\
         Send /search, then the picture within {timeout_secs} seconds.\n\
         /cancel drops a pending search."
    )
}

/// Builds the result list: a header, then one block per match in the given
/// order, each followed by its thumbnail when there is one.
#[must_use]
pub fn format_results(results: &[SearchResult]) -> Reply {
    let mut reply = Reply::plain(RESULTS_HEADER);

    for (idx, result) in results.iter().enumerate() {
        let mut block = String::new();
        let _ = write!(block, "\n#{} Similarity: {}%\n", idx + 1, result.similarity_text);
        let _ = writeln!(block, "Author: {}", result.author);
        let _ = writeln!(block, "Source: {}", result.source);
        reply.push_text(block);

        if let Some(thumbnail) = &result.thumbnail {
            reply.push_image(thumbnail.clone());
        }
    }

    reply
}
