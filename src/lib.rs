#![deny(missing_docs)]
//! Oxide Sauce library.
//!
//! Reverse image search for Telegram: a user sends `/search`, then an image,
//! and gets the closest SauceNAO matches back as a single album.

/// Telegram transport: commands, listener, dispatcher.
pub mod bot;
/// Configuration management.
pub mod config;
/// Composite replies and user-facing texts.
pub mod reply;
/// SauceNAO API client and result ranking.
pub mod saucenao;
/// Search request handling.
pub mod search;
/// Pending search sessions and their timeout race.
pub mod session;
/// Utility functions.
pub mod utils;
