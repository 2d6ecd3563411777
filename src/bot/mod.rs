/// Command and message handlers
pub mod handlers;
/// Image extraction and file URL resolution
pub mod media;
/// Telegram sends with retry and album assembly
pub mod resilient;
/// Dispatcher setup
pub mod runner;
