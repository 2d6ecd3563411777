//! Image attachments: picking the image to search and turning it into a URL
//! SauceNAO can fetch.

use crate::utils::retry_telegram_operation;
use anyhow::{anyhow, Result};
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{Document, FileId};

/// Image attachment found in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Telegram file to download
    pub file_id: FileId,
}

/// Returns the first image in the message: the largest size of a photo,
/// or a document sent uncompressed with an `image/*` type.
#[must_use]
pub fn first_image(msg: &Message) -> Option<ImageAttachment> {
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(ImageAttachment {
            file_id: photo.file.id.clone(),
        });
    }

    msg.document()
        .filter(|doc| is_image_document(doc))
        .map(|doc| ImageAttachment {
            file_id: doc.file.id.clone(),
        })
}

fn is_image_document(doc: &Document) -> bool {
    doc.mime_type
        .as_ref()
        .is_some_and(|mime| mime.essence_str().starts_with("image/"))
}

/// Builds the download URL of a file stored on the Bot API server.
///
/// # Errors
///
/// Returns an error if the path cannot form a valid URL.
pub fn file_download_url(api_url: &Url, token: &str, file_path: &str) -> Result<Url> {
    api_url
        .join(&format!("file/bot{token}/{file_path}"))
        .map_err(|e| anyhow!("Invalid file URL: {e}"))
}

/// Resolves an attachment to a URL the search service can download.
///
/// # Errors
///
/// Returns an error if Telegram does not return file info after retries.
pub async fn resolve_file_url(bot: &Bot, image: &ImageAttachment) -> Result<Url> {
    let file = retry_telegram_operation(|| async { bot.get_file(image.file_id.clone()).await })
        .await?;
    file_download_url(&bot.api_url(), bot.token(), &file.path)
}
