//! Telegram delivery with automatic retry on transient network failures.
//!
//! A composite [`Reply`] is sent as one unit: plain text becomes a single
//! message, a reply with one image a captioned photo, and a reply with
//! several images an album whose captions carry the text blocks. A reply
//! whose captions would not fit goes out as text instead, so no result line
//! is ever cut.

use crate::config::{TELEGRAM_CAPTION_LIMIT, TELEGRAM_MESSAGE_LIMIT};
use crate::reply::{Reply, Segment};
use crate::utils::{retry_telegram_operation, split_long_message};
use anyhow::{anyhow, Result};
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, InputMedia, InputMediaPhoto};
use tracing::{debug, warn};

/// Photo in an album together with the text shown under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumItem {
    /// Image URL
    pub image: String,
    /// Caption text
    pub caption: String,
}

/// Splits a reply into album items.
///
/// Text preceding an image becomes that image's caption; text after the
/// last image is appended to the last caption. Captions are not shortened;
/// check them with [`captions_fit`]. Returns an empty list for text-only
/// replies.
#[must_use]
pub fn album_items(reply: &Reply) -> Vec<AlbumItem> {
    let mut items: Vec<AlbumItem> = Vec::new();
    let mut pending = String::new();

    for segment in reply.segments() {
        match segment {
            Segment::Text(text) => pending.push_str(text),
            Segment::Image(url) => items.push(AlbumItem {
                image: url.clone(),
                caption: std::mem::take(&mut pending),
            }),
        }
    }

    if let Some(last) = items.last_mut() {
        last.caption.push_str(&pending);
    }

    for item in &mut items {
        item.caption = item.caption.trim().to_string();
    }

    items
}

/// Whether every caption is within Telegram's caption limit
#[must_use]
pub fn captions_fit(items: &[AlbumItem]) -> bool {
    items
        .iter()
        .all(|item| item.caption.chars().count() <= TELEGRAM_CAPTION_LIMIT)
}

/// Send a text message with automatic retry on network failures.
///
/// Text over the message limit is sent as several messages split on line
/// boundaries.
///
/// # Errors
///
/// Returns an error after all retries are exhausted or if Telegram rejects a part.
pub async fn send_text_resilient(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    for part in split_long_message(text, TELEGRAM_MESSAGE_LIMIT) {
        retry_telegram_operation(|| async { bot.send_message(chat_id, part.clone()).await })
            .await
            .map_err(|e| anyhow!("Telegram send error: {e}"))?;
    }
    Ok(())
}

/// Send a composite reply as one message.
///
/// If Telegram refuses the photos (for instance when it cannot fetch a
/// thumbnail), the reply's text is sent on its own instead.
///
/// # Errors
///
/// Returns an error if neither the media nor the fallback text could be sent.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> Result<()> {
    let items = album_items(reply);
    if items.is_empty() {
        send_text_resilient(bot, chat_id, &reply.text()).await?;
        return Ok(());
    }
    if !captions_fit(&items) {
        debug!("Result captions exceed the caption limit, sending as text");
        send_text_resilient(bot, chat_id, reply.text().trim()).await?;
        return Ok(());
    }

    match send_media(bot, chat_id, &items).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Failed to send result album, falling back to text: {e}");
            send_text_resilient(bot, chat_id, reply.text().trim()).await?;
            Ok(())
        }
    }
}

async fn send_media(bot: &Bot, chat_id: ChatId, items: &[AlbumItem]) -> Result<()> {
    if let [item] = items {
        let photo = InputFile::url(parse_url(&item.image)?);
        retry_telegram_operation(|| async {
            bot.send_photo(chat_id, photo.clone())
                .caption(item.caption.clone())
                .await
        })
        .await?;
        return Ok(());
    }

    let media = items
        .iter()
        .map(|item| -> Result<InputMedia> {
            Ok(InputMedia::Photo(
                InputMediaPhoto::new(InputFile::url(parse_url(&item.image)?))
                    .caption(item.caption.clone()),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(count = media.len(), "Sending result album");
    retry_telegram_operation(|| async { bot.send_media_group(chat_id, media.clone()).await })
        .await?;
    Ok(())
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| anyhow!("Invalid image URL {raw}: {e}"))
}
