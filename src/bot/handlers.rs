use crate::bot::media::{first_image, resolve_file_url, ImageAttachment};
use crate::bot::resilient::{send_reply, send_text_resilient};
use crate::config::Settings;
use crate::reply::{self, Reply};
use crate::search::SearchHandler;
use crate::session::{SessionExpiry, TelegramSearchSessions};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, types::ChatAction, utils::command::BotCommands};
use tracing::{debug, error, info};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show this help.")]
    Help,
    /// Wait for an image to look up
    #[command(description = "Find the source of an image.")]
    Search,
    /// Drop a pending search
    #[command(description = "Cancel a pending search.")]
    Cancel,
}

/// Sender of a message, absent for channel posts
#[must_use]
pub fn get_user_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|u| u.id.0.cast_signed())
}

fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Start and help handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, settings: Arc<Settings>) -> Result<()> {
    info!(
        "User {:?} ({}) requested usage.",
        get_user_id(&msg),
        get_user_name(&msg)
    );
    let text = format!(
        "{}\n\n{}",
        reply::welcome(settings.search_timeout_secs),
        Command::descriptions()
    );
    send_text_resilient(&bot, msg.chat.id, &text).await?;
    Ok(())
}

/// `/search` handler: opens a session and arms its timeout.
///
/// The timeout runs in its own task so other updates keep flowing; it
/// notifies the user only if it, not an incoming image, closed the session.
///
/// # Errors
///
/// Returns an error if the prompt cannot be sent.
pub async fn search_command(
    bot: Bot,
    msg: Message,
    sessions: Arc<TelegramSearchSessions>,
) -> Result<()> {
    let Some(user_id) = get_user_id(&msg) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    info!("User {user_id} ({}) started a search.", get_user_name(&msg));

    let armed = sessions.begin_session(user_id).await;
    let timer_bot = bot.clone();
    let timer_sessions = Arc::clone(&sessions);
    tokio::spawn(async move {
        if timer_sessions.wait_for_expiry(armed).await == SessionExpiry::Expired {
            if let Err(e) = send_text_resilient(&timer_bot, chat_id, reply::SEARCH_TIMEOUT).await
            {
                error!("Failed to send timeout notice to {user_id}: {e}");
            }
        }
    });

    send_text_resilient(&bot, chat_id, reply::SEARCH_PROMPT).await?;
    Ok(())
}

/// `/cancel` handler
///
/// # Errors
///
/// Returns an error if the confirmation cannot be sent.
pub async fn cancel(bot: Bot, msg: Message, sessions: Arc<TelegramSearchSessions>) -> Result<()> {
    let Some(user_id) = get_user_id(&msg) else {
        return Ok(());
    };

    let text = if sessions.end_session(&user_id).await {
        info!("User {user_id} cancelled a pending search.");
        reply::SEARCH_CANCELLED
    } else {
        reply::NOTHING_TO_CANCEL
    };
    send_text_resilient(&bot, msg.chat.id, text).await?;
    Ok(())
}

/// Claims the sender's pending search if the message carries an image.
///
/// Returns the sender and the image only when this call consumed the
/// session. A message without an image leaves the session pending, and a
/// sender without a session is ignored.
pub async fn claim_search(
    sessions: &TelegramSearchSessions,
    msg: &Message,
) -> Option<(i64, ImageAttachment)> {
    let user_id = get_user_id(msg)?;
    if !sessions.has_session(&user_id).await {
        return None;
    }
    let Some(image) = first_image(msg) else {
        debug!("User {user_id} has a pending search but sent no image.");
        return None;
    };
    // Expired or consumed by a concurrent message in the meantime
    sessions
        .end_session(&user_id)
        .await
        .then_some((user_id, image))
}

/// Listener for every non-command message.
///
/// Acts only when the sender has a pending search and the message carries an
/// image. The session is consumed before any network call, so one session
/// launches at most one search.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    sessions: Arc<TelegramSearchSessions>,
    search: Arc<SearchHandler>,
) -> Result<()> {
    let Some((user_id, image)) = claim_search(&sessions, &msg).await else {
        return Ok(());
    };

    info!("Running search for user {user_id} ({}).", get_user_name(&msg));

    if !search.is_configured() {
        send_reply(&bot, msg.chat.id, &Reply::plain(reply::MISSING_API_KEY)).await?;
        return Ok(());
    }

    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::UploadPhoto)
        .await;

    let reply = match resolve_file_url(&bot, &image).await {
        Ok(url) => search.search_reply(url.as_str()).await,
        Err(e) => {
            error!("Failed to resolve image for user {user_id}: {e}");
            Reply::plain(reply::SEARCH_FAILED)
        }
    };

    send_reply(&bot, msg.chat.id, &reply).await
}
