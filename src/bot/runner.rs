use crate::bot::handlers::{self, Command};
use crate::config::Settings;
use crate::search::SearchHandler;
use crate::session::TelegramSearchSessions;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

/// Run the Telegram bot until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>) {
    let bot = Bot::new(settings.telegram_token.clone());
    let sessions = init_sessions(&settings);
    let search = Arc::new(SearchHandler::from_settings(&settings));
    info!("Search handler initialized.");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        error!("Failed to register bot commands: {e}");
    }

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, sessions, search])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_sessions(settings: &Settings) -> Arc<TelegramSearchSessions> {
    info!(
        "Initializing search sessions (timeout: {}s)",
        settings.search_timeout_secs
    );
    Arc::new(TelegramSearchSessions::in_memory(settings.search_timeout()))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_message))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
    sessions: Arc<TelegramSearchSessions>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start | Command::Help => handlers::start(bot, msg, settings).await,
        Command::Search => handlers::search_command(bot, msg, sessions).await,
        Command::Cancel => handlers::cancel(bot, msg, sessions).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    sessions: Arc<TelegramSearchSessions>,
    search: Arc<SearchHandler>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_message(bot, msg, sessions, search).await {
        error!("Message handler error: {}", e);
    }
    respond(())
}
