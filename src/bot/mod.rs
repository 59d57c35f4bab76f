pub mod callbacks;
mod handlers;
pub mod input;
pub mod keyboards;
pub mod scheduler;

use crate::format::ReportFormatter;
use crate::settings::SettingsRepository;
use crate::worker::ScanHandle;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

pub type BotDialogue = Dialogue<State, InMemStorage<State>>;
pub type HandlerResult = anyhow::Result<()>;

/// Shared by every handler and the scheduler.
pub struct AppState {
    pub settings: Arc<dyn SettingsRepository>,
    pub scans: ScanHandle,
    pub formatter: ReportFormatter,
}

/// What the next free-text message from a chat means.
#[derive(Clone, Default, Debug)]
pub enum State {
    #[default]
    Idle,
    ReceiveThreshold,
    ReceiveBlacklistAdd,
    ReceiveBlacklistRemove,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Funding rate scanner. Commands:")]
pub enum Command {
    #[command(description = "scan the selected exchanges and show the top funding rates")]
    Start,
    #[command(description = "tickers above your threshold as a copyable list")]
    Copy,
    #[command(description = "show this text")]
    Help,
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handlers::start))
        .branch(case![Command::Copy].endpoint(handlers::copy))
        .branch(case![Command::Help].endpoint(handlers::help));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::ReceiveThreshold].endpoint(handlers::receive_threshold))
        .branch(case![State::ReceiveBlacklistAdd].endpoint(handlers::receive_blacklist_add))
        .branch(case![State::ReceiveBlacklistRemove].endpoint(handlers::receive_blacklist_remove))
        .branch(case![State::Idle].endpoint(handlers::ticker_lookup));

    let callback_handler = Update::filter_callback_query().endpoint(handlers::callback);

    dialogue::enter::<Update, InMemStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_handler)
}

/// Runs the dispatcher until Ctrl+C.
pub async fn run(bot: Bot, app: Arc<AppState>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!("Could not register bot commands: {e}");
    }

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![InMemStorage::<State>::new(), app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
