use super::callbacks::CallbackAction;
use super::{input, keyboards, AppState, BotDialogue, Command, HandlerResult, State};
use crate::config::AVAILABLE_EXCHANGES;
use crate::errors::ScanError;
use crate::models::FundingTable;
use crate::ranking::clean_ticker;
use crate::settings::{Setting, SettingsRepository, UserSettings};
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::escape;
use teloxide::{ApiError, RequestError};

const DISABLED_NOTICE: &str = "🔴 The bot is switched off for this chat. Turn it back on in ⚙️ Settings.";
const SETTINGS_TEXT: &str = "⚙️ <b>Settings</b>\n\nPick an option to change:";

async fn send_html(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    markup: Option<InlineKeyboardMarkup>,
) -> anyhow::Result<Message> {
    let mut request = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true);
    if let Some(markup) = markup {
        request = request.reply_markup(markup);
    }
    Ok(request.await?)
}

/// Edits a message in place; an edit that changes nothing is not an error.
async fn edit_html(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: impl Into<String>,
    markup: Option<InlineKeyboardMarkup>,
) -> HandlerResult {
    let mut request = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true);
    if let Some(markup) = markup {
        request = request.reply_markup(markup);
    }
    match request.await {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn edit_markup(bot: &Bot, chat_id: ChatId, message_id: MessageId, markup: InlineKeyboardMarkup) -> HandlerResult {
    match bot.edit_message_reply_markup(chat_id, message_id).reply_markup(markup).await {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn scan_failure(chat_id: ChatId, e: &ScanError) -> String {
    tracing::error!("[{chat_id}] Scan failed: {e}");
    match e {
        ScanError::Timeout(_) => "😔 The scan did not finish in time. Please try again later.".to_string(),
        ScanError::WorkerUnavailable => "😔 The scanner is not running right now. Please try again later.".to_string(),
    }
}

/// Applies a settings change, turning a failure into the text shown to
/// the chat so callers can still answer the callback query.
fn update_settings(
    settings: &dyn SettingsRepository,
    chat_id: ChatId,
    setting: Setting,
) -> Result<UserSettings, String> {
    settings.set(chat_id.0, setting).map_err(|e| {
        tracing::error!("[{chat_id}] Could not save settings: {e}");
        format!("😔 Could not save the change: {}", escape(&e.to_string()))
    })
}

/// Stops the button spinner and replaces the menu with the failure text.
async fn report_save_failure(
    bot: &Bot,
    query_id: String,
    chat_id: ChatId,
    message_id: MessageId,
    text: String,
) -> HandlerResult {
    bot.answer_callback_query(query_id)
        .text("Could not save the change")
        .await?;
    edit_html(bot, chat_id, message_id, text, Some(keyboards::back_to_settings())).await
}

fn scanning_text(settings: &UserSettings) -> String {
    format!("🔍 Scanning {} exchanges...", settings.exchanges.len())
}

fn blacklist_text(settings: &UserSettings) -> String {
    let listed = if settings.blacklist.is_empty() {
        "Nothing hidden yet.".to_string()
    } else {
        format!("<code>{}</code>", escape(&settings.blacklist.join(", ")))
    };
    format!("🚫 <b>Blacklist</b>\n\n{listed}\n\nThese tickers never show up in the top list.")
}

/// Runs a full scan and rewrites `message_id` with the report.
async fn scan_into(
    bot: &Bot,
    app: &AppState,
    chat_id: ChatId,
    message_id: MessageId,
    settings: &UserSettings,
) -> HandlerResult {
    let text = match app.scans.scan(settings.exchanges.clone()).await {
        Ok(table) => app
            .formatter
            .funding_update(&table, settings.threshold, &settings.blacklist, Utc::now()),
        Err(e) => scan_failure(chat_id, &e),
    };
    edit_html(bot, chat_id, message_id, text, Some(keyboards::main_menu())).await
}

async fn show_ticker(
    bot: &Bot,
    app: &AppState,
    chat_id: ChatId,
    message_id: MessageId,
    ticker: &str,
    settings: &UserSettings,
) -> HandlerResult {
    match app.scans.scan_ticker(ticker, settings.exchanges.clone()).await {
        Ok(rows) => {
            let table: FundingTable = rows.into_iter().collect();
            let text = app.formatter.ticker_info(&table, ticker, Utc::now());
            edit_html(bot, chat_id, message_id, text, Some(keyboards::ticker_refresh(ticker))).await
        }
        Err(e) => edit_html(bot, chat_id, message_id, scan_failure(chat_id, &e), None).await,
    }
}

pub async fn start(bot: Bot, dialogue: BotDialogue, msg: Message, app: Arc<AppState>) -> HandlerResult {
    let chat_id = msg.chat.id;
    tracing::info!("[{chat_id}] /start");
    dialogue.exit().await?;

    let settings = app.settings.get(chat_id.0);
    if !settings.enabled {
        send_html(&bot, chat_id, DISABLED_NOTICE, Some(keyboards::main_menu())).await?;
        return Ok(());
    }

    let pending = send_html(&bot, chat_id, scanning_text(&settings), None).await?;
    scan_into(&bot, &app, chat_id, pending.id, &settings).await
}

pub async fn copy(bot: Bot, msg: Message, app: Arc<AppState>) -> HandlerResult {
    let chat_id = msg.chat.id;
    tracing::info!("[{chat_id}] /copy");

    let settings = app.settings.get(chat_id.0);
    if !settings.enabled {
        send_html(&bot, chat_id, DISABLED_NOTICE, None).await?;
        return Ok(());
    }

    let pending = send_html(&bot, chat_id, scanning_text(&settings), None).await?;
    let text = match app.scans.scan(settings.exchanges.clone()).await {
        Ok(table) => match app.formatter.copy_list(&table, settings.threshold, &settings.blacklist) {
            Some(list) => format!("<code>{}</code>", escape(&list)),
            None => format!("No tickers above <b>{}%</b> right now.", settings.threshold),
        },
        Err(e) => scan_failure(chat_id, &e),
    };
    edit_html(&bot, chat_id, pending.id, text, Some(keyboards::close_button())).await
}

pub async fn help(bot: Bot, msg: Message) -> HandlerResult {
    let text = format!(
        "{}\n\nSend a ticker such as <code>BTC</code> to see its funding on every selected exchange.",
        escape(&Command::descriptions().to_string())
    );
    send_html(&bot, msg.chat.id, text, None).await?;
    Ok(())
}

/// Free text outside any dialogue: a ticker lookup.
pub async fn ticker_lookup(bot: Bot, msg: Message, app: Arc<AppState>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        send_html(&bot, chat_id, "Unknown command. /help lists what I understand.", None).await?;
        return Ok(());
    }
    if input::is_numeric(text) {
        return Ok(());
    }

    let Some(ticker) = clean_ticker(text).filter(|t| t.len() >= 2) else {
        let reply = format!(
            "Could not read a ticker from <b>{}</b>. Try something like <code>BTC</code>.",
            escape(text.trim())
        );
        send_html(&bot, chat_id, reply, None).await?;
        return Ok(());
    };

    tracing::info!("[{chat_id}] ticker lookup {ticker}");
    let settings = app.settings.get(chat_id.0);
    if !settings.enabled {
        send_html(&bot, chat_id, DISABLED_NOTICE, None).await?;
        return Ok(());
    }

    let pending = send_html(
        &bot,
        chat_id,
        format!("🔍 Looking up <b>{}</b>...", escape(&ticker)),
        None,
    )
    .await?;
    show_ticker(&bot, &app, chat_id, pending.id, &ticker, &settings).await
}

pub async fn receive_threshold(bot: Bot, dialogue: BotDialogue, msg: Message, app: Arc<AppState>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(threshold) = msg.text().and_then(input::parse_threshold) else {
        send_html(
            &bot,
            chat_id,
            "That is not a number. Send a value such as <code>0.5</code>.",
            Some(keyboards::back_to_settings()),
        )
        .await?;
        return Ok(());
    };

    match app.settings.set(chat_id.0, Setting::Threshold(threshold)) {
        Ok(settings) => {
            tracing::info!("[{chat_id}] threshold set to {threshold}");
            dialogue.exit().await?;
            let text = format!("✅ Threshold set to <b>{}%</b>.\n\n{SETTINGS_TEXT}", settings.threshold);
            send_html(&bot, chat_id, text, Some(keyboards::settings_menu(&settings))).await?;
        }
        Err(e) => {
            tracing::error!("[{chat_id}] Could not save threshold: {e}");
            let text = format!("😔 Could not save the threshold: {}", escape(&e.to_string()));
            send_html(&bot, chat_id, text, Some(keyboards::back_to_settings())).await?;
        }
    }
    Ok(())
}

pub async fn receive_blacklist_add(bot: Bot, dialogue: BotDialogue, msg: Message, app: Arc<AppState>) -> HandlerResult {
    update_blacklist(bot, dialogue, msg, app, true).await
}

pub async fn receive_blacklist_remove(
    bot: Bot,
    dialogue: BotDialogue,
    msg: Message,
    app: Arc<AppState>,
) -> HandlerResult {
    update_blacklist(bot, dialogue, msg, app, false).await
}

async fn update_blacklist(bot: Bot, dialogue: BotDialogue, msg: Message, app: Arc<AppState>, add: bool) -> HandlerResult {
    let chat_id = msg.chat.id;
    let symbols = match msg.text().map(input::parse_symbols) {
        Some(Ok(symbols)) => symbols,
        Some(Err(bad)) => {
            let text = format!(
                "<b>{}</b> is not a ticker. Send tickers separated by spaces or commas, e.g. <code>BTC ETH</code>.",
                escape(&bad)
            );
            send_html(&bot, chat_id, text, Some(keyboards::back_to_settings())).await?;
            return Ok(());
        }
        None => {
            send_html(&bot, chat_id, "Send the tickers as text.", Some(keyboards::back_to_settings())).await?;
            return Ok(());
        }
    };

    let current = app.settings.get(chat_id.0).blacklist;
    let updated: Vec<String> = if add {
        current.into_iter().chain(symbols).collect()
    } else {
        current.into_iter().filter(|s| !symbols.contains(s)).collect()
    };

    match app.settings.set(chat_id.0, Setting::Blacklist(updated)) {
        Ok(settings) => {
            tracing::info!("[{chat_id}] blacklist now {:?}", settings.blacklist);
            dialogue.exit().await?;
            send_html(&bot, chat_id, blacklist_text(&settings), Some(keyboards::blacklist_menu(&settings))).await?;
        }
        Err(e) => {
            tracing::error!("[{chat_id}] Could not save blacklist: {e}");
            let text = format!("😔 Could not save the blacklist: {}", escape(&e.to_string()));
            send_html(&bot, chat_id, text, Some(keyboards::back_to_settings())).await?;
        }
    }
    Ok(())
}

pub async fn callback(bot: Bot, dialogue: BotDialogue, q: CallbackQuery, app: Arc<AppState>) -> HandlerResult {
    let action = q.data.as_deref().and_then(CallbackAction::parse);
    let target = q.message.as_ref().map(|m| (m.chat.id, m.id));
    let (Some(action), Some((chat_id, message_id))) = (action, target) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    tracing::debug!("[{chat_id}] callback {action}");

    match action {
        CallbackAction::Refresh | CallbackAction::CloseSettings => {
            bot.answer_callback_query(q.id).text("Refreshing...").await?;
            dialogue.exit().await?;
            let settings = app.settings.get(chat_id.0);
            if !settings.enabled {
                return edit_html(&bot, chat_id, message_id, DISABLED_NOTICE, Some(keyboards::main_menu())).await;
            }
            edit_html(&bot, chat_id, message_id, scanning_text(&settings), None).await?;
            scan_into(&bot, &app, chat_id, message_id, &settings).await
        }
        CallbackAction::SettingsMenu => {
            bot.answer_callback_query(q.id).await?;
            dialogue.exit().await?;
            let settings = app.settings.get(chat_id.0);
            edit_html(&bot, chat_id, message_id, SETTINGS_TEXT, Some(keyboards::settings_menu(&settings))).await
        }
        CallbackAction::SettingsThreshold => {
            bot.answer_callback_query(q.id).await?;
            dialogue.update(State::ReceiveThreshold).await?;
            let settings = app.settings.get(chat_id.0);
            let text = format!(
                "Current threshold: <b>{}%</b>.\n\nSend a new value (e.g. <code>0.5</code>) to change it.",
                settings.threshold
            );
            edit_html(&bot, chat_id, message_id, text, Some(keyboards::back_to_settings())).await
        }
        CallbackAction::SettingsExchanges => {
            bot.answer_callback_query(q.id).await?;
            let settings = app.settings.get(chat_id.0);
            edit_html(
                &bot,
                chat_id,
                message_id,
                "🌐 <b>Exchanges</b>\n\nPick the exchanges to scan:",
                Some(keyboards::exchange_selection(&settings.exchanges)),
            )
            .await
        }
        CallbackAction::ToggleExchange(name) => {
            let Some(display) = AVAILABLE_EXCHANGES.iter().map(|(n, _)| *n).find(|n| *n == name) else {
                bot.answer_callback_query(q.id).text("Unknown exchange").await?;
                return Ok(());
            };

            let mut exchanges = app.settings.get(chat_id.0).exchanges;
            let enabled = match exchanges.iter().position(|e| e.as_str() == display) {
                Some(pos) => {
                    exchanges.remove(pos);
                    false
                }
                None => {
                    exchanges.push(display.to_string());
                    true
                }
            };
            let settings = match update_settings(app.settings.as_ref(), chat_id, Setting::Exchanges(exchanges)) {
                Ok(settings) => settings,
                Err(text) => return report_save_failure(&bot, q.id, chat_id, message_id, text).await,
            };

            let state = if enabled { "enabled" } else { "disabled" };
            bot.answer_callback_query(q.id).text(format!("{display} {state}")).await?;
            edit_markup(&bot, chat_id, message_id, keyboards::exchange_selection(&settings.exchanges)).await
        }
        CallbackAction::BlacklistMenu => {
            bot.answer_callback_query(q.id).await?;
            dialogue.exit().await?;
            let settings = app.settings.get(chat_id.0);
            edit_html(
                &bot,
                chat_id,
                message_id,
                blacklist_text(&settings),
                Some(keyboards::blacklist_menu(&settings)),
            )
            .await
        }
        CallbackAction::AddToBlacklist => {
            bot.answer_callback_query(q.id).await?;
            dialogue.update(State::ReceiveBlacklistAdd).await?;
            edit_html(
                &bot,
                chat_id,
                message_id,
                "Send the tickers to hide, separated by spaces or commas (e.g. <code>BTC ETH</code>).",
                Some(keyboards::back_to_settings()),
            )
            .await
        }
        CallbackAction::RemoveFromBlacklist => {
            let settings = app.settings.get(chat_id.0);
            if settings.blacklist.is_empty() {
                bot.answer_callback_query(q.id).text("The blacklist is empty").await?;
                return Ok(());
            }
            bot.answer_callback_query(q.id).await?;
            dialogue.update(State::ReceiveBlacklistRemove).await?;
            let text = format!(
                "Send the tickers to show again. Hidden now: <code>{}</code>",
                escape(&settings.blacklist.join(", "))
            );
            edit_html(&bot, chat_id, message_id, text, Some(keyboards::back_to_settings())).await
        }
        CallbackAction::SettingsInterval => {
            bot.answer_callback_query(q.id).await?;
            let settings = app.settings.get(chat_id.0);
            edit_html(
                &bot,
                chat_id,
                message_id,
                "⏳ <b>Push interval</b>\n\nHow often should I send the top list while the bot is ON?",
                Some(keyboards::interval_selection(settings.interval)),
            )
            .await
        }
        CallbackAction::SetInterval(minutes) => {
            let settings = match update_settings(app.settings.as_ref(), chat_id, Setting::Interval(minutes)) {
                Ok(settings) => settings,
                Err(text) => return report_save_failure(&bot, q.id, chat_id, message_id, text).await,
            };
            tracing::info!("[{chat_id}] interval set to {minutes} min");
            bot.answer_callback_query(q.id)
                .text(format!("Interval set to {}", keyboards::interval_label(minutes)))
                .await?;
            edit_html(&bot, chat_id, message_id, SETTINGS_TEXT, Some(keyboards::settings_menu(&settings))).await
        }
        CallbackAction::ToggleBotStatus => {
            let enabled = !app.settings.get(chat_id.0).enabled;
            let settings = match update_settings(app.settings.as_ref(), chat_id, Setting::Enabled(enabled)) {
                Ok(settings) => settings,
                Err(text) => return report_save_failure(&bot, q.id, chat_id, message_id, text).await,
            };
            tracing::info!("[{chat_id}] bot {}", if enabled { "enabled" } else { "disabled" });
            bot.answer_callback_query(q.id)
                .text(if enabled { "The bot is now ON" } else { "The bot is now OFF" })
                .await?;
            edit_markup(&bot, chat_id, message_id, keyboards::settings_menu(&settings)).await
        }
        CallbackAction::RefreshTicker(symbol) => {
            let Some(ticker) = clean_ticker(&symbol) else {
                bot.answer_callback_query(q.id).await?;
                return Ok(());
            };
            bot.answer_callback_query(q.id).text("Refreshing...").await?;
            let settings = app.settings.get(chat_id.0);
            if !settings.enabled {
                return edit_html(&bot, chat_id, message_id, DISABLED_NOTICE, None).await;
            }
            let text = format!("🔍 Looking up <b>{}</b>...", escape(&ticker));
            edit_html(&bot, chat_id, message_id, text, None).await?;
            show_ticker(&bot, &app, chat_id, message_id, &ticker, &settings).await
        }
        CallbackAction::DeleteMessage => {
            bot.answer_callback_query(q.id).await?;
            dialogue.exit().await?;
            if let Err(e) = bot.delete_message(chat_id, message_id).await {
                tracing::warn!("[{chat_id}] Could not delete message: {e}");
            }
            Ok(())
        }
    }
}
