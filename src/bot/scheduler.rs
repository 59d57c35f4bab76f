use super::{keyboards, AppState};
use crate::models::FundingTable;
use crate::ranking;
use crate::settings::UserSettings;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tokio::time::Instant;

/// Tracks when each chat last got a scheduled report.
#[derive(Debug, Default)]
pub struct Schedule {
    last_push: HashMap<i64, Instant>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chats whose interval has elapsed. A chat seen for the first time
    /// starts its clock instead of being pushed right away; disabled chats
    /// are forgotten so re-enabling starts a fresh interval.
    pub fn due(&mut self, chats: &[(i64, UserSettings)], now: Instant) -> Vec<i64> {
        let mut due = Vec::new();
        for (chat_id, settings) in chats {
            if !settings.enabled {
                self.last_push.remove(chat_id);
                continue;
            }
            let interval = Duration::from_secs(u64::from(settings.interval) * 60);
            match self.last_push.get(chat_id) {
                None => {
                    self.last_push.insert(*chat_id, now);
                }
                Some(last) if now.duration_since(*last) >= interval => {
                    self.last_push.insert(*chat_id, now);
                    due.push(*chat_id);
                }
                Some(_) => {}
            }
        }
        due
    }
}

/// Pushes the top list to every chat whose interval is up.
pub async fn run(bot: Bot, app: Arc<AppState>, tick: Duration) {
    let mut schedule = Schedule::new();
    let mut interval = tokio::time::interval(tick);
    tracing::info!("Scheduler started, checking every {:?}", tick);

    loop {
        interval.tick().await;

        let chats = app.settings.snapshot();
        let due = schedule.due(&chats, Instant::now());
        if due.is_empty() {
            continue;
        }

        // chats with the same exchange selection share one scan per tick
        let mut scans: HashMap<Vec<String>, FundingTable> = HashMap::new();
        for chat_id in due {
            let Some((_, settings)) = chats.iter().find(|(id, _)| *id == chat_id) else {
                continue;
            };
            if let Err(e) = push(&bot, &app, chat_id, settings, &mut scans).await {
                tracing::warn!("[{chat_id}] Scheduled push failed: {e}");
            }
        }
    }
}

async fn push(
    bot: &Bot,
    app: &AppState,
    chat_id: i64,
    settings: &UserSettings,
    scans: &mut HashMap<Vec<String>, FundingTable>,
) -> anyhow::Result<()> {
    let table = match scans.get(&settings.exchanges) {
        Some(table) => table.clone(),
        None => {
            let table = app.scans.scan(settings.exchanges.clone()).await?;
            scans.insert(settings.exchanges.clone(), table.clone());
            table
        }
    };

    let ranked = ranking::rank(
        &table,
        settings.threshold,
        &settings.blacklist,
        app.formatter.top_n(),
    );
    if ranked.is_empty() {
        tracing::debug!("[{chat_id}] nothing above threshold, skipping push");
        return Ok(());
    }

    let text = app
        .formatter
        .funding_update(&table, settings.threshold, &settings.blacklist, Utc::now());
    bot.send_message(ChatId(chat_id), text)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true)
        .reply_markup(keyboards::main_menu())
        .await?;
    tracing::info!("[{chat_id}] Scheduled report sent ({} rows)", ranked.len());
    Ok(())
}
