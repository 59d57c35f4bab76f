use super::callbacks::CallbackAction;
use crate::config::AVAILABLE_EXCHANGES;
use crate::settings::UserSettings;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Push intervals offered in the menu, in minutes.
pub const INTERVAL_CHOICES: [u32; 6] = [5, 15, 30, 60, 240, 480];

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![button("↩️ Back", CallbackAction::SettingsMenu)]
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[
        button("🔄 Refresh", CallbackAction::Refresh),
        button("⚙️ Settings", CallbackAction::SettingsMenu),
    ]])
}

pub fn settings_menu(settings: &UserSettings) -> InlineKeyboardMarkup {
    let status = if settings.enabled { "🟢 Bot ON" } else { "🔴 Bot OFF" };
    InlineKeyboardMarkup::new(vec![
        vec![button("🌐 Exchanges", CallbackAction::SettingsExchanges)],
        vec![button(
            format!("📊 Funding: > {}%", settings.threshold),
            CallbackAction::SettingsThreshold,
        )],
        vec![button(
            format!("🚫 Blacklist ({})", settings.blacklist.len()),
            CallbackAction::BlacklistMenu,
        )],
        vec![button(
            format!("⏳ Interval: {}", interval_label(settings.interval)),
            CallbackAction::SettingsInterval,
        )],
        vec![button(status, CallbackAction::ToggleBotStatus)],
        vec![button("❌ Close", CallbackAction::CloseSettings)],
    ])
}

/// Two exchanges per row, checked when selected.
pub fn exchange_selection(selected: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = AVAILABLE_EXCHANGES
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|(name, _)| {
                    let mark = if selected.iter().any(|s| s == name) { "✅" } else { "☑️" };
                    button(
                        format!("{mark} {name}"),
                        CallbackAction::ToggleExchange(name.to_string()),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(back_row());
    InlineKeyboardMarkup::new(rows)
}

pub fn interval_selection(current: u32) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = INTERVAL_CHOICES
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|minutes| {
                    let label = interval_label(*minutes);
                    let text = if *minutes == current { format!("• {label} •") } else { label };
                    button(text, CallbackAction::SetInterval(*minutes))
                })
                .collect()
        })
        .collect();
    rows.push(back_row());
    InlineKeyboardMarkup::new(rows)
}

pub fn blacklist_menu(settings: &UserSettings) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button("➕ Add", CallbackAction::AddToBlacklist)]];
    if !settings.blacklist.is_empty() {
        rows[0].push(button("➖ Remove", CallbackAction::RemoveFromBlacklist));
    }
    rows.push(back_row());
    InlineKeyboardMarkup::new(rows)
}

pub fn back_to_settings() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([back_row()])
}

pub fn ticker_refresh(symbol: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[
        button("🔄 Refresh", CallbackAction::RefreshTicker(symbol.to_string())),
        button("❌ Close", CallbackAction::DeleteMessage),
    ]])
}

pub fn close_button() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[button("❌ Close", CallbackAction::DeleteMessage)]])
}

/// 240 → "4h", 15 → "15 min".
pub fn interval_label(minutes: u32) -> String {
    if minutes >= 60 && minutes % 60 == 0 {
        format!("{}h", minutes / 60)
    } else {
        format!("{minutes} min")
    }
}
