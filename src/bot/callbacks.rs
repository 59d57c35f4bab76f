use std::fmt;

/// Inline button payloads. `Display` produces the wire form, `parse` reads it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Refresh,
    SettingsMenu,
    SettingsThreshold,
    SettingsExchanges,
    ToggleExchange(String),
    BlacklistMenu,
    AddToBlacklist,
    RemoveFromBlacklist,
    SettingsInterval,
    SetInterval(u32),
    ToggleBotStatus,
    RefreshTicker(String),
    CloseSettings,
    DeleteMessage,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "refresh" => Self::Refresh,
            "settings_menu" => Self::SettingsMenu,
            "settings_threshold" => Self::SettingsThreshold,
            "settings_exchanges" => Self::SettingsExchanges,
            "blacklist_menu" => Self::BlacklistMenu,
            "add_to_blacklist" => Self::AddToBlacklist,
            "remove_from_blacklist" => Self::RemoveFromBlacklist,
            "settings_interval" => Self::SettingsInterval,
            "toggle_bot_status" => Self::ToggleBotStatus,
            "close_settings" => Self::CloseSettings,
            "delete_message" => Self::DeleteMessage,
            _ => {
                if let Some(name) = data.strip_prefix("toggle_exchange_") {
                    return (!name.is_empty()).then(|| Self::ToggleExchange(name.to_string()));
                }
                if let Some(minutes) = data.strip_prefix("set_interval_") {
                    return minutes.parse().ok().filter(|m| *m > 0).map(Self::SetInterval);
                }
                if let Some(symbol) = data.strip_prefix("refresh_ticker_") {
                    return (!symbol.is_empty()).then(|| Self::RefreshTicker(symbol.to_string()));
                }
                return None;
            }
        };
        Some(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refresh => f.write_str("refresh"),
            Self::SettingsMenu => f.write_str("settings_menu"),
            Self::SettingsThreshold => f.write_str("settings_threshold"),
            Self::SettingsExchanges => f.write_str("settings_exchanges"),
            Self::ToggleExchange(name) => write!(f, "toggle_exchange_{name}"),
            Self::BlacklistMenu => f.write_str("blacklist_menu"),
            Self::AddToBlacklist => f.write_str("add_to_blacklist"),
            Self::RemoveFromBlacklist => f.write_str("remove_from_blacklist"),
            Self::SettingsInterval => f.write_str("settings_interval"),
            Self::SetInterval(minutes) => write!(f, "set_interval_{minutes}"),
            Self::ToggleBotStatus => f.write_str("toggle_bot_status"),
            Self::RefreshTicker(symbol) => write!(f, "refresh_ticker_{symbol}"),
            Self::CloseSettings => f.write_str("close_settings"),
            Self::DeleteMessage => f.write_str("delete_message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameterized_actions_keep_their_argument() {
        assert_eq!(
            CallbackAction::parse("toggle_exchange_Gate.io"),
            Some(CallbackAction::ToggleExchange("Gate.io".into()))
        );
        assert_eq!(
            CallbackAction::parse("set_interval_240"),
            Some(CallbackAction::SetInterval(240))
        );
        assert_eq!(
            CallbackAction::parse("refresh_ticker_1000PEPE"),
            Some(CallbackAction::RefreshTicker("1000PEPE".into()))
        );
    }

    #[test]
    fn wire_form_reads_back() {
        let actions = [
            CallbackAction::Refresh,
            CallbackAction::CloseSettings,
            CallbackAction::ToggleExchange("ByBit".into()),
            CallbackAction::SetInterval(5),
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.to_string()), Some(action));
        }
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert_eq!(CallbackAction::parse(""), None);
        assert_eq!(CallbackAction::parse("set_interval_soon"), None);
        assert_eq!(CallbackAction::parse("set_interval_0"), None);
        assert_eq!(CallbackAction::parse("toggle_exchange_"), None);
        assert_eq!(CallbackAction::parse("refresh_all"), None);
    }
}
