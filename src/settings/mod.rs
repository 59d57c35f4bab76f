pub mod store;

use crate::errors::SettingsError;
use serde::{Deserialize, Serialize};
pub use store::SettingsStore;

/// Per-chat configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Minimum absolute funding rate, in percent.
    pub threshold: f64,
    /// Enabled exchanges by display name.
    pub exchanges: Vec<String>,
    /// Symbols hidden from the ranked view.
    pub blacklist: Vec<String>,
    /// Whether scans run for this chat at all.
    pub enabled: bool,
    /// Minutes between scheduled pushes.
    #[serde(alias = "update_interval")]
    pub interval: u32,
}

impl UserSettings {
    pub fn apply(&mut self, setting: Setting) -> Result<(), SettingsError> {
        match setting {
            Setting::Threshold(threshold) => {
                if !threshold.is_finite() || threshold < 0.0 {
                    return Err(SettingsError::InvalidValue {
                        key: "threshold",
                        reason: format!("{threshold} is not a non-negative number"),
                    });
                }
                self.threshold = threshold;
            }
            Setting::Exchanges(exchanges) => self.exchanges = dedup(exchanges),
            Setting::Blacklist(blacklist) => self.blacklist = dedup(blacklist),
            Setting::Enabled(enabled) => self.enabled = enabled,
            Setting::Interval(0) => {
                return Err(SettingsError::InvalidValue {
                    key: "interval",
                    reason: "must be at least one minute".to_string(),
                });
            }
            Setting::Interval(minutes) => self.interval = minutes,
        }
        Ok(())
    }
}

/// A single-key settings update.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Threshold(f64),
    Exchanges(Vec<String>),
    Blacklist(Vec<String>),
    Enabled(bool),
    Interval(u32),
}

/// Keeps first occurrences, preserving order.
fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Per-chat settings repository.
pub trait SettingsRepository: Send + Sync {
    /// Returns the chat's settings, creating them from the defaults on first use.
    fn get(&self, chat_id: i64) -> UserSettings;

    /// Updates one key and returns the resulting settings.
    fn set(&self, chat_id: i64, setting: Setting) -> Result<UserSettings, SettingsError>;

    /// All chats known to the store.
    fn snapshot(&self) -> Vec<(i64, UserSettings)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> UserSettings {
        UserSettings {
            threshold: 0.3,
            exchanges: vec!["Binance".into()],
            blacklist: vec![],
            enabled: true,
            interval: 60,
        }
    }

    #[test]
    fn negative_or_nan_threshold_is_rejected() {
        let mut s = settings();
        assert!(s.apply(Setting::Threshold(-0.1)).is_err());
        assert!(s.apply(Setting::Threshold(f64::NAN)).is_err());
        assert_eq!(s.threshold, 0.3);

        s.apply(Setting::Threshold(0.0)).unwrap();
        assert_eq!(s.threshold, 0.0);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut s = settings();
        assert!(s.apply(Setting::Interval(0)).is_err());
        s.apply(Setting::Interval(15)).unwrap();
        assert_eq!(s.interval, 15);
    }

    #[test]
    fn blacklist_behaves_like_a_set() {
        let mut s = settings();
        s.apply(Setting::Blacklist(vec!["BTC".into(), "ETH".into(), "BTC".into()]))
            .unwrap();
        assert_eq!(s.blacklist, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn legacy_update_interval_key_is_read() {
        let s: UserSettings = serde_json::from_str(
            r#"{"threshold":0.5,"exchanges":[],"blacklist":[],"enabled":false,"update_interval":15}"#,
        )
        .unwrap();
        assert_eq!(s.interval, 15);
    }
}
