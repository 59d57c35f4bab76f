use crate::errors::ConfigError;
use crate::settings::{Setting, UserSettings};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Display name → exchange client identifier.
pub const AVAILABLE_EXCHANGES: &[(&str, &str)] = &[
    ("Binance", "binanceusdm"),
    ("ByBit", "bybit"),
    ("MEXC", "mexc"),
    ("OKX", "okx"),
    ("Bitget", "bitget"),
    ("KuCoin", "kucoinfutures"),
    ("Gate.io", "gate"),
    ("Huobi", "huobi"),
    ("BingX", "bingx"),
    ("CoinEx", "coinex"),
    ("Bitmart", "bitmart"),
];

/// Display name → trade page. Placeholders: `{base}` (BTC),
/// `{symbol}` (BTCUSDT), `{symbol_hyphen}` (BTC-USDT).
pub const EXCHANGE_URL_TEMPLATES: &[(&str, &str)] = &[
    ("Binance", "https://www.binance.com/en/futures/{symbol}"),
    ("ByBit", "https://www.bybit.com/trade/usdt/{symbol}"),
    ("MEXC", "https://futures.mexc.com/exchange/{base}_USDT"),
    ("OKX", "https://www.okx.com/trade-swap/{symbol_hyphen}-swap"),
    ("Bitget", "https://www.bitget.com/futures/usdt/{symbol}"),
    ("KuCoin", "https://www.kucoin.com/futures/trade/{base}USDTM"),
    ("Gate.io", "https://www.gate.io/futures_trade/USDT/{base}_USDT"),
    (
        "Huobi",
        "https://futures.huobi.com/en-us/linear_swap/exchange/swap_trade/?contract_code={symbol_hyphen}",
    ),
    ("BingX", "https://swap.bingx.com/en-us/{symbol_hyphen}"),
    ("CoinEx", "https://www.coinex.com/en/futures/{symbol_hyphen}"),
    ("Bitmart", "https://derivatives.bitmart.com/en-US?symbol={symbol}"),
];

pub fn exchange_id(display_name: &str) -> Option<&'static str> {
    AVAILABLE_EXCHANGES
        .iter()
        .find(|(name, _)| *name == display_name)
        .map(|(_, id)| *id)
}

pub fn url_template(display_name: &str) -> Option<&'static str> {
    EXCHANGE_URL_TEMPLATES
        .iter()
        .find(|(name, _)| *name == display_name)
        .map(|(_, template)| *template)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    /// `None` keeps settings in memory only.
    pub settings_file: Option<PathBuf>,
    pub top_n: usize,
    pub request_timeout: Duration,
    pub exchange_timeout: Duration,
    pub job_timeout: Duration,
    pub display_utc_offset_hours: i32,
    /// `None` disables the ops HTTP server.
    pub api_port: Option<u16>,
    pub log_format: LogFormat,
    pub defaults: UserSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let settings_file = match lookup("SETTINGS_FILE") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from("data/user_settings.json")),
        };

        let api_port = match parse_or(&lookup, "API_PORT", 3000u16)? {
            0 => None,
            port => Some(port),
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            Some("text") | Some("") | None => LogFormat::Text,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        // default to the exchanges most chats start with
        let exchanges = lookup("DEFAULT_EXCHANGES")
            .unwrap_or_else(|| "Binance,ByBit,OKX,MEXC,Bitget,KuCoin,Gate.io".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        if let Some(unknown) = exchanges.iter().find(|name| exchange_id(name).is_none()) {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_EXCHANGES",
                value: unknown.clone(),
            });
        }

        let display_utc_offset_hours: i32 = parse_or(&lookup, "DISPLAY_UTC_OFFSET_HOURS", 3)?;
        if !(-12..=14).contains(&display_utc_offset_hours) {
            return Err(ConfigError::Invalid {
                key: "DISPLAY_UTC_OFFSET_HOURS",
                value: display_utc_offset_hours.to_string(),
            });
        }

        let mut defaults = UserSettings {
            threshold: 0.3,
            exchanges,
            blacklist: Vec::new(),
            enabled: true,
            interval: 60,
        };
        // same checks a chat's own update goes through
        let threshold: f64 = parse_or(&lookup, "DEFAULT_THRESHOLD", 0.3)?;
        defaults
            .apply(Setting::Threshold(threshold))
            .map_err(|_| ConfigError::Invalid {
                key: "DEFAULT_THRESHOLD",
                value: threshold.to_string(),
            })?;
        let interval: u32 = parse_or(&lookup, "DEFAULT_INTERVAL", 60)?;
        defaults
            .apply(Setting::Interval(interval))
            .map_err(|_| ConfigError::Invalid {
                key: "DEFAULT_INTERVAL",
                value: interval.to_string(),
            })?;

        let top_n: usize = parse_or(&lookup, "TOP_N", 10)?;
        if top_n == 0 {
            return Err(ConfigError::Invalid {
                key: "TOP_N",
                value: top_n.to_string(),
            });
        }

        Ok(Self {
            telegram_token,
            settings_file,
            top_n,
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 20)?),
            exchange_timeout: Duration::from_secs(parse_or(&lookup, "EXCHANGE_TIMEOUT_SECS", 30)?),
            job_timeout: Duration::from_secs(parse_or(&lookup, "JOB_TIMEOUT_SECS", 120)?),
            display_utc_offset_hours,
            api_port,
            log_format,
            defaults,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { key, value: raw })
        }
        _ => Ok(default),
    }
}
