use crate::errors::ExchangeError;
use crate::models::{FundingRateEntry, Market, Ticker};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

pub mod binance;
pub mod bingx;
pub mod bitget;
pub mod bitmart;
pub mod bybit;
pub mod coinex;
pub mod gate;
pub mod htx;
pub mod kucoin;
pub mod mexc;
pub mod okx;

/// Exchange-facing operations the aggregator relies on. Symbols in and out
/// are unified ("BTC/USDT:USDT").
#[async_trait]
pub trait Exchange: Send + Sync {
    fn id(&self) -> &'static str;

    /// Whether `fetch_funding_rates` is available as one bulk call.
    fn has_funding_rates(&self) -> bool {
        true
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        Err(ExchangeError::NotSupported("fetch_funding_rates"))
    }

    async fn load_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        Err(ExchangeError::NotSupported("load_markets"))
    }

    async fn fetch_tickers(&self, _symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        Err(ExchangeError::NotSupported("fetch_tickers"))
    }
}

/// Builds the client for an identifier from the static exchange table.
pub fn connect(id: &str, client: &reqwest::Client) -> Option<Arc<dyn Exchange>> {
    let client = client.clone();
    let exchange: Arc<dyn Exchange> = match id {
        "binanceusdm" => Arc::new(binance::Binance::new(client)),
        "bybit" => Arc::new(bybit::Bybit::new(client)),
        "mexc" => Arc::new(mexc::Mexc::new(client)),
        "okx" => Arc::new(okx::Okx::new(client)),
        "bitget" => Arc::new(bitget::Bitget::new(client)),
        "kucoinfutures" => Arc::new(kucoin::KuCoin::new(client)),
        "gate" => Arc::new(gate::Gate::new(client)),
        "huobi" => Arc::new(htx::Htx::new(client)),
        "bingx" => Arc::new(bingx::BingX::new(client)),
        "coinex" => Arc::new(coinex::CoinEx::new(client)),
        "bitmart" => Arc::new(bitmart::Bitmart::new(client)),
        _ => return None,
    };
    Some(exchange)
}

/// Display name → client.
#[derive(Clone, Default)]
pub struct ExchangeRegistry {
    clients: HashMap<String, Arc<dyn Exchange>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: &[(&str, &str)], client: &reqwest::Client) -> Self {
        let mut registry = Self::new();
        for (name, id) in table {
            match connect(id, client) {
                Some(exchange) => registry.insert(name, exchange),
                None => tracing::warn!("[{name}] no client for exchange id {id}"),
            }
        }
        registry
    }

    pub fn insert(&mut self, display_name: &str, exchange: Arc<dyn Exchange>) {
        self.clients.insert(display_name.to_string(), exchange);
    }

    pub fn get(&self, display_name: &str) -> Option<Arc<dyn Exchange>> {
        self.clients.get(display_name).cloned()
    }
}

/// GET a JSON body, failing on non-2xx statuses.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, ExchangeError> {
    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<T>()
        .await?;
    Ok(response)
}

/// Parses a rate that exchanges send either as a string or a number.
/// Empty strings and non-numeric values are treated as absent.
pub(crate) fn parse_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Millisecond timestamps; zero means the exchange has none.
pub(crate) fn parse_millis(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|ms| *ms > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_configured_exchange_has_a_client() {
        let client = reqwest::Client::new();
        for (name, id) in crate::config::AVAILABLE_EXCHANGES {
            let exchange = connect(id, &client).unwrap_or_else(|| panic!("{name} has no client"));
            assert_eq!(exchange.id(), *id);
        }
        assert!(connect("ftx", &client).is_none());
    }

    #[test]
    fn rate_and_timestamp_parsing() {
        assert_eq!(parse_f64("0.0001"), Some(0.0001));
        assert_eq!(parse_f64(" -0.00025 "), Some(-0.00025));
        assert_eq!(parse_f64(""), None);
        assert_eq!(parse_f64("n/a"), None);
        assert_eq!(parse_f64("NaN"), None);

        assert_eq!(parse_millis("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(parse_millis("0"), None);
        assert_eq!(parse_millis(""), None);
    }
}
