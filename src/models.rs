use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One exchange's funding rate for one instrument at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingQuote {
    /// Base asset, e.g. "BTC".
    pub symbol: String,
    /// Signed percent.
    pub rate: f64,
    /// Display name of the source exchange.
    pub exchange: String,
    pub next_funding_time: Option<DateTime<Utc>>,
}

/// Quotes from one aggregation run. Holds at most one quote per
/// (symbol, exchange); the first one pushed wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundingTable {
    quotes: Vec<FundingQuote>,
    seen: HashSet<(String, String)>,
}

impl FundingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a quote for the same (symbol, exchange) is already present.
    pub fn push(&mut self, quote: FundingQuote) -> bool {
        let key = (quote.symbol.clone(), quote.exchange.clone());
        if !self.seen.insert(key) {
            return false;
        }
        self.quotes.push(quote);
        true
    }

    pub fn extend<I: IntoIterator<Item = FundingQuote>>(&mut self, quotes: I) {
        for quote in quotes {
            self.push(quote);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FundingQuote> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// All quotes for one base symbol, in table order.
    pub fn for_symbol(&self, symbol: &str) -> Vec<FundingQuote> {
        self.quotes
            .iter()
            .filter(|q| q.symbol == symbol)
            .cloned()
            .collect()
    }
}

impl FromIterator<FundingQuote> for FundingTable {
    fn from_iter<I: IntoIterator<Item = FundingQuote>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

/// Bulk funding-rate record as returned by an exchange client.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRateEntry {
    /// Unified symbol, e.g. "BTC/USDT:USDT".
    pub symbol: String,
    /// Fraction, not percent.
    pub funding_rate: Option<f64>,
    /// Unix milliseconds.
    pub next_funding_timestamp: Option<i64>,
}

/// Tradable instrument from an exchange catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    /// Exchange-native instrument id, e.g. "BTC-USDT-SWAP".
    pub id: String,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub swap: bool,
}

/// Ticker snapshot. Funding fields are kept raw because exchanges put them
/// either at the top level or inside the provider payload (`info`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ticker {
    pub symbol: String,
    pub funding_rate: Option<serde_json::Value>,
    pub funding_timestamp: Option<serde_json::Value>,
    pub info: serde_json::Value,
}

/// Unix milliseconds to UTC. Zero and negative values mean "unknown".
pub fn datetime_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
}

/// "BTC" → "BTC/USDT:USDT"
pub fn unified_symbol(base: &str) -> String {
    format!("{}/USDT:USDT", base.to_uppercase())
}

/// "BTC/USDT:USDT" → "BTC"
pub fn base_symbol(unified: &str) -> String {
    unified
        .split('/')
        .next()
        .unwrap_or(unified)
        .trim()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, exchange: &str, rate: f64) -> FundingQuote {
        FundingQuote {
            symbol: symbol.to_string(),
            rate,
            exchange: exchange.to_string(),
            next_funding_time: None,
        }
    }

    #[test]
    fn first_quote_per_symbol_and_exchange_wins() {
        let table: FundingTable = vec![
            quote("BTC", "Binance", 0.01),
            quote("BTC", "Binance", 0.99),
            quote("BTC", "ByBit", -0.05),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 2);
        let btc = table.for_symbol("BTC");
        assert_eq!(btc[0].rate, 0.01);
        assert_eq!(btc[1].exchange, "ByBit");
    }

    #[test]
    fn base_symbol_strips_quote_and_settlement() {
        assert_eq!(base_symbol("BTC/USDT:USDT"), "BTC");
        assert_eq!(base_symbol("1000pepe/USDT"), "1000PEPE");
        assert_eq!(base_symbol(&unified_symbol("eth")), "ETH");
    }

    #[test]
    fn epoch_is_never_a_funding_time() {
        assert_eq!(datetime_from_millis(0), None);
        assert_eq!(datetime_from_millis(-5), None);
        assert_eq!(
            datetime_from_millis(1_700_006_400_000).map(|t| t.timestamp()),
            Some(1_700_006_400)
        );
    }
}
