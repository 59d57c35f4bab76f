use super::{get_json, parse_f64, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const PREMIUM_INDEX_URL: &str = "https://fapi.binance.com/fapi/v1/premiumIndex";

/// The raw JSON shape Binance sends back, one element per symbol
#[derive(Debug, Deserialize)]
struct PremiumIndexResponse {
    symbol: String,

    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,

    #[serde(rename = "nextFundingTime")]
    next_funding_time: i64,
}

pub struct Binance {
    client: reqwest::Client,
}

impl Binance {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Maps premiumIndex rows into unified entries. Delivery contracts
/// ("BTCUSDT_250328") and non-USDT pairs have no USDT suffix and are dropped.
fn parse_premium_index(rows: Vec<PremiumIndexResponse>) -> HashMap<String, FundingRateEntry> {
    rows.into_iter()
        .filter_map(|row| {
            let base = row.symbol.strip_suffix("USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: parse_f64(&row.last_funding_rate),
                    next_funding_timestamp: Some(row.next_funding_time).filter(|ms| *ms > 0),
                },
            ))
        })
        .collect()
}

#[async_trait]
impl Exchange for Binance {
    fn id(&self) -> &'static str {
        "binanceusdm"
    }

    /// Hits premiumIndex without a symbol, which returns every perpetual.
    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let rows = get_json::<Vec<PremiumIndexResponse>>(&self.client, PREMIUM_INDEX_URL).await?;
        Ok(parse_premium_index(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_index_rows_are_unified() {
        let rows: Vec<PremiumIndexResponse> = serde_json::from_str(
            r#"[
                {"symbol":"BTCUSDT","markPrice":"67000.1","lastFundingRate":"0.00010000","nextFundingTime":1700006400000},
                {"symbol":"ETHUSDT","markPrice":"3500","lastFundingRate":"","nextFundingTime":0},
                {"symbol":"BTCUSDT_250328","markPrice":"68000","lastFundingRate":"","nextFundingTime":0},
                {"symbol":"ETHBTC","markPrice":"0.05","lastFundingRate":"0.0001","nextFundingTime":1700006400000}
            ]"#,
        )
        .unwrap();

        let entries = parse_premium_index(rows);

        assert_eq!(entries.len(), 2);
        let btc = &entries["BTC/USDT:USDT"];
        assert_eq!(btc.funding_rate, Some(0.0001));
        assert_eq!(btc.next_funding_timestamp, Some(1_700_006_400_000));

        let eth = &entries["ETH/USDT:USDT"];
        assert_eq!(eth.funding_rate, None);
        assert_eq!(eth.next_funding_timestamp, None);
    }
}
