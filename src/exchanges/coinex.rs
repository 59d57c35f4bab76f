use super::{get_json, parse_f64, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Without a `market` filter the endpoint answers for every futures market.
const FUNDING_RATE_URL: &str = "https://api.coinex.com/v2/futures/funding-rate";

#[derive(Debug, Deserialize)]
struct CoinExResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Vec<CoinExFunding>,
}

#[derive(Debug, Deserialize)]
struct CoinExFunding {
    /// "BTCUSDT"
    market: String,
    #[serde(default)]
    latest_funding_rate: String,
    #[serde(default)]
    next_funding_time: Option<i64>,
}

pub struct CoinEx {
    client: reqwest::Client,
}

impl CoinEx {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_funding(response: CoinExResponse) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
    if response.code != 0 {
        return Err(ExchangeError::UnexpectedData(format!(
            "CoinEx code {}: {}",
            response.code, response.message
        )));
    }

    Ok(response
        .data
        .into_iter()
        .filter_map(|row| {
            let base = row.market.strip_suffix("USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: parse_f64(&row.latest_funding_rate),
                    next_funding_timestamp: row.next_funding_time.filter(|ms| *ms > 0),
                },
            ))
        })
        .collect())
}

#[async_trait]
impl Exchange for CoinEx {
    fn id(&self) -> &'static str {
        "coinex"
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let response = get_json::<CoinExResponse>(&self.client, FUNDING_RATE_URL).await?;
        parse_funding(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usdt_markets_become_entries() {
        let response: CoinExResponse = serde_json::from_str(
            r#"{"code":0,"message":"OK","data":[
                {"market":"BTCUSDT","mark_price":"67000","latest_funding_rate":"0.00015","next_funding_rate":"0.0001","latest_funding_time":1700000000000,"next_funding_time":1700006400000},
                {"market":"BTCUSD","mark_price":"67000","latest_funding_rate":"0.0001","next_funding_time":1700006400000},
                {"market":"WIFUSDT","mark_price":"2.1","latest_funding_rate":"-0.0042","next_funding_time":0}
            ]}"#,
        )
        .unwrap();

        let entries = parse_funding(response).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["BTC/USDT:USDT"].funding_rate, Some(0.00015));
        assert_eq!(
            entries["BTC/USDT:USDT"].next_funding_timestamp,
            Some(1_700_006_400_000)
        );
        assert_eq!(entries["WIF/USDT:USDT"].funding_rate, Some(-0.0042));
        assert_eq!(entries["WIF/USDT:USDT"].next_funding_timestamp, None);
    }

    #[test]
    fn error_code_is_reported() {
        let response: CoinExResponse =
            serde_json::from_str(r#"{"code":3008,"message":"Service busy"}"#).unwrap();
        assert!(parse_funding(response).is_err());
    }
}
