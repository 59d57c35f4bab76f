use super::{get_json, parse_f64, parse_millis, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const TICKERS_URL: &str = "https://api.bybit.com/v5/market/tickers?category=linear";

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i32,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    #[serde(default)]
    result: BybitResult,
}

#[derive(Debug, Default, Deserialize)]
struct BybitResult {
    #[serde(default)]
    list: Vec<BybitTicker>,
}

#[derive(Debug, Deserialize)]
struct BybitTicker {
    symbol: String,

    #[serde(rename = "fundingRate", default)]
    funding_rate: String,

    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: String,
}

pub struct Bybit {
    client: reqwest::Client,
}

impl Bybit {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_tickers(response: BybitResponse) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
    // Bybit signals errors via retCode, not just HTTP status
    if response.ret_code != 0 {
        return Err(ExchangeError::UnexpectedData(format!(
            "Bybit retCode {}: {}",
            response.ret_code, response.ret_msg
        )));
    }

    Ok(response
        .result
        .list
        .into_iter()
        .filter_map(|ticker| {
            let base = ticker.symbol.strip_suffix("USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: parse_f64(&ticker.funding_rate),
                    next_funding_timestamp: parse_millis(&ticker.next_funding_time),
                },
            ))
        })
        .collect())
}

#[async_trait]
impl Exchange for Bybit {
    fn id(&self) -> &'static str {
        "bybit"
    }

    /// Linear tickers carry the funding rate for every perpetual in one call.
    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let response = get_json::<BybitResponse>(&self.client, TICKERS_URL).await?;
        parse_tickers(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_tickers_become_entries() {
        let response: BybitResponse = serde_json::from_str(
            r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","list":[
                {"symbol":"BTCUSDT","lastPrice":"67000","fundingRate":"-0.0005","nextFundingTime":"1700006400000"},
                {"symbol":"BTCPERP","lastPrice":"67000","fundingRate":"0.0001","nextFundingTime":"1700006400000"},
                {"symbol":"SOLUSDT","lastPrice":"150","fundingRate":"","nextFundingTime":"0"}
            ]}}"#,
        )
        .unwrap();

        let entries = parse_tickers(response).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["BTC/USDT:USDT"].funding_rate, Some(-0.0005));
        assert_eq!(entries["SOL/USDT:USDT"].funding_rate, None);
        assert_eq!(entries["SOL/USDT:USDT"].next_funding_timestamp, None);
    }

    #[test]
    fn non_zero_ret_code_is_an_error() {
        let response: BybitResponse = serde_json::from_str(
            r#"{"retCode":10001,"retMsg":"params error","result":{"list":[]}}"#,
        )
        .unwrap();

        assert!(matches!(
            parse_tickers(response),
            Err(ExchangeError::UnexpectedData(_))
        ));
    }
}
