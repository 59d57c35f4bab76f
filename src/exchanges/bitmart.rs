use super::{get_json, parse_f64, parse_millis, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const DETAILS_URL: &str = "https://api-cloud-v2.bitmart.com/contract/public/details";

/// `product_type` of perpetual contracts; 2 is delivery.
const PERPETUAL: i64 = 1;

#[derive(Debug, Deserialize)]
struct BitmartResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<BitmartData>,
}

#[derive(Debug, Default, Deserialize)]
struct BitmartData {
    #[serde(default)]
    symbols: Vec<BitmartContract>,
}

#[derive(Debug, Deserialize)]
struct BitmartContract {
    /// "BTCUSDT"
    symbol: String,
    product_type: i64,
    #[serde(default)]
    quote_currency: String,
    #[serde(default)]
    funding_rate: String,
    /// Sent as a number or a string depending on the API revision.
    #[serde(default)]
    funding_time: Value,
}

pub struct Bitmart {
    client: reqwest::Client,
}

impl Bitmart {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().filter(|ms| *ms > 0),
        Value::String(s) => parse_millis(s),
        _ => None,
    }
}

fn parse_details(response: BitmartResponse) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
    if response.code != 1000 {
        return Err(ExchangeError::UnexpectedData(format!(
            "Bitmart code {}: {}",
            response.code, response.message
        )));
    }

    Ok(response
        .data
        .unwrap_or_default()
        .symbols
        .into_iter()
        .filter(|c| c.product_type == PERPETUAL && c.quote_currency == "USDT")
        .filter_map(|c| {
            let base = c.symbol.strip_suffix("USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: parse_f64(&c.funding_rate),
                    next_funding_timestamp: millis(&c.funding_time),
                },
            ))
        })
        .collect())
}

#[async_trait]
impl Exchange for Bitmart {
    fn id(&self) -> &'static str {
        "bitmart"
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let response = get_json::<BitmartResponse>(&self.client, DETAILS_URL).await?;
        parse_details(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpetual_usdt_contracts_become_entries() {
        let response: BitmartResponse = serde_json::from_str(
            r#"{"code":1000,"message":"Ok","data":{"symbols":[
                {"symbol":"BTCUSDT","product_type":1,"base_currency":"BTC","quote_currency":"USDT","funding_rate":"0.0001","funding_time":1700006400000},
                {"symbol":"ETHUSDT","product_type":1,"base_currency":"ETH","quote_currency":"USDT","funding_rate":"-0.00035","funding_time":"1700006400000"},
                {"symbol":"BTCUSDT0329","product_type":2,"base_currency":"BTC","quote_currency":"USDT","funding_rate":"","funding_time":0},
                {"symbol":"BTCUSD","product_type":1,"base_currency":"BTC","quote_currency":"USD","funding_rate":"0.0001","funding_time":1700006400000}
            ]}}"#,
        )
        .unwrap();

        let entries = parse_details(response).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["BTC/USDT:USDT"].funding_rate, Some(0.0001));
        assert_eq!(
            entries["BTC/USDT:USDT"].next_funding_timestamp,
            Some(1_700_006_400_000)
        );
        assert_eq!(
            entries["ETH/USDT:USDT"].next_funding_timestamp,
            Some(1_700_006_400_000)
        );
    }

    #[test]
    fn error_code_is_reported() {
        let response: BitmartResponse =
            serde_json::from_str(r#"{"code":30000,"message":"Not found","data":null}"#).unwrap();
        assert!(parse_details(response).is_err());
    }
}
