use super::{get_json, parse_f64, parse_millis, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const TICKERS_URL: &str = "https://api.bitget.com/api/v2/mix/market/tickers?productType=USDT-FUTURES";

#[derive(Debug, Deserialize)]
struct BitgetResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<BitgetTicker>,
}

#[derive(Debug, Deserialize)]
struct BitgetTicker {
    symbol: String,
    #[serde(rename = "fundingRate", default)]
    funding_rate: String,
    /// Present on some API revisions only.
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: Option<String>,
}

pub struct Bitget {
    client: reqwest::Client,
}

impl Bitget {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_tickers(response: BitgetResponse) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
    if response.code != "00000" {
        return Err(ExchangeError::UnexpectedData(format!(
            "Bitget code {}: {}",
            response.code, response.msg
        )));
    }

    Ok(response
        .data
        .into_iter()
        .filter_map(|ticker| {
            let base = ticker.symbol.strip_suffix("USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: parse_f64(&ticker.funding_rate),
                    next_funding_timestamp: ticker.next_funding_time.as_deref().and_then(parse_millis),
                },
            ))
        })
        .collect())
}

#[async_trait]
impl Exchange for Bitget {
    fn id(&self) -> &'static str {
        "bitget"
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let response = get_json::<BitgetResponse>(&self.client, TICKERS_URL).await?;
        parse_tickers(response)
    }
}
