use super::{get_json, parse_f64, parse_millis, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const BATCH_FUNDING_URL: &str = "https://api.hbdm.com/linear-swap-api/v1/swap_batch_funding_rate";

#[derive(Debug, Deserialize)]
struct HtxResponse {
    status: String,
    #[serde(rename = "err_msg", default)]
    err_msg: Option<String>,
    #[serde(default)]
    data: Vec<HtxFunding>,
}

#[derive(Debug, Deserialize)]
struct HtxFunding {
    /// "BTC-USDT"
    contract_code: String,
    #[serde(default)]
    funding_rate: Option<String>,
    #[serde(default)]
    funding_time: Option<String>,
}

/// Huobi, now HTX. Batch funding covers every linear swap in one call.
pub struct Htx {
    client: reqwest::Client,
}

impl Htx {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_batch(response: HtxResponse) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
    if response.status != "ok" {
        return Err(ExchangeError::UnexpectedData(format!(
            "HTX status {}: {}",
            response.status,
            response.err_msg.unwrap_or_default()
        )));
    }

    Ok(response
        .data
        .into_iter()
        .filter_map(|row| {
            let base = row.contract_code.strip_suffix("-USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: row.funding_rate.as_deref().and_then(parse_f64),
                    next_funding_timestamp: row.funding_time.as_deref().and_then(parse_millis),
                },
            ))
        })
        .collect())
}

#[async_trait]
impl Exchange for Htx {
    fn id(&self) -> &'static str {
        "huobi"
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let response = get_json::<HtxResponse>(&self.client, BATCH_FUNDING_URL).await?;
        parse_batch(response)
    }
}
