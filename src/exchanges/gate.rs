use super::{get_json, parse_f64, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const CONTRACTS_URL: &str = "https://api.gateio.ws/api/v4/futures/usdt/contracts";

#[derive(Debug, Deserialize)]
struct GateContract {
    /// "BTC_USDT"
    name: String,
    #[serde(default)]
    funding_rate: String,
    /// Unix seconds.
    #[serde(default)]
    funding_next_apply: Option<i64>,
    #[serde(default)]
    in_delisting: bool,
}

pub struct Gate {
    client: reqwest::Client,
}

impl Gate {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_contracts(contracts: Vec<GateContract>) -> HashMap<String, FundingRateEntry> {
    contracts
        .into_iter()
        .filter(|c| !c.in_delisting)
        .filter_map(|c| {
            let base = c.name.strip_suffix("_USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: parse_f64(&c.funding_rate),
                    next_funding_timestamp: c
                        .funding_next_apply
                        .filter(|s| *s > 0)
                        .map(|s| s * 1000),
                },
            ))
        })
        .collect()
}

#[async_trait]
impl Exchange for Gate {
    fn id(&self) -> &'static str {
        "gate"
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let contracts = get_json::<Vec<GateContract>>(&self.client, CONTRACTS_URL).await?;
        Ok(parse_contracts(contracts))
    }
}
