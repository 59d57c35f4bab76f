use super::{get_json, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

const ACTIVE_CONTRACTS_URL: &str = "https://api-futures.kucoin.com/api/v1/contracts/active";

#[derive(Debug, Deserialize)]
struct KuCoinResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Contract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Contract {
    base_currency: String,
    quote_currency: String,
    #[serde(default)]
    is_inverse: bool,
    funding_fee_rate: Option<f64>,
    /// Milliseconds until the next settlement, not a timestamp.
    next_funding_rate_time: Option<i64>,
}

pub struct KuCoin {
    client: reqwest::Client,
}

impl KuCoin {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// KuCoin names bitcoin "XBT".
fn normalize_base(base: &str) -> &str {
    if base.eq_ignore_ascii_case("XBT") { "BTC" } else { base }
}

fn parse_contracts(
    response: KuCoinResponse,
    now_ms: i64,
) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
    if response.code != "200000" {
        return Err(ExchangeError::UnexpectedData(format!(
            "KuCoin code {}: {}",
            response.code, response.msg
        )));
    }

    Ok(response
        .data
        .into_iter()
        .filter(|c| !c.is_inverse && c.quote_currency == "USDT")
        .map(|c| {
            let symbol = unified_symbol(normalize_base(&c.base_currency));
            let entry = FundingRateEntry {
                symbol: symbol.clone(),
                funding_rate: c.funding_fee_rate.filter(|r| r.is_finite()),
                next_funding_timestamp: c
                    .next_funding_rate_time
                    .filter(|ms| *ms > 0)
                    .map(|ms| now_ms + ms),
            };
            (symbol, entry)
        })
        .collect())
}

#[async_trait]
impl Exchange for KuCoin {
    fn id(&self) -> &'static str {
        "kucoinfutures"
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let response = get_json::<KuCoinResponse>(&self.client, ACTIVE_CONTRACTS_URL).await?;
        parse_contracts(response, Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_contracts_become_entries() {
        let response: KuCoinResponse = serde_json::from_str(
            r#"{"code":"200000","data":[
                {"symbol":"XBTUSDTM","baseCurrency":"XBT","quoteCurrency":"USDT","isInverse":false,"fundingFeeRate":0.0001,"nextFundingRateTime":3600000},
                {"symbol":"XBTUSDM","baseCurrency":"XBT","quoteCurrency":"USD","isInverse":true,"fundingFeeRate":0.0001,"nextFundingRateTime":3600000},
                {"symbol":"NEWUSDTM","baseCurrency":"NEW","quoteCurrency":"USDT","isInverse":false,"fundingFeeRate":null,"nextFundingRateTime":null}
            ]}"#,
        )
        .unwrap();

        let entries = parse_contracts(response, 1_700_000_000_000).unwrap();

        assert_eq!(entries.len(), 2);
        let btc = &entries["BTC/USDT:USDT"];
        assert_eq!(btc.funding_rate, Some(0.0001));
        assert_eq!(btc.next_funding_timestamp, Some(1_700_003_600_000));
        assert_eq!(entries["NEW/USDT:USDT"].funding_rate, None);
    }
}
