use super::{get_json, parse_f64, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, FundingRateEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const PREMIUM_INDEX_URL: &str = "https://open-api.bingx.com/openApi/swap/v2/quote/premiumIndex";

#[derive(Debug, Deserialize)]
struct BingXResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<PremiumIndex>,
}

#[derive(Debug, Deserialize)]
struct PremiumIndex {
    /// "BTC-USDT"
    symbol: String,
    #[serde(rename = "lastFundingRate", default)]
    last_funding_rate: String,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: Option<i64>,
}

pub struct BingX {
    client: reqwest::Client,
}

impl BingX {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_premium_index(response: BingXResponse) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
    if response.code != 0 {
        return Err(ExchangeError::UnexpectedData(format!(
            "BingX code {}: {}",
            response.code, response.msg
        )));
    }

    Ok(response
        .data
        .into_iter()
        .filter_map(|row| {
            let base = row.symbol.strip_suffix("-USDT")?;
            let symbol = unified_symbol(base);
            Some((
                symbol.clone(),
                FundingRateEntry {
                    symbol,
                    funding_rate: parse_f64(&row.last_funding_rate),
                    next_funding_timestamp: row.next_funding_time.filter(|ms| *ms > 0),
                },
            ))
        })
        .collect())
}

#[async_trait]
impl Exchange for BingX {
    fn id(&self) -> &'static str {
        "bingx"
    }

    async fn fetch_funding_rates(&self) -> Result<HashMap<String, FundingRateEntry>, ExchangeError> {
        let response = get_json::<BingXResponse>(&self.client, PREMIUM_INDEX_URL).await?;
        parse_premium_index(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_index_rows_become_entries() {
        let response: BingXResponse = serde_json::from_str(
            r#"{"code":0,"msg":"","data":[
                {"symbol":"DOGE-USDT","markPrice":"0.16","lastFundingRate":"0.00035","nextFundingTime":1700006400000},
                {"symbol":"NCSKGME2USD-USDT","markPrice":"21","lastFundingRate":"","nextFundingTime":1700006400000}
            ]}"#,
        )
        .unwrap();

        let entries = parse_premium_index(response).unwrap();

        assert_eq!(entries["DOGE/USDT:USDT"].funding_rate, Some(0.00035));
        assert_eq!(entries["NCSKGME2USD/USDT:USDT"].funding_rate, None);
    }
}
