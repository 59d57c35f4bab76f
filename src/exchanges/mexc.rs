use super::{get_json, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, Market, Ticker};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const CONTRACT_DETAIL_URL: &str = "https://contract.mexc.com/api/v1/contract/detail";
const CONTRACT_TICKER_URL: &str = "https://contract.mexc.com/api/v1/contract/ticker";

#[derive(Debug, Deserialize)]
struct MexcResponse<T> {
    success: bool,
    #[serde(default)]
    code: i64,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ContractDetail {
    symbol: String,
    #[serde(rename = "baseCoin")]
    base_coin: String,
    #[serde(rename = "quoteCoin")]
    quote_coin: String,
    #[serde(rename = "settleCoin", default)]
    settle_coin: String,
    /// 0 = enabled
    #[serde(default)]
    state: i64,
}

/// MEXC has no bulk funding-rate endpoint; the contract ticker carries
/// `fundingRate` at the top level instead.
pub struct Mexc {
    client: reqwest::Client,
}

impl Mexc {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn unwrap_data<T>(response: MexcResponse<T>) -> Result<T, ExchangeError> {
    match response {
        MexcResponse { success: true, data: Some(data), .. } => Ok(data),
        MexcResponse { code, .. } => Err(ExchangeError::UnexpectedData(format!(
            "MEXC answered with code {code}"
        ))),
    }
}

fn parse_markets(details: Vec<ContractDetail>) -> Vec<Market> {
    details
        .into_iter()
        .filter(|d| d.state == 0)
        .map(|d| Market {
            symbol: unified_symbol(&d.base_coin),
            swap: d.settle_coin.eq_ignore_ascii_case("USDT"),
            id: d.symbol,
            base: d.base_coin.to_uppercase(),
            quote: d.quote_coin.to_uppercase(),
        })
        .collect()
}

/// Keeps only rows for the requested symbols, keyed by unified symbol.
fn parse_tickers(rows: Vec<Value>, wanted: &[String]) -> HashMap<String, Ticker> {
    let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();

    rows.into_iter()
        .filter_map(|row| {
            let base = row.get("symbol")?.as_str()?.strip_suffix("_USDT")?.to_string();
            let symbol = unified_symbol(&base);
            if !wanted.contains(symbol.as_str()) {
                return None;
            }
            let ticker = Ticker {
                symbol: symbol.clone(),
                funding_rate: row.get("fundingRate").cloned(),
                funding_timestamp: None,
                info: row,
            };
            Some((symbol, ticker))
        })
        .collect()
}

#[async_trait]
impl Exchange for Mexc {
    fn id(&self) -> &'static str {
        "mexc"
    }

    fn has_funding_rates(&self) -> bool {
        false
    }

    async fn load_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        let response =
            get_json::<MexcResponse<Vec<ContractDetail>>>(&self.client, CONTRACT_DETAIL_URL).await?;
        Ok(parse_markets(unwrap_data(response)?))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let response = get_json::<MexcResponse<Vec<Value>>>(&self.client, CONTRACT_TICKER_URL).await?;
        Ok(parse_tickers(unwrap_data(response)?, symbols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_details_map_to_markets() {
        let response: MexcResponse<Vec<ContractDetail>> = serde_json::from_str(
            r#"{"success":true,"code":0,"data":[
                {"symbol":"BTC_USDT","baseCoin":"BTC","quoteCoin":"USDT","settleCoin":"USDT","state":0},
                {"symbol":"OLD_USDT","baseCoin":"OLD","quoteCoin":"USDT","settleCoin":"USDT","state":3},
                {"symbol":"BTC_USD","baseCoin":"BTC","quoteCoin":"USD","settleCoin":"BTC","state":0}
            ]}"#,
        )
        .unwrap();

        let markets = parse_markets(unwrap_data(response).unwrap());

        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].symbol, "BTC/USDT:USDT");
        assert!(markets[0].swap);
        assert_eq!(markets[1].quote, "USD");
        assert!(!markets[1].swap);
    }

    #[test]
    fn tickers_are_limited_to_requested_symbols() {
        let response: MexcResponse<Vec<Value>> = serde_json::from_str(
            r#"{"success":true,"code":0,"data":[
                {"symbol":"BTC_USDT","lastPrice":67000,"fundingRate":0.0001},
                {"symbol":"ETH_USDT","lastPrice":3500,"fundingRate":-0.0002}
            ]}"#,
        )
        .unwrap();

        let tickers = parse_tickers(unwrap_data(response).unwrap(), &["BTC/USDT:USDT".to_string()]);

        assert_eq!(tickers.len(), 1);
        let btc = &tickers["BTC/USDT:USDT"];
        assert_eq!(btc.funding_rate, Some(serde_json::json!(0.0001)));
        assert_eq!(btc.info["lastPrice"], 67000);
    }

    #[test]
    fn unsuccessful_envelope_is_an_error() {
        let response: MexcResponse<Vec<Value>> =
            serde_json::from_str(r#"{"success":false,"code":510}"#).unwrap();
        assert!(unwrap_data(response).is_err());
    }
}
