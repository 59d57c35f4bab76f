use super::{get_json, parse_millis, Exchange};
use crate::errors::ExchangeError;
use crate::models::{unified_symbol, Market, Ticker};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const INSTRUMENTS_URL: &str = "https://www.okx.com/api/v5/public/instruments?instType=SWAP";
const FUNDING_RATE_URL: &str = "https://www.okx.com/api/v5/public/funding-rate";

/// Concurrent per-instrument funding requests.
const FUNDING_CONCURRENCY: usize = 8;

#[derive(Debug, Deserialize)]
struct OkxResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "instType")]
    inst_type: String,
    #[serde(rename = "settleCcy", default)]
    settle_ccy: String,
    /// "BTC-USDT"
    #[serde(default)]
    uly: String,
    #[serde(default)]
    state: String,
}

/// OKX only exposes funding per instrument, so it goes through the
/// markets + tickers path. The funding payload is kept under `info`.
pub struct Okx {
    client: reqwest::Client,
}

impl Okx {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_funding(&self, symbol: &str, inst_id: &str) -> Result<Ticker, ExchangeError> {
        let url = format!("{FUNDING_RATE_URL}?instId={inst_id}");
        let response = get_json::<OkxResponse<Value>>(&self.client, &url).await?;
        let row = unwrap_data(response)?.into_iter().next().ok_or_else(|| {
            ExchangeError::UnexpectedData(format!("OKX returned no funding for {inst_id}"))
        })?;
        Ok(funding_ticker(symbol, row))
    }
}

fn unwrap_data<T>(response: OkxResponse<T>) -> Result<Vec<T>, ExchangeError> {
    if response.code != "0" {
        return Err(ExchangeError::UnexpectedData(format!(
            "OKX code {}: {}",
            response.code, response.msg
        )));
    }
    Ok(response.data)
}

fn parse_markets(instruments: Vec<Instrument>) -> Vec<Market> {
    instruments
        .into_iter()
        .filter(|i| i.state.is_empty() || i.state == "live")
        .filter_map(|i| {
            let mut parts = i.uly.split('-');
            let base = parts.next().filter(|b| !b.is_empty())?.to_uppercase();
            let quote = parts.next().unwrap_or_default().to_uppercase();
            Some(Market {
                symbol: unified_symbol(&base),
                swap: i.inst_type == "SWAP" && i.settle_ccy == "USDT",
                id: i.inst_id,
                base,
                quote,
            })
        })
        .collect()
}

/// "BTC/USDT:USDT" → ("BTC/USDT:USDT", "BTC-USDT-SWAP")
fn swap_inst_id(symbol: &str) -> Option<(String, String)> {
    let (pair, settle) = symbol.split_once(':')?;
    let (base, quote) = pair.split_once('/')?;
    (settle == "USDT" && quote == "USDT")
        .then(|| (symbol.to_string(), format!("{base}-{quote}-SWAP")))
}

/// `fundingTime` is the upcoming settlement; the rate stays nested in `info`.
fn funding_ticker(symbol: &str, row: Value) -> Ticker {
    let funding_timestamp = row
        .get("fundingTime")
        .and_then(Value::as_str)
        .and_then(parse_millis)
        .map(Value::from);

    Ticker {
        symbol: symbol.to_string(),
        funding_rate: None,
        funding_timestamp,
        info: row,
    }
}

#[async_trait]
impl Exchange for Okx {
    fn id(&self) -> &'static str {
        "okx"
    }

    fn has_funding_rates(&self) -> bool {
        false
    }

    async fn load_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        let response = get_json::<OkxResponse<Instrument>>(&self.client, INSTRUMENTS_URL).await?;
        Ok(parse_markets(unwrap_data(response)?))
    }

    /// One request per instrument; a failed instrument is dropped, not fatal.
    async fn fetch_tickers(&self, symbols: &[String]) -> Result<HashMap<String, Ticker>, ExchangeError> {
        let ids: Vec<(String, String)> = symbols.iter().filter_map(|s| swap_inst_id(s)).collect();
        let tickers = stream::iter(ids)
            .map(|(symbol, inst_id)| async move {
                match self.fetch_funding(&symbol, &inst_id).await {
                    Ok(ticker) => Some(ticker),
                    Err(e) => {
                        tracing::debug!("[okx] funding for {inst_id} failed: {e}");
                        None
                    }
                }
            })
            .buffer_unordered(FUNDING_CONCURRENCY)
            .filter_map(|ticker| async move { ticker })
            .map(|ticker| (ticker.symbol.clone(), ticker))
            .collect::<HashMap<_, _>>()
            .await;

        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruments_map_to_markets() {
        let response: OkxResponse<Instrument> = serde_json::from_str(
            r#"{"code":"0","msg":"","data":[
                {"instId":"BTC-USDT-SWAP","instType":"SWAP","settleCcy":"USDT","uly":"BTC-USDT","state":"live"},
                {"instId":"BTC-USD-SWAP","instType":"SWAP","settleCcy":"BTC","uly":"BTC-USD","state":"live"},
                {"instId":"OLD-USDT-SWAP","instType":"SWAP","settleCcy":"USDT","uly":"OLD-USDT","state":"suspend"}
            ]}"#,
        )
        .unwrap();

        let markets = parse_markets(unwrap_data(response).unwrap());

        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].id, "BTC-USDT-SWAP");
        assert_eq!(markets[0].symbol, "BTC/USDT:USDT");
        assert!(markets[0].swap);
        assert!(!markets[1].swap);
    }

    #[test]
    fn funding_row_keeps_rate_nested() {
        let row = serde_json::json!({
            "instId": "ETH-USDT-SWAP",
            "fundingRate": "0.00012",
            "fundingTime": "1700006400000",
            "nextFundingTime": "1700035200000"
        });

        let ticker = funding_ticker("ETH/USDT:USDT", row);

        assert_eq!(ticker.funding_rate, None);
        assert_eq!(ticker.info["fundingRate"], "0.00012");
        assert_eq!(ticker.funding_timestamp, Some(Value::from(1_700_006_400_000i64)));
    }

    #[test]
    fn unified_symbols_map_to_swap_ids() {
        assert_eq!(
            swap_inst_id("BTC/USDT:USDT"),
            Some(("BTC/USDT:USDT".to_string(), "BTC-USDT-SWAP".to_string()))
        );
        assert_eq!(swap_inst_id("BTC/USD:BTC"), None);
        assert_eq!(swap_inst_id("BTC"), None);
    }

    #[test]
    fn ticker_fan_out_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let okx = Okx::new(reqwest::Client::new());
        let symbols = vec!["BTC/USDT:USDT".to_string()];
        let future = okx.fetch_tickers(&symbols);
        assert_send(&future);
    }

    #[test]
    fn error_code_is_reported() {
        let response: OkxResponse<Value> =
            serde_json::from_str(r#"{"code":"51001","msg":"Instrument ID does not exist"}"#).unwrap();
        assert!(unwrap_data(response).is_err());
    }
}
