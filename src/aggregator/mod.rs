use crate::errors::ExchangeError;
use crate::exchanges::{Exchange, ExchangeRegistry};
use crate::models::{base_symbol, datetime_from_millis, FundingQuote, FundingRateEntry, FundingTable, Market, Ticker};
use crate::ranking;
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Collects funding rates from the configured exchanges into one table.
#[derive(Clone)]
pub struct FundingAggregator {
    registry: ExchangeRegistry,
    exchange_timeout: Duration,
}

impl FundingAggregator {
    pub fn new(registry: ExchangeRegistry, exchange_timeout: Duration) -> Self {
        Self {
            registry,
            exchange_timeout,
        }
    }

    /// Scans every named exchange. Unknown names are skipped and a failing
    /// exchange contributes nothing; the merge keeps input order so the
    /// first quote per (symbol, exchange) wins.
    pub async fn collect(&self, exchanges: &[String]) -> FundingTable {
        let started = Instant::now();
        tracing::info!("Scanning funding rates on {:?}", exchanges);

        let resolved: Vec<(&str, Arc<dyn Exchange>)> = exchanges
            .iter()
            .filter_map(|name| match self.registry.get(name) {
                Some(exchange) => Some((name.as_str(), exchange)),
                None => {
                    tracing::warn!("[{name}] skipped: not in the exchange table");
                    None
                }
            })
            .collect();

        let per_exchange = join_all(
            resolved
                .iter()
                .map(|(name, exchange)| self.collect_exchange(name, exchange.as_ref())),
        )
        .await;

        let mut table = FundingTable::new();
        for quotes in per_exchange {
            table.extend(quotes);
        }

        metrics::counter!("funding_scans_total").increment(1);
        metrics::histogram!("funding_scan_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            "Scan finished: {} quotes from {} exchanges in {:.1}s",
            table.len(),
            resolved.len(),
            started.elapsed().as_secs_f64()
        );
        table
    }

    /// Full scan narrowed to one ticker, every exchange kept, rate descending.
    pub async fn collect_for_ticker(&self, ticker: &str, exchanges: &[String]) -> Vec<FundingQuote> {
        let table = self.collect(exchanges).await;
        ranking::ticker_view(&table, ticker)
    }

    async fn collect_exchange(&self, name: &str, exchange: &dyn Exchange) -> Vec<FundingQuote> {
        let result = match tokio::time::timeout(self.exchange_timeout, fetch_quotes(name, exchange)).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout(self.exchange_timeout)),
        };

        match result {
            Ok(quotes) => {
                tracing::info!("[{name}] {} funding quotes", quotes.len());
                quotes
            }
            Err(e) => {
                tracing::error!("[{name}] Failed: {e}");
                metrics::counter!("funding_exchange_failures_total", "exchange" => name.to_string())
                    .increment(1);
                Vec::new()
            }
        }
    }
}

/// Bulk call when the exchange advertises it, otherwise (or when the bulk
/// call answers `NotSupported`) markets + tickers.
pub async fn fetch_quotes(name: &str, exchange: &dyn Exchange) -> Result<Vec<FundingQuote>, ExchangeError> {
    if exchange.has_funding_rates() {
        match exchange.fetch_funding_rates().await {
            Ok(rates) => return Ok(quotes_from_funding_rates(name, rates)),
            Err(ExchangeError::NotSupported(op)) => {
                tracing::warn!("[{name}] {op} unavailable, scanning tickers instead");
            }
            Err(e) => return Err(e),
        }
    }
    fetch_quotes_from_tickers(name, exchange).await
}

async fn fetch_quotes_from_tickers(
    name: &str,
    exchange: &dyn Exchange,
) -> Result<Vec<FundingQuote>, ExchangeError> {
    let mut perpetuals: Vec<Market> = exchange
        .load_markets()
        .await?
        .into_iter()
        .filter(|m| m.swap && m.quote.eq_ignore_ascii_case("USDT"))
        .collect();

    if perpetuals.is_empty() {
        tracing::warn!("[{name}] no USDT perpetuals listed");
        return Ok(Vec::new());
    }
    perpetuals.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let symbols: Vec<String> = perpetuals.iter().map(|m| m.symbol.clone()).collect();
    let tickers = exchange.fetch_tickers(&symbols).await?;
    Ok(quotes_from_tickers(name, &perpetuals, &tickers))
}

/// Keeps USDT instruments with a usable rate; fraction → percent.
fn quotes_from_funding_rates(name: &str, rates: HashMap<String, FundingRateEntry>) -> Vec<FundingQuote> {
    let mut entries: Vec<FundingRateEntry> = rates.into_values().collect();
    entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    entries
        .into_iter()
        .filter(|e| e.symbol.contains("USDT"))
        .filter_map(|e| {
            let rate = e.funding_rate.filter(|r| r.is_finite())?;
            Some(FundingQuote {
                symbol: base_symbol(&e.symbol),
                rate: rate * 100.0,
                exchange: name.to_string(),
                next_funding_time: e.next_funding_timestamp.and_then(datetime_from_millis),
            })
        })
        .collect()
}

/// One quote per market that has a ticker with a usable rate, in market order.
fn quotes_from_tickers(name: &str, markets: &[Market], tickers: &HashMap<String, Ticker>) -> Vec<FundingQuote> {
    markets
        .iter()
        .filter_map(|market| {
            let Some(ticker) = tickers.get(&market.symbol) else {
                tracing::debug!("[{name}] no ticker for {}", market.id);
                return None;
            };
            let rate = funding_field(ticker, "fundingRate", ticker.funding_rate.as_ref())
                .and_then(value_as_f64)?;
            let next = funding_field(ticker, "nextFundingTime", ticker.funding_timestamp.as_ref())
                .and_then(value_as_millis)
                .and_then(datetime_from_millis);
            Some(FundingQuote {
                symbol: market.base.to_uppercase(),
                rate: rate * 100.0,
                exchange: name.to_string(),
                next_funding_time: next,
            })
        })
        .collect()
}

/// Top-level value when present and non-null, else the provider field in `info`.
fn funding_field<'a>(ticker: &'a Ticker, info_key: &str, top_level: Option<&'a Value>) -> Option<&'a Value> {
    top_level
        .filter(|v| !v.is_null())
        .or_else(|| ticker.info.get(info_key).filter(|v| !v.is_null()))
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn value_as_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
