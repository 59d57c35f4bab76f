use crate::models::{FundingQuote, FundingTable};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Best offer per symbol above `threshold`, strongest first, at most `top_n` rows.
///
/// The best offer is the quote with the largest absolute rate; on a tie the
/// quote seen first in the table is kept. Blacklisted symbols never appear.
/// An empty result is a normal outcome.
pub fn rank(table: &FundingTable, threshold: f64, blacklist: &[String], top_n: usize) -> Vec<FundingQuote> {
    let mut best: HashMap<&str, &FundingQuote> = HashMap::new();

    for quote in table.iter() {
        if blacklist.iter().any(|b| b.eq_ignore_ascii_case(&quote.symbol)) {
            continue;
        }
        best.entry(quote.symbol.as_str())
            .and_modify(|current| {
                if quote.rate.abs() > current.rate.abs() {
                    *current = quote;
                }
            })
            .or_insert(quote);
    }

    let mut ranked: Vec<FundingQuote> = best
        .into_values()
        .filter(|q| q.rate.abs() >= threshold)
        .cloned()
        .collect();

    ranked.sort_by(|a, b| {
        OrderedFloat(b.rate.abs())
            .cmp(&OrderedFloat(a.rate.abs()))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    ranked.truncate(top_n);
    ranked
}

/// Every exchange's quote for one ticker, highest rate first.
pub fn ticker_view(table: &FundingTable, ticker: &str) -> Vec<FundingQuote> {
    let Some(symbol) = clean_ticker(ticker) else {
        return Vec::new();
    };
    let mut rows = table.for_symbol(&symbol);
    rows.sort_by_key(|q| Reverse(OrderedFloat(q.rate)));
    rows
}

/// Normalizes user input to a base symbol: "btc/usdt" → "BTC".
/// Returns `None` when what is left is empty or not alphanumeric.
pub fn clean_ticker(text: &str) -> Option<String> {
    let upper = text.trim().to_uppercase();
    let stripped = upper.replace("USDT", "").replace(['/', '-', ':', ' '], "");
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, exchange: &str, rate: f64) -> FundingQuote {
        FundingQuote {
            symbol: symbol.to_string(),
            rate,
            exchange: exchange.to_string(),
            next_funding_time: None,
        }
    }

    fn sample() -> FundingTable {
        vec![
            quote("BTC", "Binance", 0.01),
            quote("BTC", "ByBit", -0.05),
            quote("ETH", "OKX", 0.12),
        ]
        .into_iter()
        .collect()
    }

    fn summary(rows: &[FundingQuote]) -> Vec<(&str, &str, f64)> {
        rows.iter()
            .map(|q| (q.symbol.as_str(), q.exchange.as_str(), q.rate))
            .collect()
    }

    #[test]
    fn best_offer_per_symbol_sorted_by_magnitude() {
        let ranked = rank(&sample(), 0.02, &[], 10);
        assert_eq!(
            summary(&ranked),
            vec![("ETH", "OKX", 0.12), ("BTC", "ByBit", -0.05)]
        );
    }

    #[test]
    fn high_threshold_yields_nothing() {
        assert!(rank(&sample(), 0.2, &[], 10).is_empty());
    }

    #[test]
    fn blacklist_removes_symbol_regardless_of_rate() {
        let ranked = rank(&sample(), 0.0, &["btc".to_string()], 10);
        assert_eq!(summary(&ranked), vec![("ETH", "OKX", 0.12)]);
    }

    #[test]
    fn ties_keep_first_quote_and_order_by_symbol() {
        let table: FundingTable = vec![
            quote("SOL", "Binance", 0.3),
            quote("SOL", "ByBit", -0.3),
            quote("ADA", "OKX", 0.3),
            quote("XRP", "OKX", 0.01),
        ]
        .into_iter()
        .collect();

        let ranked = rank(&table, 0.0, &[], 2);

        assert_eq!(
            summary(&ranked),
            vec![("ADA", "OKX", 0.3), ("SOL", "Binance", 0.3)]
        );
    }

    #[test]
    fn ticker_view_keeps_all_exchanges() {
        let rows = ticker_view(&sample(), "btc/usdt");
        assert_eq!(
            summary(&rows),
            vec![("BTC", "Binance", 0.01), ("BTC", "ByBit", -0.05)]
        );
        assert!(ticker_view(&sample(), "!!").is_empty());
    }

    #[test]
    fn clean_ticker_strips_quote_and_separators() {
        assert_eq!(clean_ticker(" btcusdt ").as_deref(), Some("BTC"));
        assert_eq!(clean_ticker("ETH-USDT").as_deref(), Some("ETH"));
        assert_eq!(clean_ticker("1000pepe/usdt:usdt").as_deref(), Some("1000PEPE"));
        assert_eq!(clean_ticker("USDT"), None);
        assert_eq!(clean_ticker("b@d"), None);
    }
}
