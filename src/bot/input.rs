use crate::ranking::clean_ticker;

/// Reads a threshold reply such as "0.5", "0,5" or "-0.5%". The sign is
/// dropped since the threshold applies to both directions.
pub fn parse_threshold(text: &str) -> Option<f64> {
    let normalized = text.trim().trim_end_matches('%').trim().replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(f64::abs)
}

/// Splits a reply like "btc, eth sol" into base symbols. Fails on the first
/// token that is not a ticker.
pub fn parse_symbols(text: &str) -> Result<Vec<String>, String> {
    let mut symbols = Vec::new();
    for token in text.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
        let symbol = clean_ticker(token).ok_or_else(|| token.to_string())?;
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    if symbols.is_empty() {
        return Err(text.trim().to_string());
    }
    Ok(symbols)
}

/// Free text that is just a number is a stray settings reply, not a ticker.
pub fn is_numeric(text: &str) -> bool {
    parse_threshold(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_accepts_comma_percent_and_sign() {
        assert_eq!(parse_threshold("0.5"), Some(0.5));
        assert_eq!(parse_threshold(" 0,25 "), Some(0.25));
        assert_eq!(parse_threshold("-0.1%"), Some(0.1));
        assert_eq!(parse_threshold("abc"), None);
        assert_eq!(parse_threshold("inf"), None);
        assert_eq!(parse_threshold(""), None);
    }

    #[test]
    fn symbols_are_cleaned_and_deduplicated() {
        assert_eq!(
            parse_symbols("btc, ETHUSDT  btc/usdt sol").unwrap(),
            vec!["BTC", "ETH", "SOL"]
        );
        assert_eq!(parse_symbols("btc $$$").unwrap_err(), "$$$");
        assert!(parse_symbols(" , ").is_err());
    }

    #[test]
    fn numbers_are_not_tickers() {
        assert!(is_numeric("0.3"));
        assert!(!is_numeric("1000PEPE"));
    }
}
