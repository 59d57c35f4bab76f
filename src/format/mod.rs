use crate::config::url_template;
use crate::models::{FundingQuote, FundingTable};
use crate::ranking;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use teloxide::utils::html::escape;

/// Shown instead of `HH:MM` when an exchange gives no next funding time.
pub const TIME_PLACEHOLDER: &str = "##:##";

/// Renders funding tables as Telegram HTML.
///
/// Direction glyphs: a negative rate means shorts pay longs and is shown
/// with 🟢 (favors long), a positive rate with 🔴 (favors short).
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    top_n: usize,
    utc_offset: FixedOffset,
}

impl ReportFormatter {
    pub fn new(top_n: usize, utc_offset_hours: i32) -> Self {
        let utc_offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { top_n, utc_offset }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn funding_update(
        &self,
        table: &FundingTable,
        threshold: f64,
        blacklist: &[String],
        now: DateTime<Utc>,
    ) -> String {
        if table.is_empty() {
            return "No funding data found for the selected exchanges.".to_string();
        }

        let ranked = ranking::rank(table, threshold, blacklist, self.top_n);
        if ranked.is_empty() {
            return format!(
                "🟢 No coins with funding above <b>{threshold}%</b> or below <b>-{threshold}%</b>."
            );
        }

        let mut out = format!(
            "<b>💎 Funding above {threshold}%</b>  <i>({})</i>\n\n",
            self.offset_label()
        );
        let lines: Vec<String> = ranked.iter().map(|q| self.summary_row(q, now)).collect();
        out.push_str(&lines.join("\n"));
        out
    }

    pub fn ticker_info(&self, table: &FundingTable, ticker: &str, now: DateTime<Utc>) -> String {
        let shown = ranking::clean_ticker(ticker).unwrap_or_else(|| ticker.trim().to_uppercase());
        let rows = ranking::ticker_view(table, ticker);
        if rows.is_empty() {
            return format!(
                "No data found for <b>{}</b> on the selected exchanges.",
                escape(&shown)
            );
        }

        let mut out = format!(
            "<b>🪙 Funding for {}</b>  <i>({})</i>\n\n",
            escape(&shown),
            self.offset_label()
        );
        let lines: Vec<String> = rows.iter().map(|q| self.ticker_row(q, now)).collect();
        out.push_str(&lines.join("\n"));
        out
    }

    /// Comma-separated symbols for copy-paste into a terminal watchlist.
    /// `None` when nothing passes the filters.
    pub fn copy_list(&self, table: &FundingTable, threshold: f64, blacklist: &[String]) -> Option<String> {
        let ranked = ranking::rank(table, threshold, blacklist, usize::MAX);
        if ranked.is_empty() {
            return None;
        }
        Some(
            ranked
                .iter()
                .map(|q| format!("{}USDT", q.symbol))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    fn summary_row(&self, quote: &FundingQuote, now: DateTime<Utc>) -> String {
        format!(
            "{} <code>{:<8}</code> <b>{:>7.4}%</b> · {} · {}",
            direction(quote.rate),
            escape(&quote.symbol),
            quote.rate,
            self.time_cell(quote.next_funding_time, now),
            exchange_link(&quote.exchange, &quote.symbol)
        )
    }

    fn ticker_row(&self, quote: &FundingQuote, now: DateTime<Utc>) -> String {
        format!(
            "{} <b>{:>7.4}%</b> · {} · {}",
            direction(quote.rate),
            quote.rate,
            self.time_cell(quote.next_funding_time, now),
            exchange_link(&quote.exchange, &quote.symbol)
        )
    }

    fn time_cell(&self, next: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
        match next {
            Some(at) => format!(
                "{} ({})",
                at.with_timezone(&self.utc_offset).format("%H:%M"),
                remaining(at, now)
            ),
            None => TIME_PLACEHOLDER.to_string(),
        }
    }

    fn offset_label(&self) -> String {
        let hours = self.utc_offset.local_minus_utc() / 3600;
        match hours {
            0 => "UTC".to_string(),
            h if h > 0 => format!("UTC+{h}"),
            h => format!("UTC{h}"),
        }
    }
}

fn direction(rate: f64) -> &'static str {
    if rate < 0.0 { "🟢" } else { "🔴" }
}

/// "1h 05m", "42m", or "now" once the settlement has passed.
fn remaining(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (at - now).num_minutes();
    if minutes <= 0 {
        return "now".to_string();
    }
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, m) => format!("{h}h {m:02}m"),
    }
}

/// Trade page for `base` on `exchange`, if the exchange has a template.
pub fn trade_link(exchange: &str, base: &str) -> Option<String> {
    let template = url_template(exchange)?;
    Some(
        template
            .replace("{symbol_hyphen}", &format!("{base}-USDT"))
            .replace("{symbol}", &format!("{base}USDT"))
            .replace("{base}", base),
    )
}

fn exchange_link(exchange: &str, base: &str) -> String {
    let name = escape(exchange);
    match trade_link(exchange, base) {
        Some(url) => format!("<a href=\"{}\">{name}</a>", escape(&url)),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quote(symbol: &str, exchange: &str, rate: f64, next: Option<DateTime<Utc>>) -> FundingQuote {
        FundingQuote {
            symbol: symbol.to_string(),
            rate,
            exchange: exchange.to_string(),
            next_funding_time: next,
        }
    }

    fn settlement() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 15, 0, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        settlement() - chrono::Duration::minutes(65)
    }

    fn sample() -> FundingTable {
        vec![
            quote("BTC", "Binance", 0.01, Some(settlement())),
            quote("BTC", "ByBit", -0.05, Some(settlement())),
            quote("ETH", "OKX", 0.12, None),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn empty_table_reports_no_data() {
        let text = ReportFormatter::new(10, 3).funding_update(&FundingTable::new(), 0.3, &[], now());
        assert_eq!(text, "No funding data found for the selected exchanges.");
    }

    #[test]
    fn nothing_above_threshold_is_a_message_not_an_empty_string() {
        let text = ReportFormatter::new(10, 3).funding_update(&sample(), 0.2, &[], now());
        assert!(text.contains("No coins with funding above <b>0.2%</b>"));
    }

    #[test]
    fn update_lists_ranked_rows_with_links_and_times() {
        let text = ReportFormatter::new(10, 3).funding_update(&sample(), 0.02, &[], now());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "<b>💎 Funding above 0.02%</b>  <i>(UTC+3)</i>");
        assert_eq!(
            lines[2],
            "🔴 <code>ETH     </code> <b> 0.1200%</b> · ##:## · \
             <a href=\"https://www.okx.com/trade-swap/ETH-USDT-swap\">OKX</a>"
        );
        assert_eq!(
            lines[3],
            "🟢 <code>BTC     </code> <b>-0.0500%</b> · 03:00 (1h 05m) · \
             <a href=\"https://www.bybit.com/trade/usdt/BTCUSDT\">ByBit</a>"
        );
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn formatting_is_idempotent() {
        let formatter = ReportFormatter::new(10, 3);
        let table = sample();
        assert_eq!(
            formatter.funding_update(&table, 0.02, &[], now()),
            formatter.funding_update(&table, 0.02, &[], now())
        );
    }

    #[test]
    fn ticker_info_shows_every_exchange() {
        let text = ReportFormatter::new(10, 0).ticker_info(&sample(), "btcusdt", now());

        assert!(text.starts_with("<b>🪙 Funding for BTC</b>  <i>(UTC)</i>"));
        assert!(text.contains("🔴 <b> 0.0100%</b> · 00:00 (1h 05m)"));
        assert!(text.contains(">Binance</a>"));
        assert!(text.contains(">ByBit</a>"));
    }

    #[test]
    fn unknown_ticker_is_escaped_in_the_reply() {
        let text = ReportFormatter::new(10, 3).ticker_info(&sample(), "<b>", now());
        assert_eq!(text, "No data found for <b>&lt;B&gt;</b> on the selected exchanges.");
    }

    #[test]
    fn exchange_names_without_template_are_plain_and_escaped() {
        let table: FundingTable = vec![quote("DOGE", "R&D Exchange", 0.5, None)].into_iter().collect();
        let text = ReportFormatter::new(10, 3).funding_update(&table, 0.1, &[], now());
        assert!(text.ends_with("· ##:## · R&amp;D Exchange"));
    }

    #[test]
    fn trade_links_fill_every_placeholder_form() {
        assert_eq!(
            trade_link("Binance", "BTC").as_deref(),
            Some("https://www.binance.com/en/futures/BTCUSDT")
        );
        assert_eq!(
            trade_link("BingX", "BTC").as_deref(),
            Some("https://swap.bingx.com/en-us/BTC-USDT")
        );
        assert_eq!(
            trade_link("Gate.io", "BTC").as_deref(),
            Some("https://www.gate.io/futures_trade/USDT/BTC_USDT")
        );
        assert_eq!(
            trade_link("CoinEx", "WIF").as_deref(),
            Some("https://www.coinex.com/en/futures/WIF-USDT")
        );
        assert_eq!(trade_link("Nowhere", "BTC"), None);
    }

    #[test]
    fn remaining_time_forms() {
        let at = settlement();
        assert_eq!(remaining(at, at - chrono::Duration::minutes(42)), "42m");
        assert_eq!(remaining(at, at - chrono::Duration::minutes(125)), "2h 05m");
        assert_eq!(remaining(at, at + chrono::Duration::minutes(1)), "now");
    }

    #[test]
    fn copy_list_covers_everything_above_threshold() {
        let formatter = ReportFormatter::new(1, 3);
        assert_eq!(
            formatter.copy_list(&sample(), 0.02, &[]).as_deref(),
            Some("ETHUSDT,BTCUSDT")
        );
        assert_eq!(formatter.copy_list(&sample(), 0.5, &[]), None);
    }
}
