//! Rendering of TELEGRAM node messages.

use crate::domain::bar::Timeframe;
use chrono::DateTime;

/// Template content that renders as a bare separator line.
pub const SEPARATOR_CONTENT: &str = "<--->";
const SEPARATOR_LINE: &str = "--------------------";

fn broker_emoji(broker: &str) -> &'static str {
    match broker {
        "binance" | "binance_future" => "🥇🥇🥇",
        "okx" => "🏁🏁🏁",
        _ => "",
    }
}

/// Trade page for `symbol` on `broker`, when the broker is known.
pub fn symbol_url(broker: &str, symbol: &str) -> Option<String> {
    match broker {
        "binance" => Some(format!(
            "https://www.binance.com/en/trade/{}?_from=markets&type=spot",
            symbol
        )),
        "binance_future" => Some(format!(
            "https://www.binance.com/en/futures/{}?_from=markets",
            symbol
        )),
        "bybit" => {
            let base = symbol.strip_suffix("USDT").unwrap_or(symbol);
            Some(format!("https://www.bybit.com/vi-VN/trade/spot/{}/USDT", base))
        }
        "bybit_future" => Some(format!("https://www.bybit.com/trade/usdt/{}", symbol)),
        "okx" => Some(format!("https://www.okx.com/vi/trade-spot/{}", symbol)),
        _ => None,
    }
}

/// `DD/MM/YYYY HH:mm` in UTC.
pub fn format_bar_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Full message for a resolved template: broker header, symbol link, bar
/// time, then the content.
pub fn render_message(
    broker: &str,
    symbol: &str,
    timeframe: Timeframe,
    bar_time: i64,
    content: &str,
) -> String {
    if content.trim() == SEPARATOR_CONTENT {
        return SEPARATOR_LINE.to_string();
    }

    let mut lines = Vec::with_capacity(5);
    let emoji = broker_emoji(broker);
    if !emoji.is_empty() {
        lines.push(emoji.to_string());
    }
    lines.push(match symbol_url(broker, symbol) {
        Some(url) => format!("<a href=\"{}\"><b>{}</b></a>", url, symbol),
        None => format!("<b>{}</b>", symbol),
    });
    lines.push(broker.to_string());
    lines.push(format!("{} {}", timeframe, format_bar_time(bar_time)));
    lines.push(content.to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_utc_time() {
        // 2024-03-05 07:09 UTC
        assert_eq!(format_bar_time(1_709_622_540_000), "05/03/2024 07:09");
    }

    #[test]
    fn binance_message_layout() {
        let msg = render_message("binance", "BTCUSDT", Timeframe::H1, 0, "RSI 25");
        assert_eq!(
            msg,
            "🥇🥇🥇\n\
             <a href=\"https://www.binance.com/en/trade/BTCUSDT?_from=markets&type=spot\"><b>BTCUSDT</b></a>\n\
             binance\n\
             1h 01/01/1970 00:00\n\
             RSI 25"
        );
    }

    #[test]
    fn bybit_link_drops_quote_asset() {
        assert_eq!(
            symbol_url("bybit", "ETHUSDT").unwrap(),
            "https://www.bybit.com/vi-VN/trade/spot/ETH/USDT"
        );
        let msg = render_message("bybit", "ETHUSDT", Timeframe::M5, 0, "x");
        assert!(msg.starts_with("<a href"));
    }

    #[test]
    fn unknown_broker_has_plain_symbol() {
        let msg = render_message("kraken", "XBTUSD", Timeframe::D1, 0, "x");
        assert!(msg.starts_with("<b>XBTUSD</b>\nkraken\n1d "));
    }

    #[test]
    fn separator_content_replaces_message() {
        assert_eq!(
            render_message("okx", "BTC-USDT", Timeframe::H4, 0, " <---> "),
            "-".repeat(20)
        );
    }
}
