//! Simulated orders produced by order-action nodes.

use crate::domain::bar::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    BuyMarket,
    BuyLimit,
    BuyStopMarket,
    BuyStopLimit,
    SellMarket,
    SellLimit,
    SellStopMarket,
    SellStopLimit,
}

impl OrderType {
    pub const ALL: [OrderType; 8] = [
        OrderType::BuyMarket,
        OrderType::BuyLimit,
        OrderType::BuyStopMarket,
        OrderType::BuyStopLimit,
        OrderType::SellMarket,
        OrderType::SellLimit,
        OrderType::SellStopMarket,
        OrderType::SellStopLimit,
    ];

    pub fn is_buy(self) -> bool {
        matches!(
            self,
            OrderType::BuyMarket
                | OrderType::BuyLimit
                | OrderType::BuyStopMarket
                | OrderType::BuyStopLimit
        )
    }

    /// Needs a stop trigger before the entry is live.
    pub fn has_stop(self) -> bool {
        matches!(
            self,
            OrderType::BuyStopMarket
                | OrderType::BuyStopLimit
                | OrderType::SellStopMarket
                | OrderType::SellStopLimit
        )
    }

    /// Fills at a resting entry price rather than immediately.
    pub fn has_limit_entry(self) -> bool {
        matches!(
            self,
            OrderType::BuyLimit
                | OrderType::BuyStopLimit
                | OrderType::SellLimit
                | OrderType::SellStopLimit
        )
    }

    pub fn is_market(self) -> bool {
        matches!(self, OrderType::BuyMarket | OrderType::SellMarket)
    }

    pub fn has_expiry(self) -> bool {
        !self.is_market()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::BuyMarket => "BUY_MARKET",
            OrderType::BuyLimit => "BUY_LIMIT",
            OrderType::BuyStopMarket => "BUY_STOP_MARKET",
            OrderType::BuyStopLimit => "BUY_STOP_LIMIT",
            OrderType::SellMarket => "SELL_MARKET",
            OrderType::SellLimit => "SELL_LIMIT",
            OrderType::SellStopMarket => "SELL_STOP_MARKET",
            OrderType::SellStopLimit => "SELL_STOP_LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown order type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Opened,
    MatchStop,
    MatchEntry,
    MatchTp,
    MatchSl,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Opened,
        OrderStatus::MatchStop,
        OrderStatus::MatchEntry,
        OrderStatus::MatchTp,
        OrderStatus::MatchSl,
        OrderStatus::Canceled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::MatchTp | OrderStatus::MatchSl | OrderStatus::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Opened => "OPENED",
            OrderStatus::MatchStop => "MATCH_STOP",
            OrderStatus::MatchEntry => "MATCH_ENTRY",
            OrderStatus::MatchTp => "MATCH_TP",
            OrderStatus::MatchSl => "MATCH_SL",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown order status '{}'", s))
    }
}

/// Times are epoch milliseconds. `id` is 0 until the store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub broker: String,
    pub timeframe: Timeframe,
    pub order_type: OrderType,
    pub volume: f64,
    pub stop: Option<f64>,
    pub entry: f64,
    pub tp: f64,
    pub sl: f64,
    pub status: OrderStatus,
    pub created_time: i64,
    pub expired_time: Option<i64>,
    pub time_stop: Option<i64>,
    pub time_entry: Option<i64>,
    pub time_tp: Option<i64>,
    pub time_sl: Option<i64>,
    pub last_time_updated: Option<i64>,
}

/// The mutable part of an order, as written back after a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub id: i64,
    pub status: OrderStatus,
    pub time_stop: Option<i64>,
    pub time_entry: Option<i64>,
    pub time_tp: Option<i64>,
    pub time_sl: Option<i64>,
    pub last_time_updated: Option<i64>,
}

impl Order {
    pub fn update_request(&self) -> OrderUpdate {
        OrderUpdate {
            id: self.id,
            status: self.status,
            time_stop: self.time_stop,
            time_entry: self.time_entry,
            time_tp: self.time_tp,
            time_sl: self.time_sl,
            last_time_updated: self.last_time_updated,
        }
    }

    pub fn apply_update(&mut self, update: &OrderUpdate) {
        self.status = update.status;
        self.time_stop = update.time_stop;
        self.time_entry = update.time_entry;
        self.time_tp = update.time_tp;
        self.time_sl = update.time_sl;
        self.last_time_updated = update.last_time_updated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_families() {
        assert!(OrderType::BuyStopLimit.is_buy());
        assert!(OrderType::BuyStopLimit.has_stop());
        assert!(OrderType::BuyStopLimit.has_limit_entry());
        assert!(!OrderType::SellStopMarket.has_limit_entry());
        assert!(!OrderType::SellMarket.has_expiry());
        assert!(OrderType::SellLimit.has_expiry());
    }

    #[test]
    fn order_type_parse_round_trip() {
        for t in OrderType::ALL {
            assert_eq!(t.as_str().parse::<OrderType>().unwrap(), t);
        }
        assert_eq!("buy_limit".parse::<OrderType>().unwrap(), OrderType::BuyLimit);
        assert!("BUY".parse::<OrderType>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<OrderStatus> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![OrderStatus::MatchTp, OrderStatus::MatchSl, OrderStatus::Canceled]
        );
    }

    #[test]
    fn status_serde_matches_display() {
        let json = serde_json::to_string(&OrderStatus::MatchEntry).unwrap();
        assert_eq!(json, "\"MATCH_ENTRY\"");
        let json = serde_json::to_string(&OrderType::SellStopLimit).unwrap();
        assert_eq!(json, "\"SELL_STOP_LIMIT\"");
    }
}
