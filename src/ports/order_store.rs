//! Persistent order store port.

use crate::domain::error::RuleflowError;
use crate::domain::order::{Order, OrderUpdate};

pub trait OrderStore: Send + Sync {
    /// Persist a new order and return its assigned id.
    fn insert_order(&self, order: &Order) -> Result<i64, RuleflowError>;

    fn update_order(&self, update: &OrderUpdate) -> Result<(), RuleflowError>;

    /// Every order whose status is not terminal.
    fn open_orders(&self) -> Result<Vec<Order>, RuleflowError>;

    fn orders_for_bot(&self, bot_id: i64) -> Result<Vec<Order>, RuleflowError>;

    /// Cancel the bot's OPENED orders on one market. Returns how many moved.
    fn cancel_open_orders(&self, bot_id: i64, broker: &str, symbol: &str) -> Result<usize, RuleflowError>;
}
