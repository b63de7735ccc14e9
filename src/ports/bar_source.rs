//! Historical bar access port.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::RuleflowError;

pub trait BarSource: Send + Sync {
    /// Bars with `start_time >= since`, oldest first.
    fn bars_since(
        &self,
        broker: &str,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
    ) -> Result<Vec<Bar>, RuleflowError>;
}
