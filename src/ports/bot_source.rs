//! Bot definition source port.

use crate::domain::bot::BotConfig;
use crate::domain::error::RuleflowError;

pub trait BotSource {
    fn load_bots(&self) -> Result<Vec<BotConfig>, RuleflowError>;
}
