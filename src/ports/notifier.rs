//! Outbound notification port.

use crate::domain::error::RuleflowError;

pub trait Notifier: Send + Sync {
    fn send(&self, target: &str, text: &str) -> Result<(), RuleflowError>;
}
