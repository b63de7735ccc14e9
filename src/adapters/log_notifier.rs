//! Notifier that writes rendered messages to the log.

use crate::domain::error::RuleflowError;
use crate::ports::notifier::Notifier;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, target: &str, text: &str) -> Result<(), RuleflowError> {
        info!(target_chat = target, message = text, "notification");
        Ok(())
    }
}
