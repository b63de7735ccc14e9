//! Bar stream staleness watchdog.

use crate::domain::config_validation::WatchdogConfig;
use crate::domain::error::RuleflowError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::error;

/// Last event instant per `broker:symbol` stream.
#[derive(Debug, Clone, Default)]
pub struct StreamActivity {
    last_seen: Arc<Mutex<HashMap<String, Instant>>>,
}

impl StreamActivity {
    pub fn record(&self, broker: &str, symbol: &str) {
        let mut seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(format!("{}:{}", broker, symbol), Instant::now());
    }

    /// The longest-idle stream, if it has been idle for more than `stale_after`.
    pub fn stalest(&self, now: Instant, stale_after: Duration) -> Option<(String, Duration)> {
        let seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.iter()
            .map(|(stream, &at)| (stream.clone(), now.saturating_duration_since(at)))
            .filter(|(_, idle)| *idle > stale_after)
            .max_by_key(|(_, idle)| *idle)
    }
}

/// Resolves only when a stream goes stale.
pub async fn watch(activity: StreamActivity, config: WatchdogConfig) -> RuleflowError {
    let mut ticker = tokio::time::interval(config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if let Some((stream, idle)) = activity.stalest(Instant::now(), config.stale_after) {
            error!(stream = %stream, idle_secs = idle.as_secs(), "bar stream stale");
            return RuleflowError::StaleStream {
                stream,
                idle_secs: idle.as_secs(),
            };
        }
    }
}
