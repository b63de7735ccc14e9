//! Engine configuration, read and validated before anything starts.

use crate::domain::bar::Timeframe;
use crate::domain::error::RuleflowError;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHANNEL_CAPACITY: i64 = 1024;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: i64 = 300;
pub const DEFAULT_BATCH_SIZE: i64 = 10;
pub const DEFAULT_STALE_AFTER_SECS: i64 = 600;
pub const DEFAULT_CHECK_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub interval: Duration,
    pub batch_size: usize,
    /// Bar timeframe replayed against open orders.
    pub timeframe: Timeframe,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS as u64),
            batch_size: DEFAULT_BATCH_SIZE as usize,
            timeframe: Timeframe::M1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogConfig {
    pub stale_after: Duration,
    pub check_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS as u64),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS as u64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bots_dir: PathBuf,
    pub csv_dir: Option<PathBuf>,
    /// One shard per broker.
    pub brokers: Vec<String>,
    pub channel_capacity: usize,
    pub reconcile: ReconcileConfig,
    pub watchdog: WatchdogConfig,
    pub log_level: String,
}

impl EngineConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RuleflowError> {
        let bots_dir = config
            .get_string("bots", "dir")
            .map(PathBuf::from)
            .ok_or_else(|| missing("bots", "dir"))?;

        let brokers = config.get_list("runtime", "brokers");
        if brokers.is_empty() {
            return Err(invalid("runtime", "brokers", "at least one broker is required"));
        }

        let channel_capacity = positive(config, "runtime", "channel_capacity", DEFAULT_CHANNEL_CAPACITY)?;

        let reconcile = ReconcileConfig {
            interval: seconds(config, "reconcile", "interval_secs", DEFAULT_RECONCILE_INTERVAL_SECS)?,
            batch_size: positive(config, "reconcile", "batch_size", DEFAULT_BATCH_SIZE)?,
            timeframe: match config.get_string("reconcile", "timeframe") {
                None => Timeframe::M1,
                Some(s) => s
                    .parse()
                    .map_err(|reason: String| invalid("reconcile", "timeframe", &reason))?,
            },
        };

        let watchdog = WatchdogConfig {
            stale_after: seconds(config, "watchdog", "stale_after_secs", DEFAULT_STALE_AFTER_SECS)?,
            check_interval: seconds(config, "watchdog", "check_interval_secs", DEFAULT_CHECK_INTERVAL_SECS)?,
        };

        Ok(Self {
            bots_dir,
            csv_dir: config.get_string("data", "csv_dir").map(PathBuf::from),
            brokers,
            channel_capacity,
            reconcile,
            watchdog,
            log_level: config
                .get_string("logging", "level")
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn missing(section: &str, key: &str) -> RuleflowError {
    RuleflowError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> RuleflowError {
    RuleflowError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<usize, RuleflowError> {
    let value = config.get_int(section, key, default);
    if value < 1 {
        return Err(invalid(section, key, &format!("{} must be at least 1", key)));
    }
    Ok(value as usize)
}

fn seconds(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<Duration, RuleflowError> {
    positive(config, section, key, default).map(|s| Duration::from_secs(s as u64))
}
