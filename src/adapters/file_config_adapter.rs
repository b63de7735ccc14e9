//! INI file configuration adapter.

use crate::domain::error::RuleflowError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuleflowError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| RuleflowError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, RuleflowError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| RuleflowError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).filter(|v| !v.trim().is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENGINE_INI: &str = r#"
[database]
path = /var/lib/ruleflow/orders.db
pool_size = 4

[runtime]
brokers = binance, bybit ,
channel_capacity = 512

[reconcile]
interval_secs = 300
timeframe = 1m
"#;

    #[test]
    fn reads_sections_and_typed_values() {
        let adapter = FileConfigAdapter::from_string(ENGINE_INI).unwrap();
        assert_eq!(
            adapter.get_string("database", "path").as_deref(),
            Some("/var/lib/ruleflow/orders.db")
        );
        assert_eq!(adapter.get_int("database", "pool_size", 1), 4);
        assert_eq!(adapter.get_int("runtime", "channel_capacity", 0), 512);
        assert_eq!(adapter.get_string("reconcile", "timeframe").as_deref(), Some("1m"));
    }

    #[test]
    fn list_values_are_trimmed() {
        let adapter = FileConfigAdapter::from_string(ENGINE_INI).unwrap();
        assert_eq!(adapter.get_list("runtime", "brokers"), vec!["binance", "bybit"]);
        assert!(adapter.get_list("runtime", "missing").is_empty());
    }

    #[test]
    fn missing_or_malformed_values_fall_back() {
        let adapter =
            FileConfigAdapter::from_string("[watchdog]\nstale_after_secs = soon\nempty =\n").unwrap();
        assert_eq!(adapter.get_int("watchdog", "stale_after_secs", 600), 600);
        assert_eq!(adapter.get_int("watchdog", "missing", 60), 60);
        assert_eq!(adapter.get_double("watchdog", "missing", 0.5), 0.5);
        assert_eq!(adapter.get_string("watchdog", "empty"), None);
        assert_eq!(adapter.get_string("nosuch", "key"), None);
    }

    #[test]
    fn bool_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[flags]\na = yes\nb = OFF\nc = 1\nd = maybe\n").unwrap();
        assert!(adapter.get_bool("flags", "a", false));
        assert!(!adapter.get_bool("flags", "b", true));
        assert!(adapter.get_bool("flags", "c", false));
        assert!(adapter.get_bool("flags", "d", true));
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[bots]\ndir = ./bots\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("bots", "dir").as_deref(), Some("./bots"));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = FileConfigAdapter::from_file("/nonexistent/ruleflow.ini").err().unwrap();
        assert!(matches!(err, RuleflowError::ConfigParse { .. }));
    }
}
