//! Bot definitions stored as one `*.json` file per bot.

use crate::domain::bot::BotConfig;
use crate::domain::error::RuleflowError;
use crate::ports::bot_source::BotSource;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonBotAdapter {
    dir: PathBuf,
}

impl JsonBotAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn read_file(path: &Path) -> Result<BotConfig, RuleflowError> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

impl BotSource for JsonBotAdapter {
    /// Files are read in name order so snapshots are reproducible.
    fn load_bots(&self) -> Result<Vec<BotConfig>, RuleflowError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        paths.iter().map(|p| Self::read_file(p)).collect()
    }
}
