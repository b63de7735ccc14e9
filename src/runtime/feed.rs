//! JSON-lines event feed.
//!
//! ```text
//! {"type":"bar_closed","broker":"binance","symbol":"BTCUSDT","timeframe":"1h","bars":[...]}
//! {"type":"config_changed"}
//! ```

use crate::domain::bot::BotSet;
use crate::domain::dispatcher::BarEvent;
use crate::domain::error::RuleflowError;
use crate::ports::bot_source::BotSource;
use crate::runtime::engine::Engine;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    BarClosed(BarEvent),
    ConfigChanged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub events: usize,
    pub reloads: usize,
    pub rejected_lines: usize,
}

/// Validate every bot config into a fresh snapshot. Rejected bots are logged
/// and left out.
pub fn load_snapshot(source: &dyn BotSource) -> Result<BotSet, RuleflowError> {
    let configs = source.load_bots()?;
    let (bots, rejected) = BotSet::from_configs(&configs);
    for e in &rejected {
        warn!(error = %e, "bot rejected");
    }
    info!(loaded = bots.len(), rejected = rejected.len(), "bot snapshot built");
    Ok(bots)
}

/// Read messages until end of input. Malformed lines and failed reloads are
/// logged and skipped; a closed shard channel ends the feed with an error.
pub async fn run_feed<R>(reader: R, engine: &mut Engine, source: &dyn BotSource) -> Result<FeedStats, RuleflowError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<FeedMessage>(line) {
            Ok(FeedMessage::BarClosed(event)) => {
                if event.closed_bar().is_some_and(|b| !b.is_final) {
                    warn!(symbol = %event.symbol, "ignoring event for a bar that is not final");
                    stats.rejected_lines += 1;
                    continue;
                }
                if engine.route(event).await? {
                    stats.events += 1;
                }
            }
            Ok(FeedMessage::ConfigChanged) => match load_snapshot(source) {
                Ok(bots) => {
                    engine.replace_bots(bots).await?;
                    stats.reloads += 1;
                }
                Err(e) => warn!(error = %e, "bot reload failed, keeping current snapshot"),
            },
            Err(e) => {
                warn!(error = %e, "malformed feed line");
                stats.rejected_lines += 1;
            }
        }
    }
    Ok(stats)
}
