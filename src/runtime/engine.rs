//! Routes bar events to broker shards and fans bot snapshots out to all of
//! them.

use crate::domain::bot::BotSet;
use crate::domain::dispatcher::{BarEvent, Dispatcher};
use crate::domain::error::RuleflowError;
use crate::runtime::shard::{ShardHandle, ShardMessage, ShardStats};
use crate::runtime::watchdog::StreamActivity;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Engine {
    shards: HashMap<String, ShardHandle>,
    bots: Arc<BotSet>,
    activity: StreamActivity,
}

impl Engine {
    /// Spawn one shard per broker. Must be called inside a tokio runtime.
    pub fn start(brokers: &[String], bots: BotSet, dispatcher: Dispatcher, capacity: usize) -> Self {
        let bots = Arc::new(bots);
        let shards = brokers
            .iter()
            .map(|broker| {
                let shard = ShardHandle::spawn(broker, bots.clone(), dispatcher.clone(), capacity);
                (broker.clone(), shard)
            })
            .collect();
        info!(shards = brokers.len(), bots = bots.len(), "engine started");
        Self {
            shards,
            bots,
            activity: StreamActivity::default(),
        }
    }

    pub fn bots(&self) -> Arc<BotSet> {
        self.bots.clone()
    }

    pub fn activity(&self) -> StreamActivity {
        self.activity.clone()
    }

    /// Hand the event to its broker's shard. Returns false when no shard
    /// serves that broker.
    pub async fn route(&self, event: BarEvent) -> Result<bool, RuleflowError> {
        let Some(shard) = self.shards.get(&event.broker) else {
            warn!(broker = %event.broker, symbol = %event.symbol, "no shard for broker");
            return Ok(false);
        };
        self.activity.record(&event.broker, &event.symbol);
        shard.send(ShardMessage::BarClosed(event)).await?;
        Ok(true)
    }

    /// Publish a fully built snapshot to every shard. Events routed after
    /// this call see the new set.
    pub async fn replace_bots(&mut self, bots: BotSet) -> Result<(), RuleflowError> {
        let snapshot = Arc::new(bots);
        for shard in self.shards.values() {
            shard.send(ShardMessage::ReplaceBots(snapshot.clone())).await?;
        }
        info!(bots = snapshot.len(), "bot snapshot published");
        self.bots = snapshot;
        Ok(())
    }

    /// Drain and stop every shard.
    pub async fn shutdown(self) -> Result<Vec<(String, ShardStats)>, RuleflowError> {
        let mut stats = Vec::with_capacity(self.shards.len());
        for (broker, shard) in self.shards {
            stats.push((broker, shard.join().await?));
        }
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(stats)
    }
}
