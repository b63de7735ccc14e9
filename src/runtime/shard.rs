//! One long-lived worker per market-data source.
//!
//! A shard owns its bot snapshot and processes messages strictly in
//! arrival order. Dispatch is synchronous, so the worker runs on the
//! blocking pool and never yields mid-event.

use crate::domain::bot::BotSet;
use crate::domain::dispatcher::{BarEvent, DispatchReport, Dispatcher};
use crate::domain::error::RuleflowError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug)]
pub enum ShardMessage {
    BarClosed(BarEvent),
    ReplaceBots(Arc<BotSet>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    pub events: usize,
    pub swaps: usize,
    pub report: DispatchReport,
}

pub struct ShardHandle {
    broker: String,
    sender: mpsc::Sender<ShardMessage>,
    worker: JoinHandle<ShardStats>,
}

impl ShardHandle {
    pub fn spawn(broker: &str, bots: Arc<BotSet>, dispatcher: Dispatcher, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let name = broker.to_string();
        let worker = tokio::task::spawn_blocking(move || run_shard(&name, bots, dispatcher, receiver));
        Self {
            broker: broker.to_string(),
            sender,
            worker,
        }
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    pub async fn send(&self, message: ShardMessage) -> Result<(), RuleflowError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RuleflowError::Channel {
                reason: format!("shard {} is gone", self.broker),
            })
    }

    /// Close the channel and wait for queued messages to drain.
    pub async fn join(self) -> Result<ShardStats, RuleflowError> {
        drop(self.sender);
        self.worker.await.map_err(|e| RuleflowError::Channel {
            reason: format!("shard {} worker failed: {}", self.broker, e),
        })
    }
}

fn run_shard(
    broker: &str,
    mut bots: Arc<BotSet>,
    dispatcher: Dispatcher,
    mut receiver: mpsc::Receiver<ShardMessage>,
) -> ShardStats {
    info!(broker, bots = bots.len(), "shard started");
    let mut stats = ShardStats::default();
    while let Some(message) = receiver.blocking_recv() {
        match message {
            ShardMessage::BarClosed(event) => {
                let report = dispatcher.dispatch(&event, &bots);
                debug!(
                    broker,
                    symbol = %event.symbol,
                    timeframe = %event.timeframe,
                    bots = report.bots,
                    nodes = report.nodes_evaluated,
                    orders = report.orders_created,
                    "bar dispatched"
                );
                stats.events += 1;
                stats.report.merge(&report);
            }
            ShardMessage::ReplaceBots(snapshot) => {
                info!(broker, bots = snapshot.len(), "bot snapshot replaced");
                bots = snapshot;
                stats.swaps += 1;
            }
        }
    }
    info!(broker, events = stats.events, "shard stopped");
    stats
}
