//! Periodic replay of open orders against newer bars.
//!
//! Orders are independent, so a sweep replays them in parallel batches of
//! at most `batch_size`. A failing order is logged and counted; the rest
//! of its batch and the sweep carry on.

use crate::domain::bar::Timeframe;
use crate::domain::config_validation::ReconcileConfig;
use crate::domain::error::RuleflowError;
use crate::domain::order::Order;
use crate::domain::order_lifecycle::{advance, replay_since};
use crate::ports::bar_source::BarSource;
use crate::ports::order_store::OrderStore;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub orders: usize,
    pub updated: usize,
    pub failures: usize,
}

/// Replay one order and write it back if anything moved.
pub fn reconcile_order(
    order: &mut Order,
    store: &dyn OrderStore,
    bars: &dyn BarSource,
    timeframe: Timeframe,
) -> Result<bool, RuleflowError> {
    let since = replay_since(order, timeframe);
    let window = bars.bars_since(&order.broker, &order.symbol, timeframe, since)?;
    if !advance(order, &window) {
        return Ok(false);
    }
    store.update_order(&order.update_request())?;
    Ok(true)
}

pub async fn sweep(
    store: Arc<dyn OrderStore>,
    bars: Arc<dyn BarSource>,
    config: &ReconcileConfig,
) -> Result<SweepReport, RuleflowError> {
    let loader = store.clone();
    let orders = tokio::task::spawn_blocking(move || loader.open_orders())
        .await
        .map_err(|e| RuleflowError::Channel {
            reason: format!("order load task failed: {}", e),
        })??;

    let mut report = SweepReport {
        orders: orders.len(),
        ..SweepReport::default()
    };
    let timeframe = config.timeframe;

    for batch in orders.chunks(config.batch_size.max(1)) {
        let mut jobs = JoinSet::new();
        for order in batch.iter().cloned() {
            let store = store.clone();
            let bars = bars.clone();
            jobs.spawn_blocking(move || {
                let mut order = order;
                let id = order.id;
                (id, reconcile_order(&mut order, store.as_ref(), bars.as_ref(), timeframe))
            });
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok((_, Ok(true))) => report.updated += 1,
                Ok((_, Ok(false))) => {}
                Ok((id, Err(e))) => {
                    warn!(order_id = id, error = %e, "order replay failed");
                    report.failures += 1;
                }
                Err(e) => {
                    warn!(error = %e, "order replay task panicked");
                    report.failures += 1;
                }
            }
        }
    }

    info!(
        orders = report.orders,
        updated = report.updated,
        failures = report.failures,
        "reconciliation sweep finished"
    );
    Ok(report)
}

/// Sweep on every tick, forever. A failed sweep is logged and retried on the
/// next tick.
pub async fn run_periodic(store: Arc<dyn OrderStore>, bars: Arc<dyn BarSource>, config: ReconcileConfig) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = sweep(store.clone(), bars.clone(), &config).await {
            warn!(error = %e, "reconciliation sweep failed");
        }
    }
}
