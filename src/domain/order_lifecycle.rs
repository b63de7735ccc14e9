//! Order lifecycle state machine.
//!
//! ```text
//! OPENED ──stop touch──> MATCH_STOP ──entry touch / market fill──> MATCH_ENTRY
//!   │  └──────────entry touch / market fill─────────────────────────┘   │
//!   └─expired─> CANCELED                         MATCH_SL <─sl─┴─tp─> MATCH_TP
//! ```
//!
//! Each bar runs the checks in a fixed order, so one bar can carry an order
//! through several states: stop, then entry, then sl before tp, then expiry.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::order::{Order, OrderStatus};

/// Apply one bar. Returns true when the status moved.
pub fn apply_bar(order: &mut Order, bar: &Bar) -> bool {
    if order.status.is_terminal() {
        return false;
    }
    let before = order.status;
    let t = order.order_type;
    let time = bar.start_time;

    if order.status == OrderStatus::Opened && t.has_stop() {
        if let Some(stop) = order.stop {
            let touched = if t.is_buy() {
                bar.high >= stop
            } else {
                bar.low <= stop
            };
            if touched {
                order.status = OrderStatus::MatchStop;
                order.time_stop = Some(time);
            }
        }
    }

    let entry_live = if t.has_stop() {
        order.status == OrderStatus::MatchStop
    } else {
        order.status == OrderStatus::Opened
    };
    if entry_live {
        let filled = if !t.has_limit_entry() {
            true
        } else if t.is_buy() {
            bar.low <= order.entry
        } else {
            bar.high >= order.entry
        };
        if filled {
            order.status = OrderStatus::MatchEntry;
            order.time_entry = Some(time);
        }
    }

    if order.status == OrderStatus::MatchEntry {
        let (sl_hit, tp_hit) = if t.is_buy() {
            (bar.low <= order.sl, bar.high >= order.tp)
        } else {
            (bar.high >= order.sl, bar.low <= order.tp)
        };
        if sl_hit {
            order.status = OrderStatus::MatchSl;
            order.time_sl = Some(time);
        } else if tp_hit {
            order.status = OrderStatus::MatchTp;
            order.time_tp = Some(time);
        }
    }

    if order.status == OrderStatus::Opened {
        if let Some(expired) = order.expired_time {
            if time >= expired {
                order.status = OrderStatus::Canceled;
            }
        }
    }

    order.status != before
}

/// Replay ascending `bars` from the order's checkpoint. Bars at or before
/// `last_time_updated`, or before `created_time`, are skipped; replay stops
/// at the first non-final bar or once the order is terminal. Returns true
/// when the status or the checkpoint moved.
pub fn advance(order: &mut Order, bars: &[Bar]) -> bool {
    let mut changed = false;
    for bar in bars {
        if order.status.is_terminal() || !bar.is_final {
            break;
        }
        if bar.start_time < order.created_time {
            continue;
        }
        if order.last_time_updated.is_some_and(|t| bar.start_time <= t) {
            continue;
        }
        apply_bar(order, bar);
        order.last_time_updated = Some(bar.start_time);
        changed = true;
    }
    changed
}

/// Creation-time pass: a single point bar at `close`, stamped at the order's
/// `created_time`. The checkpoint is left untouched.
pub fn apply_inline(order: &mut Order, close: f64) -> bool {
    let point = Bar {
        symbol: order.symbol.clone(),
        broker: order.broker.clone(),
        timeframe: order.timeframe,
        start_time: order.created_time,
        open: close,
        high: close,
        low: close,
        close,
        volume: 0.0,
        is_final: true,
    };
    apply_bar(order, &point)
}

/// First bar start the reconciliation sweep still needs for `order`.
pub fn replay_since(order: &Order, replay_timeframe: Timeframe) -> i64 {
    match order.last_time_updated {
        Some(t) => replay_timeframe.next_time(t),
        None => order.created_time,
    }
}
