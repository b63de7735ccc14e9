#![allow(dead_code)]

use ruleflow::domain::bar::{Bar, Timeframe};
use ruleflow::domain::bot::{Bot, BotConfig};
use ruleflow::domain::decision_graph::{DecisionNode, EdgeData, EdgeElement, Elements, NodeElement, NodeKind, TreeData};
use ruleflow::domain::dispatcher::BarEvent;
use ruleflow::domain::error::RuleflowError;
use ruleflow::domain::order::{Order, OrderStatus, OrderUpdate};
use ruleflow::ports::bar_source::BarSource;
use ruleflow::ports::notifier::Notifier;
use ruleflow::ports::order_store::OrderStore;
use std::sync::Mutex;

pub const HOUR_MS: i64 = 3_600_000;

pub fn bar(start_time: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        symbol: "BTCUSDT".into(),
        broker: "binance".into(),
        timeframe: Timeframe::H1,
        start_time,
        open,
        high,
        low,
        close,
        volume: 10.0,
        is_final: true,
    }
}

/// Flat bars from oldest-first closes, returned newest first.
pub fn window(closes: &[f64]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(i as i64 * HOUR_MS, c, c, c, c))
        .collect();
    bars.reverse();
    bars
}

pub fn event(bars: Vec<Bar>) -> BarEvent {
    BarEvent {
        broker: "binance".into(),
        symbol: "BTCUSDT".into(),
        timeframe: Timeframe::H1,
        bars,
    }
}

pub fn node(id: &str, kind: NodeKind) -> NodeElement {
    NodeElement {
        data: DecisionNode {
            id: id.to_string(),
            kind: Some(kind),
            ..DecisionNode::default()
        },
        removed: false,
    }
}

pub fn valued(id: &str, kind: NodeKind, value: &str) -> NodeElement {
    let mut element = node(id, kind);
    element.data.value = Some(value.to_string());
    element
}

pub fn edge(source: &str, target: &str) -> EdgeElement {
    EdgeElement {
        data: EdgeData {
            id: format!("{}->{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
        },
        removed: false,
    }
}

pub fn bot_config(id: i64, name: &str, nodes: Vec<NodeElement>, edges: Vec<EdgeElement>) -> BotConfig {
    BotConfig {
        id,
        bot_name: name.to_string(),
        symbol_list: vec!["binance:BTCUSDT".into()],
        timeframes: vec!["1h".into()],
        tree_data: TreeData {
            elements: Elements { nodes, edges },
        },
        notification_target: "chat".into(),
    }
}

pub fn bot(id: i64, nodes: Vec<NodeElement>, edges: Vec<EdgeElement>) -> Bot {
    Bot::from_config(&bot_config(id, &format!("bot-{}", id), nodes, edges)).unwrap()
}

#[derive(Default)]
pub struct MemoryOrderStore {
    pub orders: Mutex<Vec<Order>>,
}

impl MemoryOrderStore {
    pub fn snapshot(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }
}

impl OrderStore for MemoryOrderStore {
    fn insert_order(&self, order: &Order) -> Result<i64, RuleflowError> {
        let mut orders = self.orders.lock().unwrap();
        let id = orders.len() as i64 + 1;
        let mut stored = order.clone();
        stored.id = id;
        orders.push(stored);
        Ok(id)
    }

    fn update_order(&self, update: &OrderUpdate) -> Result<(), RuleflowError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.iter_mut().find(|o| o.id == update.id) {
            Some(o) => {
                o.apply_update(update);
                Ok(())
            }
            None => Err(RuleflowError::DatabaseQuery {
                reason: format!("order {} not found", update.id),
            }),
        }
    }

    fn open_orders(&self) -> Result<Vec<Order>, RuleflowError> {
        Ok(self.snapshot().into_iter().filter(|o| !o.status.is_terminal()).collect())
    }

    fn orders_for_bot(&self, bot_id: i64) -> Result<Vec<Order>, RuleflowError> {
        Ok(self.snapshot().into_iter().filter(|o| o.bot_id == bot_id).collect())
    }

    fn cancel_open_orders(&self, bot_id: i64, broker: &str, symbol: &str) -> Result<usize, RuleflowError> {
        let mut orders = self.orders.lock().unwrap();
        let mut canceled = 0;
        for o in orders.iter_mut().filter(|o| {
            o.bot_id == bot_id && o.broker == broker && o.symbol == symbol && o.status == OrderStatus::Opened
        }) {
            o.status = OrderStatus::Canceled;
            canceled += 1;
        }
        Ok(canceled)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, text)| text.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, target: &str, text: &str) -> Result<(), RuleflowError> {
        self.sent.lock().unwrap().push((target.to_string(), text.to_string()));
        Ok(())
    }
}

/// Ascending bars held in memory.
pub struct VecBarSource(pub Vec<Bar>);

impl BarSource for VecBarSource {
    fn bars_since(
        &self,
        broker: &str,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
    ) -> Result<Vec<Bar>, RuleflowError> {
        Ok(self
            .0
            .iter()
            .filter(|b| b.broker == broker && b.symbol == symbol && b.timeframe == timeframe)
            .filter(|b| b.start_time >= since)
            .cloned()
            .collect())
    }
}
