//! Rule dispatch: one walk over every subscribed bot's decision graph per
//! closed bar.
//!
//! The walk is a DFS from `start` with a visited set shared across the
//! whole event, so a node reached through several parents runs once.
//! Failures are contained to the node that raised them; sibling branches
//! and other bots still run.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::bot::{Bot, BotSet};
use crate::domain::decision_graph::NodeKind;
use crate::domain::expr_eval::{EvalContext, calculate};
use crate::domain::notification::render_message;
use crate::domain::order::OrderType;
use crate::domain::order_lifecycle::apply_inline;
use crate::domain::order_resolver::resolve_order;
use crate::domain::sub_expr;
use crate::ports::notifier::Notifier;
use crate::ports::order_store::OrderStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A closed bar plus the window ending at it (index 0 is the closed bar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEvent {
    pub broker: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<Bar>,
}

impl BarEvent {
    pub fn closed_bar(&self) -> Option<&Bar> {
        self.bars.first()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub bots: usize,
    pub nodes_evaluated: usize,
    pub orders_created: usize,
    pub notifications_sent: usize,
    pub failures: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: &DispatchReport) {
        self.bots += other.bots;
        self.nodes_evaluated += other.nodes_evaluated;
        self.orders_created += other.orders_created;
        self.notifications_sent += other.notifications_sent;
        self.failures += other.failures;
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn OrderStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn dispatch(&self, event: &BarEvent, bots: &BotSet) -> DispatchReport {
        let mut report = DispatchReport::default();
        let ctx = EvalContext::new(&event.broker, &event.symbol, event.timeframe, &event.bars);
        for bot in bots.subscribers(&event.broker, &event.symbol, event.timeframe) {
            report.bots += 1;
            self.dispatch_bot(bot, event, &ctx, &mut report);
        }
        report
    }

    fn dispatch_bot(&self, bot: &Bot, event: &BarEvent, ctx: &EvalContext<'_>, report: &mut DispatchReport) {
        let graph = &bot.graph;
        let mut visited = vec![false; graph.len()];
        let mut stack = vec![graph.start()];

        while let Some(index) = stack.pop() {
            if visited[index] {
                continue;
            }
            visited[index] = true;
            report.nodes_evaluated += 1;

            if self.run_node(bot, index, event, ctx, report) {
                stack.extend(graph.children(index).iter().rev().filter(|&&c| !visited[c]));
            }
        }
    }

    /// Run one node. Returns whether the walk descends into its children.
    fn run_node(
        &self,
        bot: &Bot,
        index: usize,
        event: &BarEvent,
        ctx: &EvalContext<'_>,
        report: &mut DispatchReport,
    ) -> bool {
        let node = bot.graph.node(index);
        let kind = bot.graph.kind(index);
        debug!(bot = %bot.name, node = %node.id, kind = %kind, "visit");

        match kind {
            NodeKind::Start => true,
            NodeKind::Expr => {
                let condition = node.value.as_deref().unwrap_or_default();
                match calculate(condition, ctx) {
                    Some(value) => value.is_truthy(),
                    None => {
                        report.failures += 1;
                        false
                    }
                }
            }
            NodeKind::Telegram => {
                self.notify(bot, node.value.as_deref().unwrap_or_default(), event, ctx, report);
                true
            }
            NodeKind::Order(order_type) => self.create_order(bot, index, order_type, ctx, report),
            NodeKind::CloseAllOrder => {
                match self.store.cancel_open_orders(bot.id, &event.broker, &event.symbol) {
                    Ok(n) => info!(bot = %bot.name, broker = %event.broker, symbol = %event.symbol, canceled = n, "closed open orders"),
                    Err(e) => {
                        warn!(bot = %bot.name, error = %e, "failed to cancel open orders");
                        report.failures += 1;
                    }
                }
                true
            }
            NodeKind::CloseAllPosition => {
                info!(bot = %bot.name, broker = %event.broker, symbol = %event.symbol, "close all positions requested");
                true
            }
        }
    }

    fn notify(
        &self,
        bot: &Bot,
        template: &str,
        event: &BarEvent,
        ctx: &EvalContext<'_>,
        report: &mut DispatchReport,
    ) {
        let content = match sub_expr::resolve(template, ctx) {
            Ok(content) => content,
            Err(e) => {
                warn!(bot = %bot.name, symbol = %event.symbol, template, error = %e, "message did not resolve");
                report.failures += 1;
                return;
            }
        };
        let bar_time = event.closed_bar().map(|b| b.start_time).unwrap_or_default();
        let text = render_message(&event.broker, &event.symbol, event.timeframe, bar_time, &content);
        for target in &bot.targets {
            match self.notifier.send(target, &text) {
                Ok(()) => report.notifications_sent += 1,
                Err(e) => {
                    warn!(bot = %bot.name, target = %target, error = %e, "notification failed");
                    report.failures += 1;
                }
            }
        }
    }

    fn create_order(
        &self,
        bot: &Bot,
        index: usize,
        order_type: OrderType,
        ctx: &EvalContext<'_>,
        report: &mut DispatchReport,
    ) -> bool {
        let node = bot.graph.node(index);
        let mut order = match resolve_order(node, order_type, bot.id, ctx) {
            Ok(order) => order,
            Err(e) => {
                warn!(bot = %bot.name, node = %node.id, error = %e, "order not created");
                report.failures += 1;
                return false;
            }
        };
        if let Some(bar) = ctx.bars.first() {
            apply_inline(&mut order, bar.close);
        }
        match self.store.insert_order(&order) {
            Ok(id) => {
                info!(
                    bot = %bot.name,
                    order_id = id,
                    order_type = %order_type,
                    symbol = %order.symbol,
                    entry = order.entry,
                    status = %order.status,
                    "order created"
                );
                report.orders_created += 1;
                true
            }
            Err(e) => {
                warn!(bot = %bot.name, node = %node.id, error = %e, "order insert failed");
                report.failures += 1;
                false
            }
        }
    }
}
