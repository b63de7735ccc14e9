//! End-to-end behaviour of the rule engine: expressions, graph dispatch,
//! order resolution and the order lifecycle working together.

mod common;

use common::*;
use ruleflow::domain::bar::Timeframe;
use ruleflow::domain::bot::BotSet;
use ruleflow::domain::config_validation::ReconcileConfig;
use ruleflow::domain::decision_graph::{DecisionGraph, Elements, NodeKind, Unit};
use ruleflow::domain::dispatcher::Dispatcher;
use ruleflow::domain::error::RuleflowError;
use ruleflow::domain::expr_eval::{EvalContext, Value, evaluate_condition};
use ruleflow::domain::order::{OrderStatus, OrderType};
use ruleflow::domain::order_lifecycle::advance;
use ruleflow::domain::order_resolver::resolve_order;
use ruleflow::ports::order_store::OrderStore;
use ruleflow::runtime::reconciliation::sweep;
use std::sync::Arc;

fn buy_limit_node(id: &str) -> ruleflow::domain::decision_graph::NodeElement {
    let mut n = node(id, NodeKind::Order(OrderType::BuyLimit));
    n.data.entry = Some("100".into());
    n.data.sl = Some("90".into());
    n.data.tp = Some("120".into());
    n.data.volume = Some("1".into());
    n.data.expired_time = Some("48".into());
    n.data.unit_expired_time = Unit::Candle;
    n
}

mod graph_validation {
    use super::*;

    #[test]
    fn cycle_reachable_from_start_is_rejected() {
        let elements = Elements {
            nodes: vec![
                node("start", NodeKind::Start),
                valued("a", NodeKind::Expr, "1"),
                valued("b", NodeKind::Expr, "1"),
            ],
            edges: vec![edge("start", "a"), edge("a", "b"), edge("b", "a")],
        };
        assert!(matches!(DecisionGraph::build(&elements), Err(RuleflowError::Cycle { .. })));
    }

    #[test]
    fn unreachable_nodes_are_accepted_and_never_run() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(Arc::new(MemoryOrderStore::default()), notifier.clone());
        let bots = BotSet::new(vec![bot(
            1,
            vec![
                node("start", NodeKind::Start),
                valued("orphan", NodeKind::Telegram, "never"),
            ],
            vec![],
        )]);
        let report = dispatcher.dispatch(&event(window(&[1.0])), &bots);
        assert_eq!(report.nodes_evaluated, 1);
        assert!(notifier.messages().is_empty());
    }
}

mod expressions {
    use super::*;

    fn eval(text: &str, closes: &[f64]) -> Value {
        let bars = window(closes);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::H1, &bars);
        evaluate_condition(text, &ctx).unwrap()
    }

    #[test]
    fn rsi_follows_trend() {
        let up: Vec<f64> = (0..15).map(|i| 50.0 + i as f64 * 2.0).collect();
        let down: Vec<f64> = up.iter().rev().copied().collect();
        match (eval("rsi(14,0)", &up), eval("rsi(14,0)", &down)) {
            (Value::Number(high), Value::Number(low)) => {
                assert!(high > 99.0, "{high}");
                assert!(low < 1.0, "{low}");
            }
            other => panic!("expected numbers, got {other:?}"),
        }
    }

    #[test]
    fn close_comparison_uses_history() {
        assert!(eval("close() > close(1)", &[100.0, 110.0]).is_truthy());
        assert!(!eval("close() > close(1)", &[110.0, 100.0]).is_truthy());
    }

    #[test]
    fn repeated_sub_expression_is_computed_once() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 4) as f64).collect();
        let bars = window(&closes);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::H1, &bars);
        let value = evaluate_condition("{rsi(14,0)} > {rsi(14,0)}", &ctx).unwrap();
        assert!(!value.is_truthy());
        assert_eq!(ctx.call_count(), 1);
    }
}

mod order_resolution {
    use super::*;

    #[test]
    fn percent_stop_above_close_for_buy_stop_market() {
        let mut n = node("o", NodeKind::Order(OrderType::BuyStopMarket));
        n.data.stop = Some("2".into());
        n.data.unit_stop = Unit::Percent;
        n.data.sl = Some("95".into());
        n.data.tp = Some("120".into());
        n.data.volume = Some("1".into());
        n.data.expired_time = Some("5".into());
        n.data.unit_expired_time = Unit::Minute;

        let bars = window(&[99.0, 100.0]);
        let ctx = EvalContext::new("binance", "BTCUSDT", Timeframe::H1, &bars);
        let order = resolve_order(&n.data, OrderType::BuyStopMarket, 1, &ctx).unwrap();
        assert_eq!(order.stop, Some(102.0));
        assert_eq!(order.entry, 102.0);
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn buy_limit_above_market_waits_for_touch() {
        let store = Arc::new(MemoryOrderStore::default());
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(RecordingNotifier::default()));
        let bots = BotSet::new(vec![bot(
            1,
            vec![node("start", NodeKind::Start), buy_limit_node("buy")],
            vec![edge("start", "buy")],
        )]);

        let bars = window(&[104.0, 105.0]);
        let closed_at = bars[0].start_time;
        dispatcher.dispatch(&event(bars), &bots);
        let mut order = store.snapshot().remove(0);
        assert_eq!(order.status, OrderStatus::Opened);
        assert_eq!(order.entry, 100.0);

        let created = Timeframe::H1.next_time(closed_at);
        let later = vec![
            bar(created, 105.0, 106.0, 101.0, 102.0),
            bar(created + HOUR_MS, 102.0, 103.0, 99.5, 101.0),
        ];
        assert!(advance(&mut order, &later));
        assert_eq!(order.status, OrderStatus::MatchEntry);
        assert_eq!(order.time_entry, Some(created + HOUR_MS));
    }

    #[test]
    fn sl_wins_when_one_bar_touches_both() {
        let store = Arc::new(MemoryOrderStore::default());
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(RecordingNotifier::default()));
        let mut buy = node("buy", NodeKind::Order(OrderType::BuyMarket));
        buy.data.sl = Some("95".into());
        buy.data.tp = Some("105".into());
        buy.data.volume = Some("1".into());
        let bots = BotSet::new(vec![bot(1, vec![node("start", NodeKind::Start), buy], vec![edge("start", "buy")])]);

        let bars = window(&[100.0]);
        let created = Timeframe::H1.next_time(bars[0].start_time);
        dispatcher.dispatch(&event(bars), &bots);
        let mut order = store.snapshot().remove(0);
        assert_eq!(order.status, OrderStatus::MatchEntry);

        advance(&mut order, &[bar(created, 100.0, 106.0, 94.0, 100.0)]);
        assert_eq!(order.status, OrderStatus::MatchSl);
    }

    #[tokio::test]
    async fn sweep_twice_is_a_no_op_the_second_time() {
        let store = Arc::new(MemoryOrderStore::default());
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(RecordingNotifier::default()));
        let bots = BotSet::new(vec![bot(
            1,
            vec![node("start", NodeKind::Start), buy_limit_node("buy")],
            vec![edge("start", "buy")],
        )]);
        let bars = window(&[105.0]);
        let created = Timeframe::H1.next_time(bars[0].start_time);
        dispatcher.dispatch(&event(bars), &bots);

        let history = Arc::new(VecBarSource(vec![
            bar(created, 105.0, 106.0, 99.0, 101.0),
            bar(created + HOUR_MS, 101.0, 121.0, 100.5, 120.0),
        ]));
        let config = ReconcileConfig {
            timeframe: Timeframe::H1,
            ..ReconcileConfig::default()
        };

        let first = sweep(store.clone(), history.clone(), &config).await.unwrap();
        assert_eq!(first.updated, 1);
        let after_first = store.snapshot();
        assert_eq!(after_first[0].status, OrderStatus::MatchTp);

        let second = sweep(store.clone(), history, &config).await.unwrap();
        assert_eq!(second.orders, 0);
        assert_eq!(store.snapshot(), after_first);
    }
}

mod dispatch {
    use super::*;

    #[test]
    fn diamond_shared_child_runs_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(Arc::new(MemoryOrderStore::default()), notifier.clone());
        let bots = BotSet::new(vec![bot(
            1,
            vec![
                node("start", NodeKind::Start),
                valued("left", NodeKind::Expr, "close() > 0"),
                valued("right", NodeKind::Expr, "volume() > 0"),
                valued("join", NodeKind::Telegram, "both"),
            ],
            vec![
                edge("start", "left"),
                edge("start", "right"),
                edge("left", "join"),
                edge("right", "join"),
            ],
        )]);
        let report = dispatcher.dispatch(&event(window(&[10.0])), &bots);
        assert_eq!(report.nodes_evaluated, 4);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn unresolved_order_prunes_branch() {
        let store = Arc::new(MemoryOrderStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(store.clone(), notifier.clone());
        let mut buy = buy_limit_node("buy");
        buy.data.entry = Some("ma(20)".into());
        let bots = BotSet::new(vec![bot(
            1,
            vec![
                node("start", NodeKind::Start),
                buy,
                valued("after", NodeKind::Telegram, "bought"),
            ],
            vec![edge("start", "buy"), edge("buy", "after")],
        )]);

        let report = dispatcher.dispatch(&event(window(&[100.0, 101.0])), &bots);
        assert_eq!(report.orders_created, 0);
        assert_eq!(report.failures, 1);
        assert!(store.open_orders().unwrap().is_empty());
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn telegram_message_carries_header_and_resolved_values() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(Arc::new(MemoryOrderStore::default()), notifier.clone());
        let bots = BotSet::new(vec![bot(
            1,
            vec![
                node("start", NodeKind::Start),
                valued("t", NodeKind::Telegram, "close {close()} prev {close(1)}"),
            ],
            vec![edge("start", "t")],
        )]);
        dispatcher.dispatch(&event(window(&[99.5, 101.0])), &bots);

        let messages = notifier.messages();
        let lines: Vec<&str> = messages[0].lines().collect();
        assert_eq!(lines[0], "🥇🥇🥇");
        assert!(lines[1].contains("<b>BTCUSDT</b>"));
        assert_eq!(lines[2], "binance");
        assert_eq!(lines[3], "1h 01/01/1970 01:00");
        assert_eq!(lines[4], "close 101 prev 99.5");
    }
}
