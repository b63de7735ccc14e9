//! Order field resolution.
//!
//! Turns an order-action node's templates into concrete prices. Fields
//! resolve in a fixed order (stop, entry, immediate-match snap, sl, tp,
//! volume, expiredTime) because later unit conversions read earlier
//! results. Unit conversions wrap the parsed template AST; nothing is
//! re-parsed from text.

use crate::domain::bar::MINUTE_MS;
use crate::domain::decision_graph::{DecisionNode, Unit};
use crate::domain::error::{ExprError, RuleflowError};
use crate::domain::expr::{BinaryOp, Expr, Function};
use crate::domain::expr_eval::{EvalContext, evaluate};
use crate::domain::expr_parser;
use crate::domain::node_validation::OrderField;
use crate::domain::order::{Order, OrderStatus, OrderType};
use crate::domain::sub_expr;

fn close_call() -> Expr {
    Expr::call(Function::Close, vec![])
}

struct Resolver<'n, 'c, 'a> {
    node: &'n DecisionNode,
    ctx: &'c EvalContext<'a>,
}

impl Resolver<'_, '_, '_> {
    fn unresolved(&self, field: OrderField, reason: impl Into<String>) -> RuleflowError {
        RuleflowError::UnresolvedField {
            node: self.node.id.clone(),
            field: field.name().to_string(),
            reason: reason.into(),
        }
    }

    /// Substitute, parse, convert with `wrap`, then evaluate to a finite number.
    fn resolve<F>(&self, field: OrderField, wrap: F) -> Result<f64, RuleflowError>
    where
        F: FnOnce(Expr, Unit) -> Result<Expr, String>,
    {
        let template = field
            .template(self.node)
            .ok_or_else(|| self.unresolved(field, "template is empty"))?;
        let value = self
            .evaluate_template(template, field, wrap)
            .map_err(|e| self.unresolved(field, e.to_string()))?;
        if !value.is_finite() {
            return Err(self.unresolved(field, format!("non-finite result {}", value)));
        }
        Ok(value)
    }

    fn evaluate_template<F>(&self, template: &str, field: OrderField, wrap: F) -> Result<f64, ExprError>
    where
        F: FnOnce(Expr, Unit) -> Result<Expr, String>,
    {
        let resolved = sub_expr::resolve(template, self.ctx)?;
        let expr = expr_parser::parse(&resolved)?;
        let wrapped = wrap(expr, field.unit(self.node)).map_err(|reason| {
            ExprError::invalid(field.name(), reason)
        })?;
        evaluate(&wrapped, self.ctx)?.as_number()
    }
}

fn unsupported(unit: Unit, field: OrderField) -> String {
    format!("unit {} does not apply to {}", unit, field.name())
}

/// Resolve `node` into an OPENED order for the context's newest bar.
pub fn resolve_order(
    node: &DecisionNode,
    order_type: OrderType,
    bot_id: i64,
    ctx: &EvalContext<'_>,
) -> Result<Order, RuleflowError> {
    let r = Resolver { node, ctx };
    let bar = ctx.bars.first().ok_or_else(|| RuleflowError::UnresolvedField {
        node: node.id.clone(),
        field: OrderField::Entry.name().to_string(),
        reason: "no bars in window".to_string(),
    })?;
    let close = bar.close;
    let buy = order_type.is_buy();
    let created_time = ctx.timeframe.next_time(bar.start_time);

    let stop = if order_type.has_stop() {
        Some(r.resolve(OrderField::Stop, |x, unit| match unit {
            Unit::None => Ok(x),
            Unit::Percent => Ok(x.percent_away_from(close_call(), buy)),
            other => Err(unsupported(other, OrderField::Stop)),
        })?)
    } else {
        None
    };

    let mut entry = match (order_type.has_limit_entry(), stop) {
        (true, _) => r.resolve(OrderField::Entry, |x, unit| match unit {
            Unit::None => Ok(x),
            Unit::Percent => Ok(x.percent_away_from(close_call(), !buy)),
            other => Err(unsupported(other, OrderField::Entry)),
        })?,
        (false, Some(stop)) => stop,
        (false, None) => close,
    };

    let immediate = match order_type {
        OrderType::BuyLimit => close <= entry,
        OrderType::SellLimit => close >= entry,
        OrderType::BuyStopLimit => close <= entry && stop.is_some_and(|s| close >= s),
        OrderType::SellStopLimit => close >= entry && stop.is_some_and(|s| close <= s),
        _ => false,
    };
    if immediate {
        entry = close;
    }

    let mut sl = r.resolve(OrderField::Sl, |x, unit| match unit {
        Unit::None => Ok(x),
        Unit::Percent => Ok(x.percent_away_from(Expr::Number(entry), !buy)),
        other => Err(unsupported(other, OrderField::Sl)),
    })?;

    let mut tp = r.resolve(OrderField::Tp, |x, unit| match unit {
        Unit::None => Ok(x),
        Unit::Percent => Ok(x.percent_away_from(Expr::Number(entry), buy)),
        Unit::Rr => {
            let risk = Expr::binary(BinaryOp::Sub, Expr::Number(entry), Expr::Number(sl)).abs();
            let reward = Expr::binary(BinaryOp::Mul, risk, x.abs());
            let op = if buy { BinaryOp::Add } else { BinaryOp::Sub };
            Ok(Expr::binary(op, Expr::Number(entry), reward))
        }
        other => Err(unsupported(other, OrderField::Tp)),
    })?;

    let volume = r.resolve(OrderField::Volume, |x, unit| match unit {
        Unit::None => Ok(x),
        Unit::Usd => Ok(Expr::binary(BinaryOp::Div, x, Expr::Number(entry))),
        other => Err(unsupported(other, OrderField::Volume)),
    })?;

    let expired_time = if order_type.has_expiry() {
        let step_ms = match node.unit_expired_time {
            Unit::Candle => ctx.timeframe.duration_ms(),
            _ => MINUTE_MS,
        };
        let value = r.resolve(OrderField::ExpiredTime, |x, unit| match unit {
            Unit::None => Ok(x),
            Unit::Minute | Unit::Candle => Ok(Expr::binary(
                BinaryOp::Add,
                Expr::binary(BinaryOp::Mul, x, Expr::Number(step_ms as f64)),
                Expr::Number(created_time as f64),
            )),
            other => Err(unsupported(other, OrderField::ExpiredTime)),
        })?;
        Some(value.round() as i64)
    } else {
        None
    };

    if buy {
        if entry <= sl {
            sl = entry;
        }
        if entry >= tp {
            tp = entry;
        }
    } else {
        if entry >= sl {
            sl = entry;
        }
        if entry <= tp {
            tp = entry;
        }
    }

    Ok(Order {
        id: 0,
        bot_id,
        symbol: ctx.symbol.to_string(),
        broker: ctx.broker.to_string(),
        timeframe: ctx.timeframe,
        order_type,
        volume,
        stop,
        entry,
        tp,
        sl,
        status: OrderStatus::Opened,
        created_time,
        expired_time,
        time_stop: None,
        time_entry: None,
        time_tp: None,
        time_sl: None,
        last_time_updated: None,
    })
}
