//! Save-time validation of a single decision node, without graph context.

use crate::domain::decision_graph::{DecisionNode, NodeKind, Unit};
use crate::domain::error::RuleflowError;
use crate::domain::expr_validation::{validate_expression, validate_template};
use crate::domain::order::OrderType;

/// Order template fields, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Stop,
    Entry,
    Sl,
    Tp,
    Volume,
    ExpiredTime,
}

impl OrderField {
    pub fn name(self) -> &'static str {
        match self {
            OrderField::Stop => "stop",
            OrderField::Entry => "entry",
            OrderField::Sl => "sl",
            OrderField::Tp => "tp",
            OrderField::Volume => "volume",
            OrderField::ExpiredTime => "expiredTime",
        }
    }

    pub fn required_by(self, order_type: OrderType) -> bool {
        match self {
            OrderField::Stop => order_type.has_stop(),
            OrderField::Entry => order_type.has_limit_entry(),
            OrderField::Sl | OrderField::Tp | OrderField::Volume => true,
            OrderField::ExpiredTime => order_type.has_expiry(),
        }
    }

    pub fn allowed_units(self) -> &'static [Unit] {
        match self {
            OrderField::Stop | OrderField::Entry | OrderField::Sl => &[Unit::None, Unit::Percent],
            OrderField::Tp => &[Unit::None, Unit::Percent, Unit::Rr],
            OrderField::Volume => &[Unit::None, Unit::Usd],
            OrderField::ExpiredTime => &[Unit::None, Unit::Minute, Unit::Candle],
        }
    }

    pub fn template(self, node: &DecisionNode) -> Option<&str> {
        match self {
            OrderField::Stop => node.stop.as_deref(),
            OrderField::Entry => node.entry.as_deref(),
            OrderField::Sl => node.sl.as_deref(),
            OrderField::Tp => node.tp.as_deref(),
            OrderField::Volume => node.volume.as_deref(),
            OrderField::ExpiredTime => node.expired_time.as_deref(),
        }
    }

    pub fn unit(self, node: &DecisionNode) -> Unit {
        match self {
            OrderField::Stop => node.unit_stop,
            OrderField::Entry => node.unit_entry,
            OrderField::Sl => node.unit_sl,
            OrderField::Tp => node.unit_tp,
            OrderField::Volume => node.unit_volume,
            OrderField::ExpiredTime => node.unit_expired_time,
        }
    }
}

pub const ORDER_FIELDS: [OrderField; 6] = [
    OrderField::Stop,
    OrderField::Entry,
    OrderField::Sl,
    OrderField::Tp,
    OrderField::Volume,
    OrderField::ExpiredTime,
];

fn invalid(node: &DecisionNode, reason: impl Into<String>) -> RuleflowError {
    RuleflowError::Validation {
        node: node.id.clone(),
        reason: reason.into(),
    }
}

fn required_value(node: &DecisionNode) -> Result<&str, RuleflowError> {
    node.value
        .as_deref()
        .ok_or_else(|| invalid(node, "value is empty"))
}

pub fn validate_node(node: &DecisionNode) -> Result<(), RuleflowError> {
    match node.kind()? {
        NodeKind::Start | NodeKind::CloseAllOrder | NodeKind::CloseAllPosition => Ok(()),
        NodeKind::Expr => {
            let value = required_value(node)?;
            validate_expression(value).map_err(|e| invalid(node, format!("value: {}", e)))
        }
        NodeKind::Telegram => {
            let value = required_value(node)?;
            validate_template(value)
                .map(|_| ())
                .map_err(|e| invalid(node, format!("value: {}", e)))
        }
        NodeKind::Order(order_type) => validate_order_node(node, order_type),
    }
}

fn validate_order_node(node: &DecisionNode, order_type: OrderType) -> Result<(), RuleflowError> {
    for field in ORDER_FIELDS {
        if !field.required_by(order_type) {
            continue;
        }
        let template = field
            .template(node)
            .ok_or_else(|| invalid(node, format!("{} is required for {}", field.name(), order_type)))?;
        let unit = field.unit(node);
        if !field.allowed_units().contains(&unit) {
            return Err(invalid(
                node,
                format!("unit {} does not apply to {}", unit, field.name()),
            ));
        }
        validate_expression(template).map_err(|e| invalid(node, format!("{}: {}", field.name(), e)))?;
    }
    Ok(())
}
