//! Core domain types and logic.

pub mod bar;
pub mod bot;
pub mod config_validation;
pub mod decision_graph;
pub mod dispatcher;
pub mod error;
pub mod expr;
pub mod expr_eval;
pub mod expr_parser;
pub mod expr_validation;
pub mod indicator;
pub mod node_validation;
pub mod notification;
pub mod order;
pub mod order_lifecycle;
pub mod order_resolver;
pub mod sub_expr;
