//! ruleflow: rule engine that turns closed price bars into bot actions.
//!
//! Bots are decision graphs of expression, notification and order nodes.
//! Every closed bar walks the graphs of the bots subscribed to it; orders
//! created along the way are replayed against later bars until they fill,
//! stop out or expire.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], the async engine in [`runtime`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
pub mod runtime;
