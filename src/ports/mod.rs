//! Port traits the domain and runtime depend on.

pub mod bar_source;
pub mod bot_source;
pub mod config_port;
pub mod notifier;
pub mod order_store;
