//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_bot_adapter;
pub mod log_notifier;
pub mod sqlite_adapter;
