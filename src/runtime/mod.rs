//! Async runtime: shard workers, the engine router, the reconciliation
//! sweep, the staleness watchdog and the stdin event feed.

pub mod engine;
pub mod feed;
pub mod reconciliation;
pub mod shard;
pub mod watchdog;
