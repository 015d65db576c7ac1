//! Node API telemetry: fetching documents and persisting them.

pub mod fetch;
pub mod store;

pub use fetch::{HttpJsonFetcher, JsonFetcher, is_ready_document};
pub use store::TelemetryWriter;

/// File name for the node stats document.
pub const NODE_STATS_FILE: &str = "node-stats.json";
/// File name for the node info document.
pub const NODE_INFO_FILE: &str = "node-info.json";
