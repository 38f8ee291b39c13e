// wsload-core: connection lifecycle and statistics between wsload-api and the CLI.

pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod report;
pub mod state;
pub mod stats;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{LoadTestConfig, RetryPolicy};
pub use error::CoreError;
pub use manager::ConnectionManager;
pub use registry::{PendingRequests, SubscriptionRegistry, UNKNOWN_TYPE};
pub use report::{FinalReport, LiveReport};
pub use state::{ConnectionState, Transition};
pub use stats::{ConnectionRecord, Stats, StatsAggregator, StatsSnapshot};
