// ── Core error types ──
//
// Only startup validation can fail in this crate. Everything that goes
// wrong after the run loop starts is a transient `wsload_api::Error`,
// logged and absorbed by the connection manager's retry loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}
