//! CLI error types with miette diagnostics.
//!
//! Every variant is a startup failure; once the load test is running,
//! connection problems are retried and never surface here.

use miette::Diagnostic;
use thiserror::Error;

use wsload_config::ConfigError;
use wsload_core::CoreError;

/// Process exit codes. Clap exits with 2 on usage errors by itself.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Credentials ──────────────────────────────────────────────────

    #[error("No API key configured for service '{service}'")]
    #[diagnostic(
        code(wsload::no_credentials),
        help(
            "Pass --api-key (-k), set WSLOAD_API_KEY, or store one with:\n  \
             keyring set wsload {service}/api-key\n\
             Config file: {path}"
        )
    )]
    NoCredentials { service: String, path: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Unsupported service '{service}'")]
    #[diagnostic(
        code(wsload::unsupported_service),
        help("Supported services: {supported}")
    )]
    UnsupportedService { service: String, supported: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wsload::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Could not load configuration: {source}")]
    #[diagnostic(
        code(wsload::config),
        help("Check the config file at {path}")
    )]
    Config {
        #[source]
        source: Box<figment::Error>,
        path: String,
    },

    #[error("Could not open log file {path}: {reason}")]
    #[diagnostic(code(wsload::log_file), help("Choose another location with --log-file"))]
    LogFile { path: String, reason: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode report: {0}")]
    #[diagnostic(code(wsload::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        exit_code::GENERAL
    }
}

// ── Lower-layer error mapping ────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let path = wsload_config::config_path().display().to_string();
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { service } => Self::NoCredentials { service, path },
            ConfigError::UnsupportedService { service, supported } => {
                Self::UnsupportedService { service, supported }
            }
            ConfigError::Figment(source) => Self::Config { source, path },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig { field, reason } => Self::Validation { field, reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_exit_with_general_code() {
        let err = CliError::from(CoreError::InvalidConfig {
            field: "count".into(),
            reason: "must be at least 1".into(),
        });
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "Invalid value for count: must be at least 1");
    }

    #[test]
    fn config_errors_keep_their_meaning() {
        let err = CliError::from(ConfigError::UnsupportedService {
            service: "eth".into(),
            supported: "xrplevm".into(),
        });
        assert!(matches!(err, CliError::UnsupportedService { ref service, .. } if service == "eth"));

        let err = CliError::from(ConfigError::NoCredentials {
            service: "xrplevm".into(),
        });
        assert!(err.to_string().contains("xrplevm"));
    }
}
