//! Configuration for the wsload binary.
//!
//! A flat TOML file, `WSLOAD_*` environment overrides, endpoint
//! construction from service + application id, and credential resolution
//! (env + keyring + plaintext). CLI flags are layered on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Keyring service name; entries are `<service>/api-key`.
pub const KEYRING_SERVICE: &str = "wsload";

/// Environment prefix for config overrides (`WSLOAD_APP_ID`, ...).
pub const ENV_PREFIX: &str = "WSLOAD_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for service '{service}'")]
    NoCredentials { service: String },

    #[error("unsupported service '{service}' (supported: {supported})")]
    UnsupportedService { service: String, supported: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Everything the config file (or `WSLOAD_*` env) can set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Target service id, sent as `Target-Service-Id`.
    #[serde(default = "default_service")]
    pub service: String,

    /// Comma-separated subscription types.
    #[serde(default = "default_subscriptions")]
    pub subscriptions: String,

    /// Subscriptions per type.
    #[serde(default = "default_count")]
    pub count: u32,

    /// Endpoint with `{service}` and `{app_id}` placeholders.
    #[serde(default = "default_endpoint_template")]
    pub endpoint_template: String,

    #[serde(default = "default_supported_services")]
    pub supported_services: Vec<String>,

    pub app_id: Option<String>,

    /// API key in plaintext. Prefer the keyring or `api_key_env`.
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    #[serde(default = "default_dial_backoff_secs")]
    pub dial_backoff_secs: u64,

    #[serde(default = "default_read_backoff_secs")]
    pub read_backoff_secs: u64,

    #[serde(default = "default_send_spacing_ms")]
    pub send_spacing_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: default_service(),
            subscriptions: default_subscriptions(),
            count: default_count(),
            endpoint_template: default_endpoint_template(),
            supported_services: default_supported_services(),
            app_id: None,
            api_key: None,
            api_key_env: None,
            dial_backoff_secs: default_dial_backoff_secs(),
            read_backoff_secs: default_read_backoff_secs(),
            send_spacing_ms: default_send_spacing_ms(),
        }
    }
}

fn default_service() -> String {
    "xrplevm".into()
}
fn default_subscriptions() -> String {
    "newHeads".into()
}
fn default_count() -> u32 {
    1
}
fn default_endpoint_template() -> String {
    "wss://{service}.rpc.grove.city/v1/{app_id}".into()
}
fn default_supported_services() -> Vec<String> {
    vec!["xrplevm".into()]
}
fn default_dial_backoff_secs() -> u64 {
    5
}
fn default_read_backoff_secs() -> u64 {
    2
}
fn default_send_spacing_ms() -> u64 {
    100
}

impl Config {
    pub fn dial_backoff(&self) -> Duration {
        Duration::from_secs(self.dial_backoff_secs)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_secs(self.read_backoff_secs)
    }

    pub fn send_spacing(&self) -> Duration {
        Duration::from_millis(self.send_spacing_ms)
    }

    /// Reject services outside the allow-list.
    pub fn check_service(&self, service: &str) -> Result<(), ConfigError> {
        if self.supported_services.iter().any(|s| s == service) {
            return Ok(());
        }
        Err(ConfigError::UnsupportedService {
            service: service.into(),
            supported: self.supported_services.join(", "),
        })
    }

    /// Fill the endpoint template for `service` and `app_id`.
    pub fn endpoint(&self, service: &str, app_id: &str) -> Result<Url, ConfigError> {
        if app_id.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "app_id".into(),
                reason: "an application id is required (use --app-id or set app_id)".into(),
            });
        }
        let raw = self
            .endpoint_template
            .replace("{service}", service)
            .replace("{app_id}", app_id);
        Url::parse(&raw).map_err(|e| ConfigError::Validation {
            field: "endpoint_template".into(),
            reason: format!("'{raw}' is not a valid URL: {e}"),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("city", "grove", "wsload").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("wsload");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an
/// error: defaults and env still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX));

    Ok(figment.extract()?)
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve an API key from the credential chain (no CLI flag step).
pub fn resolve_api_key(config: &Config, service: &str) -> Result<SecretString, ConfigError> {
    // 1. Configured env var
    if let Some(ref env_name) = config.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{service}/api-key")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = config.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        service: service.into(),
    })
}
