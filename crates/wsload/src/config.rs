//! CLI flag overrides on top of `wsload_config`, producing the
//! `LoadTestConfig` the core runs with.
//!
//! Precedence: flags > `WSLOAD_*` env > config file > built-in defaults.

use secrecy::SecretString;
use url::Url;

use wsload_config::{Config, ConfigError};
use wsload_core::{LoadTestConfig, RetryPolicy};

use crate::cli::RunArgs;
use crate::error::CliError;

/// Load the config file and apply flags.
pub fn resolve(args: &RunArgs) -> Result<LoadTestConfig, CliError> {
    let cfg = wsload_config::load_config()?;
    resolve_with(args, &cfg)
}

/// Apply flags to an already-loaded config and validate the result.
pub fn resolve_with(args: &RunArgs, cfg: &Config) -> Result<LoadTestConfig, CliError> {
    let service = args.service.clone().unwrap_or_else(|| cfg.service.clone());
    cfg.check_service(&service)?;

    // --url skips endpoint construction, and with it the app id and the
    // credential requirement (local test servers rarely want one).
    let (url, auth) = if let Some(ref raw) = args.url {
        let url = Url::parse(raw).map_err(|e| CliError::Validation {
            field: "url".into(),
            reason: format!("'{raw}': {e}"),
        })?;
        let auth = match api_key(args, cfg, &service) {
            Ok(key) => Some(key),
            Err(ConfigError::NoCredentials { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        (url, auth)
    } else {
        let app_id = args.app_id.as_deref().or(cfg.app_id.as_deref()).unwrap_or("");
        let url = cfg.endpoint(&service, app_id)?;
        (url, Some(api_key(args, cfg, &service)?))
    };

    let mut config = LoadTestConfig::new(url, service);
    config.auth = auth;
    config.subscriptions = args
        .subscriptions
        .clone()
        .unwrap_or_else(|| cfg.subscriptions.clone());
    config.instances = args.count.unwrap_or(cfg.count);
    config.capture_messages = args.log;
    config.retry = RetryPolicy {
        dial_backoff: cfg.dial_backoff(),
        read_backoff: cfg.read_backoff(),
        send_spacing: cfg.send_spacing(),
    };

    config.validate()?;
    Ok(config)
}

fn api_key(args: &RunArgs, cfg: &Config, service: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref key) = args.api_key {
        return Ok(SecretString::from(key.clone()));
    }
    wsload_config::resolve_api_key(cfg, service)
}
