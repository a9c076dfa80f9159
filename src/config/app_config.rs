use std::env;
use std::time::Duration;

use crate::check::CheckPolicy;
use crate::error::ConfigError;

use super::model::{ServiceConfig, StoreConfig};

const DEFAULT_CONFIG_FILE: &str = "config.yml";
const MAX_PROBE_TIMEOUT_MS: u64 = 10 * 60 * 1000;
const MAX_FRESHNESS_WINDOW_SECONDS: u64 = 366 * 24 * 60 * 60;

pub struct AppConfig {
    pub config: ServiceConfig,
    pub config_file: Option<String>,
}

impl AppConfig {
    pub fn check_policy(&self) -> CheckPolicy {
        CheckPolicy {
            probe_timeout: Duration::from_millis(self.config.probe_timeout_ms),
            freshness_window: Duration::from_secs(self.config.freshness_window_seconds),
        }
    }
}

/// Load the application configuration from a YAML file and environment variables.
/// The file is named by `CONFIG_FILE` (default `config.yml`, which may be absent).
/// `LISTEN_ADDR`, `PROBE_TIMEOUT_MS`, `FRESHNESS_WINDOW_SECONDS` and `REDIS_URL`
/// override the corresponding file values. A `.env` file is honoured.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_config_from(|name| env::var(name).ok())
}

/// Same as [`load_config`] with an explicit variable lookup.
pub fn load_config_from<F>(var: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit_file = var("CONFIG_FILE");
    let config_file_location = explicit_file
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    let (mut config, config_file) = match std::fs::read_to_string(&config_file_location) {
        Ok(config_str) => {
            let config: ServiceConfig =
                serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Parse {
                    path: config_file_location.clone(),
                    source,
                })?;
            (config, Some(config_file_location))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit_file.is_none() => {
            (ServiceConfig::default(), None)
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_file_location,
                source,
            });
        }
    };

    if let Some(addr) = var("LISTEN_ADDR") {
        config.listen_addr = addr;
    }
    if let Some(raw) = var("PROBE_TIMEOUT_MS") {
        config.probe_timeout_ms = parse_number("PROBE_TIMEOUT_MS", &raw)?;
    }
    if let Some(raw) = var("FRESHNESS_WINDOW_SECONDS") {
        config.freshness_window_seconds = parse_number("FRESHNESS_WINDOW_SECONDS", &raw)?;
    }
    if let Some(url) = var("REDIS_URL") {
        config.store = StoreConfig::Redis { url };
    }

    validate(&config)?;

    Ok(AppConfig {
        config,
        config_file,
    })
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("{raw:?}: {e}"),
    })
}

fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    check_range("probe_timeout_ms", config.probe_timeout_ms, MAX_PROBE_TIMEOUT_MS)?;
    check_range(
        "freshness_window_seconds",
        config.freshness_window_seconds,
        MAX_FRESHNESS_WINDOW_SECONDS,
    )
}

fn check_range(name: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    if value > max {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("{value} exceeds the maximum of {max}"),
        });
    }
    Ok(())
}

/// Setup the shared HTTP client used for probing.
/// Redirects are followed; the per-probe deadline is enforced by the fetcher,
/// so the client itself has no overall timeout.
pub fn setup_http_client(config: &ServiceConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
}
