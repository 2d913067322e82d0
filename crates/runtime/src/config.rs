//! Environment-variable configuration.
//!
//! Optional settings carry defaults; the adapter credential is required
//! only when a live adapter is selected, and its absence aborts startup
//! with a structured report rather than a mid-turn surprise.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const ENV_API_KEY: &str = "WARDEN_API_KEY";
pub const ENV_MODEL: &str = "WARDEN_MODEL";
pub const ENV_DATA_DIR: &str = "WARDEN_DATA_DIR";
pub const ENV_ADAPTER_TIMEOUT_SECS: &str = "WARDEN_ADAPTER_TIMEOUT_SECS";

const DEFAULT_MODEL: &str = "gm-large";
const DEFAULT_DATA_DIR: &str = "warden-data";
const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 30;

/// Missing or malformed environment, reported all at once.
#[derive(Debug, PartialEq, Eq, Error)]
#[error("configuration error: {}", .problems.join("; "))]
pub struct ConfigError {
    pub problems: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct WardenConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub data_dir: PathBuf,
    pub adapter_timeout: Duration,
}

impl WardenConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut problems = Vec::new();

        let api_key = std::env::var(ENV_API_KEY).ok().filter(|key| !key.is_empty());
        let model =
            std::env::var(ENV_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_owned());
        let data_dir = std::env::var(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let adapter_timeout = match std::env::var(ENV_ADAPTER_TIMEOUT_SECS) {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    problems.push(format!(
                        "{ENV_ADAPTER_TIMEOUT_SECS}='{raw}' is not a number of seconds"
                    ));
                    Duration::from_secs(DEFAULT_ADAPTER_TIMEOUT_SECS)
                }
            },
            Err(_) => Duration::from_secs(DEFAULT_ADAPTER_TIMEOUT_SECS),
        };

        if problems.is_empty() {
            Ok(Self {
                api_key,
                model,
                data_dir,
                adapter_timeout,
            })
        } else {
            Err(ConfigError { problems })
        }
    }

    /// The adapter credential, required for live adapters.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or_else(|| ConfigError {
            problems: vec![format!("required environment variable {ENV_API_KEY} is not set")],
        })
    }
}
