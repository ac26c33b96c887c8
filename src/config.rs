//! Process-level configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::endpoint::DEFAULT_TIMEOUT;
use crate::error::{CourierError, Result};

pub const RESOURCE_DIR_VAR: &str = "COURIER_RESOURCE_DIR";
pub const DEFAULT_TIMEOUT_VAR: &str = "COURIER_DEFAULT_TIMEOUT_MS";
pub const LOG_FILTER_VAR: &str = "COURIER_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierConfig {
    /// Base directory for relative resource paths.
    pub resource_dir: Option<PathBuf>,
    /// Receive timeout for endpoints that declare none.
    pub default_timeout: Duration,
    /// `tracing_subscriber` filter directive.
    pub log_filter: String,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            resource_dir: None,
            default_timeout: DEFAULT_TIMEOUT,
            log_filter: "info".to_string(),
        }
    }
}

impl CourierConfig {
    /// Load `.env` (if present) and read the `COURIER_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let default_timeout = match lookup(DEFAULT_TIMEOUT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| CourierError::Config(format!("{} must be milliseconds: {}", DEFAULT_TIMEOUT_VAR, e)))?,
            None => defaults.default_timeout,
        };

        Ok(Self {
            resource_dir: lookup(RESOURCE_DIR_VAR)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            default_timeout,
            log_filter: lookup(LOG_FILTER_VAR).unwrap_or(defaults.log_filter),
        })
    }
}
