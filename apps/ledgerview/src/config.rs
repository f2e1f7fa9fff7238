//! # Configuration
//!
//! Optional `ledgerview.toml`:
//!
//! ```toml
//! [view]
//! narrow_window = 500000
//! max_in_flight = 20
//! poll_interval_ms = 5000
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```
//!
//! A missing file means defaults. `LEDGERVIEW_NARROW_WINDOW`,
//! `LEDGERVIEW_MAX_IN_FLIGHT` and `LEDGERVIEW_POLL_INTERVAL_MS` override the
//! file.

use ledgerview_core::ViewError;
use ledgerview_core::primitives::{MAX_IN_FLIGHT_QUERIES, NARROW_WINDOW, POLL_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "ledgerview.toml";

pub const ENV_NARROW_WINDOW: &str = "LEDGERVIEW_NARROW_WINDOW";
pub const ENV_MAX_IN_FLIGHT: &str = "LEDGERVIEW_MAX_IN_FLIGHT";
pub const ENV_POLL_INTERVAL_MS: &str = "LEDGERVIEW_POLL_INTERVAL_MS";

/// Scanner and resolver tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Heights covered by the first, bounded scan.
    pub narrow_window: u64,
    /// Point queries allowed in flight at once.
    pub max_in_flight: usize,
    /// Milliseconds between re-reads of a focused entity.
    pub poll_interval_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            narrow_window: NARROW_WINDOW,
            max_in_flight: MAX_IN_FLIGHT_QUERIES,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl ViewConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub view: ViewConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Parse and validate TOML text. Environment overrides are not applied.
    pub fn from_toml_str(contents: &str) -> Result<Self, ViewError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| config_error(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from `./ledgerview.toml` when no path is given,
    /// then apply environment overrides.
    ///
    /// An explicit path must exist. The implicit one may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ViewError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ViewError::Io(format!("failed to read {}: {e}", path.display())))?;
            let config: Self = toml::from_str(&contents)
                .map_err(|e| config_error(format!("failed to parse {}: {e}", path.display())))?;
            tracing::debug!(path = %path.display(), "loaded config file");
            config
        } else if required {
            return Err(ViewError::Io(format!(
                "config file not found: {}",
                path.display()
            )));
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ViewError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`. Unset keys leave values alone.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ViewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_NARROW_WINDOW) {
            self.view.narrow_window = parse_override(ENV_NARROW_WINDOW, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_IN_FLIGHT) {
            self.view.max_in_flight = parse_override(ENV_MAX_IN_FLIGHT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.view.poll_interval_ms = parse_override(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        if self.view.narrow_window == 0 {
            return Err(config_error("view.narrow_window must be positive".to_string()));
        }
        if self.view.max_in_flight == 0 {
            return Err(config_error("view.max_in_flight must be positive".to_string()));
        }
        if self.view.poll_interval_ms == 0 {
            return Err(config_error("view.poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ViewError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| config_error(format!("invalid {key}={raw:?}: {e}")))
}

fn config_error(reason: String) -> ViewError {
    ViewError::Config(reason)
}

// =============================================================================
// TESTS
// =============================================================================
