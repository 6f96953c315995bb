//! Broadcaster configuration.
//!
//! Settings come from an optional `gridiron-server.yaml`, then environment
//! variables override individual values. Every field has a default, so the
//! server runs with no file and no environment at all.

use std::path::Path;
use std::time::Duration;

use gridiron_core::DemoConfig;
use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "gridiron-server.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid {name}: {message}")]
    Env {
        /// The variable name.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Milliseconds between heartbeat sweeps.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Built-in demo ticker.
    #[serde(default)]
    pub demo: DemoTickerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            demo: DemoTickerConfig::default(),
        }
    }
}

/// Cadence of the demo ticker that feeds every connected viewer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemoTickerConfig {
    /// Whether the ticker runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Milliseconds between `ClockUpdate` events.
    #[serde(default = "default_clock_tick_ms")]
    pub clock_tick_ms: u64,

    /// Milliseconds between play snaps.
    #[serde(default = "default_play_interval_ms")]
    pub play_interval_ms: u64,

    /// Milliseconds from `PlayStart` to `PlayEnd`.
    #[serde(default = "default_play_duration_ms")]
    pub play_duration_ms: u64,

    /// Fixed RNG seed, for reproducible feeds.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for DemoTickerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clock_tick_ms: default_clock_tick_ms(),
            play_interval_ms: default_play_interval_ms(),
            play_duration_ms: default_play_duration_ms(),
            seed: None,
        }
    }
}

impl DemoTickerConfig {
    /// Generator settings for this ticker.
    pub fn demo_config(&self) -> DemoConfig {
        DemoConfig {
            clock_tick: Duration::from_millis(self.clock_tick_ms),
            play_interval: Duration::from_millis(self.play_interval_ms),
            play_duration: Duration::from_millis(self.play_duration_ms),
            seed: self.seed,
            ..DemoConfig::broadcaster()
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path` if it exists, then apply environment
    /// overrides.
    ///
    /// Environment variables:
    /// - `HOST` overrides `host`
    /// - `PORT` overrides `port`
    /// - `HEARTBEAT_INTERVAL_MS` overrides `heartbeat_interval_ms`
    /// - `DEMO_ENABLED` overrides `demo.enabled`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed, or if an override is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a set variable cannot be parsed.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("HOST") {
            self.host = val;
        }
        if let Some(val) = lookup("PORT") {
            self.port = parse_env("PORT", &val)?;
        }
        if let Some(val) = lookup("HEARTBEAT_INTERVAL_MS") {
            self.heartbeat_interval_ms = parse_env("HEARTBEAT_INTERVAL_MS", &val)?;
        }
        if let Some(val) = lookup("DEMO_ENABLED") {
            self.demo.enabled = parse_env("DEMO_ENABLED", &val)?;
        }
        Ok(())
    }

    /// Interval between heartbeat sweeps.
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

fn parse_env<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        name,
        message: format!("{value:?}: {e}"),
    })
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3001
}

const fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

const fn default_true() -> bool {
    true
}

const fn default_clock_tick_ms() -> u64 {
    1000
}

const fn default_play_interval_ms() -> u64 {
    5200
}

const fn default_play_duration_ms() -> u64 {
    2000
}
