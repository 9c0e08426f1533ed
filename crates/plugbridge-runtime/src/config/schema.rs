//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "pretty"
//! filters = { plugbridge_core = "trace" }
//!
//! [registry]
//! purge_on_stop = true
//!
//! [bridge]
//! max_page_size = 500
//!
//! [plugins.diagnosis]
//! seed_demo_data = true
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use plugbridge_core::bridge::DEFAULT_MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Service registry behaviour.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Bridge facade limits.
    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Per-plugin configuration sections, keyed by plugin id.
    #[serde(default)]
    pub plugins: HashMap<String, Value>,
}

impl BridgeConfig {
    /// Returns the configuration section for `plugin_id`, if present.
    pub fn plugin_section(&self, plugin_id: &str) -> Option<&Value> {
        self.plugins.get(plugin_id)
    }
}

// =============================================================================
// Registry / bridge
// =============================================================================

/// Service registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Remove a plugin's services and operation tables when it stops.
    #[serde(default = "default_purge_on_stop")]
    pub purge_on_stop: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            purge_on_stop: default_purge_on_stop(),
        }
    }
}

fn default_purge_on_stop() -> bool {
    true
}

/// Bridge facade settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Upper bound for the page size of paged lookups.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_max_page_size() -> usize {
    DEFAULT_MAX_PAGE_SIZE
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation policy for file output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in each line.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in each line.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target level overrides, e.g. `plugbridge_core = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.registry.purge_on_stop);
        assert_eq!(config.bridge.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: BridgeConfig = serde_json::from_value(serde_json::json!({
            "logging": { "level": "debug", "filters": { "plugbridge_core": "trace" } },
            "registry": { "purge_on_stop": false },
            "plugins": { "diagnosis": { "seed": 3 } }
        }))
        .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.filters.get("plugbridge_core"),
            Some(&LogLevel::Trace)
        );
        assert!(!config.registry.purge_on_stop);
        assert_eq!(config.bridge.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.plugin_section("diagnosis").unwrap()["seed"], 3);
        assert!(config.plugin_section("lab").is_none());
    }
}
