//! Runtime error types.

use std::fmt;

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Boxed error returned from plugin lifecycle hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What went wrong with a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginErrorCode {
    InitializationFailed,
    StartFailed,
    StopFailed,
    MissingDependencies,
    ConfigurationError,
    NotFound,
    AlreadyInstalled,
}

impl PluginErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitializationFailed => "initialization failed",
            Self::StartFailed => "start failed",
            Self::StopFailed => "stop failed",
            Self::MissingDependencies => "missing dependencies",
            Self::ConfigurationError => "configuration error",
            Self::NotFound => "not found",
            Self::AlreadyInstalled => "already installed",
        }
    }
}

impl fmt::Display for PluginErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plugin lifecycle failure, tagged with the plugin id.
#[derive(Debug, Error)]
#[error("plugin '{plugin_id}': {code}: {message}")]
pub struct PluginError {
    pub plugin_id: String,
    pub code: PluginErrorCode,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl PluginError {
    pub fn new(
        plugin_id: impl Into<String>,
        code: PluginErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn not_found(plugin_id: impl Into<String>) -> Self {
        Self::new(plugin_id, PluginErrorCode::NotFound, "no such plugin")
    }

    pub fn already_installed(plugin_id: impl Into<String>) -> Self {
        Self::new(
            plugin_id,
            PluginErrorCode::AlreadyInstalled,
            "a plugin with this id is already registered",
        )
    }

    pub fn missing_dependencies(plugin_id: impl Into<String>, missing: &[String]) -> Self {
        Self::new(
            plugin_id,
            PluginErrorCode::MissingDependencies,
            format!("inactive or unknown dependencies: {}", missing.join(", ")),
        )
    }
}

/// Result type for plugin host operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_and_source() {
        let err = PluginError::new("lab", PluginErrorCode::StartFailed, "database offline")
            .with_source("connection refused".into());
        assert_eq!(
            err.to_string(),
            "plugin 'lab': start failed: database offline"
        );
        assert_eq!(err.source().unwrap().to_string(), "connection refused");

        let err = PluginError::missing_dependencies("lab", &["patient".into(), "core".into()]);
        assert_eq!(err.code, PluginErrorCode::MissingDependencies);
        assert!(err.to_string().ends_with("patient, core"));
    }
}
