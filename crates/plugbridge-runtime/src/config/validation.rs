//! Configuration validation utilities.

use plugbridge_core::registry::QUALIFIER;
use serde_json::Value;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BridgeConfig, BridgeSettings, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BridgeConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_bridge_settings(&config.bridge)?;
    for (plugin_id, section) in &config.plugins {
        validate_plugin_section(plugin_id, section)?;
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter target cannot be blank: '{target}'"
        )));
    }

    Ok(())
}

fn validate_bridge_settings(bridge: &BridgeSettings) -> ConfigResult<()> {
    if bridge.max_page_size == 0 {
        return Err(ConfigError::validation(
            "bridge.max_page_size must be greater than 0",
        ));
    }
    Ok(())
}

/// Plugin ids are registry keys, so they cannot be blank, contain spaces or
/// the entity qualifier.
fn validate_plugin_section(plugin_id: &str, section: &Value) -> ConfigResult<()> {
    if plugin_id.trim().is_empty() || plugin_id.contains(' ') || plugin_id.contains(QUALIFIER) {
        return Err(ConfigError::InvalidPluginId(plugin_id.to_string()));
    }

    if !matches!(section, Value::Object(_) | Value::Null) {
        return Err(ConfigError::validation(format!(
            "Configuration for plugin '{plugin_id}' must be a table"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&BridgeConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = BridgeConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some("logs/plugbridge.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_page_size() {
        let mut config = BridgeConfig::default();
        config.bridge.max_page_size = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_plugin_sections() {
        let mut config = BridgeConfig::default();
        config.plugins.insert("lab/results".into(), json!({}));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPluginId(id)) if id == "lab/results"
        ));

        let mut config = BridgeConfig::default();
        config.plugins.insert("lab".into(), json!([1, 2]));
        assert!(validate_config(&config).is_err());

        let mut config = BridgeConfig::default();
        config.plugins.insert("lab".into(), json!({ "batch": 10 }));
        assert!(validate_config(&config).is_ok());
    }
}
