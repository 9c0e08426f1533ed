//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`plugbridge.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`plugbridge.yaml`, `plugbridge.yml`, etc.)
//!
//! Both features can be enabled simultaneously; if so, both file formats are searched and loaded.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic values passed to [`ConfigLoader::merge`]
//! 3. Main config file (`plugbridge.toml` / `plugbridge.yaml`)
//! 4. Profile-specific config file (`plugbridge.{profile}.toml`)
//! 5. Environment variables (`PLUGBRIDGE_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `PLUGBRIDGE_` prefix with `__` as separator:
//!
//! - `PLUGBRIDGE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `PLUGBRIDGE_REGISTRY__PURGE_ON_STOP=false` → `registry.purge_on_stop = false`
//! - `PLUGBRIDGE_PLUGINS__DIAGNOSIS__BATCH=50` → `plugins.diagnosis.batch = 50`
//!
//! # Example
//!
//! ```rust,ignore
//! use plugbridge_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/plugbridge.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::BridgeConfig;

const ENV_PREFIX: &str = "PLUGBRIDGE_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev` / `prod` short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `PLUGBRIDGE_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var("PLUGBRIDGE_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Loads configuration from the default locations with environment overrides.
pub fn load_config() -> ConfigResult<BridgeConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path` with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<BridgeConfig> {
    ConfigLoader::new().file(path).load()
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration values programmatically, below files and env.
    pub fn merge(mut self, config: BridgeConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<BridgeConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: BridgeConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            plugin_sections = config.plugins.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(BridgeConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Dispatches on file extension; only feature-enabled formats are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("plugbridge"));
        }
        paths
    }

    /// Searches `search_paths × base_names` for the first base file, then
    /// layers its profile-specific sibling on top.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let base_path = search_path.join(base_name);
                if !base_path.exists() {
                    continue;
                }
                info!(path = %base_path.display(), "Loading configuration file");
                figment = merge_fn(figment, &base_path);

                if let Some((stem, ext)) = base_name.rsplit_once('.') {
                    let profile_path =
                        search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                    if profile_path.exists() {
                        debug!(path = %profile_path.display(), "Loading profile-specific config");
                        figment = merge_fn(figment, &profile_path);
                    }
                }
                return (figment, true);
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, figment: Figment) -> Figment {
        #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
        let search_paths = self.resolve_search_paths();
        #[allow(unused_mut)]
        let mut figment = figment;
        #[allow(unused_mut)]
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["plugbridge.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["plugbridge.yaml", "plugbridge.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level.as_str(), "info");
            assert!(config.registry.purge_on_stop);
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("PLUGBRIDGE_PROFILE", "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_file_profile_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "plugbridge.toml",
                r#"
                [logging]
                level = "warn"

                [bridge]
                max_page_size = 200

                [plugins.diagnosis]
                batch = 10
                "#,
            )?;
            jail.create_file(
                "plugbridge.staging.toml",
                r#"
                [bridge]
                max_page_size = 300
                "#,
            )?;
            jail.set_env("PLUGBRIDGE_REGISTRY__PURGE_ON_STOP", "false");
            jail.set_env("PLUGBRIDGE_PLUGINS__DIAGNOSIS__BATCH", "25");

            let config = ConfigLoader::new()
                .profile("staging")
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.bridge.max_page_size, 300);
            assert!(!config.registry.purge_on_stop);
            assert_eq!(config.plugins["diagnosis"]["batch"], 25);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .file("/nonexistent/plugbridge.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("plugbridge.ini", "level=debug")?;
            let result = ConfigLoader::new().file("plugbridge.ini").without_env().load();
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }
}
