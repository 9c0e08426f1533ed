//! Configuration for the plugbridge host.
//!
//! Settings are layered with figment (defaults, config files, `PLUGBRIDGE_*`
//! environment variables) and checked by [`validate_config`] before the host
//! is built.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BridgeConfig, BridgeSettings, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    RegistryConfig, SpanEventConfig,
};
pub use validation::validate_config;
