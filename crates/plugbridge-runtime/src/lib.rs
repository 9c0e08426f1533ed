//! plugbridge runtime - hosting layer for plugbridge plugins.
//!
//! This crate provides:
//! - The async [`Plugin`] trait and the [`PluginContext`] passed to its hooks
//! - [`PluginHost`]: dependency-ordered start/stop over a shared
//!   [`ServiceRegistry`](plugbridge_core::ServiceRegistry)
//! - Layered configuration loading ([`config`])
//! - Logging configuration ([`logging`])
//! - [`TaskTenant`], a tenant context scoped to the running task
//!
//! ```ignore
//! use plugbridge_runtime::{PluginHost, config, logging};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = config::load_config()?;
//!     config::validate_config(&config)?;
//!     logging::init_from_config(&config.logging);
//!
//!     let host = PluginHost::from_config(&config);
//!     host.register(DiagnosisPlugin::default()).await?;
//!     host.start_all().await;
//!
//!     tokio::signal::ctrl_c().await?;
//!     host.stop_all().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod plugin;
pub mod tenant;

// Re-exports
pub use config::{BridgeConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{BoxError, PluginError, PluginErrorCode, PluginResult};
pub use host::PluginHost;
pub use logging::{LoggingBuilder, SpanEvents};
pub use plugin::{Plugin, PluginContext};
pub use tenant::TaskTenant;

// Re-exported for plugin crates.
pub use async_trait::async_trait;
pub use tracing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
