//! # plugbridge
//!
//! Cross-plugin data access for in-process plugin hosts.
//!
//! ## Overview
//!
//! Plugins are compiled separately and never share concrete entity types.
//! plugbridge lets one plugin read and write another plugin's entities
//! through a shared vocabulary of generic records, and call its custom
//! operations by name.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐ start/stop ┌──────────────────┐ register ┌─────────────────┐
//! │ PluginHost │───────────▶│ Plugin "patient" │─────────▶│ ServiceRegistry │
//! │ (runtime)  │───────────▶│ Plugin "lab"     │─────┐    │ (plugin, name)  │
//! └────────────┘            └──────────────────┘     │    └─────────────────┘
//!                                                    │             ▲
//!                                                    └─ Bridge ────┤
//!                                                    └─ Proxy  ────┘
//! ```
//!
//! - **Record**: ordered map of scalars, the only data shape crossing plugins
//! - **Entity Mapper**: converts `#[derive(Entity)]` types to and from records
//! - **DataService**: CRUD surface a plugin implements per entity
//! - **Bridge**: fluent lookups that return empty results when nothing serves
//!   an entity
//! - **ServiceProxy**: by-name invocation over an operation table
//! - **PluginHost**: dependency-ordered lifecycle, configuration, logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plugbridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load()?;
//!     plugbridge::runtime::logging::init_from_config(&config.logging);
//!
//!     let host = PluginHost::from_config(&config);
//!     host.register(PatientPlugin::default()).await?;
//!     host.register(LabPlugin::default()).await?;
//!     host.start_all().await;
//!
//!     let results = host.bridge().find("LabResult").by_owner(patient_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use plugbridge_core as core;
pub use plugbridge_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use plugbridge::prelude::*;
/// ```
pub mod prelude {
    // Host - lifecycle entry point
    pub use plugbridge_runtime::{
        BoxError, BridgeConfig, ConfigLoader, Plugin, PluginContext, PluginError, PluginHost,
        async_trait,
    };

    // Data model and mapping
    pub use plugbridge_core::{
        AuditFields, Entity, EntityEnum, EntityMapper, Mapped, Record,
    };

    // Service side
    pub use plugbridge_core::{DataService, OperationTable, ServiceError, ServiceResult};

    // Consumer side
    pub use plugbridge_core::{Arg, Bridge, BridgeError, ServiceProxy};

    // Plugin descriptors and tenancy
    pub use plugbridge_core::{PluginInfo, PluginStatus, PluginType, TenantContext};
    pub use plugbridge_runtime::TaskTenant;
}
