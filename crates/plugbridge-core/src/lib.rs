//! # plugbridge core
//!
//! Cross-plugin data access for in-process plugin hosts.
//!
//! Plugins live in isolated modules whose concrete types are not known to one
//! another. This crate defines the lingua franca they share:
//!
//! - **Data**: the [`Record`], an ordered map of scalar values.
//! - **Mapping**: [`EntityMapper`] converts native types to and from records
//!   through the field tables generated by `#[derive(Entity)]`.
//! - **Services**: a plugin exposes an entity by implementing [`DataService`]
//!   and registering it in the [`ServiceRegistry`].
//! - **Access**: consumers go through the [`Bridge`], which turns absence into
//!   empty results.
//! - **Invocation**: anything beyond CRUD is exposed as an
//!   [`OperationTable`] and called through a [`ServiceProxy`].
//!
//! ```text
//! ┌──────────────┐ register ┌─────────────────┐  lookup  ┌──────────────┐
//! │ Plugin A     │─────────▶│ ServiceRegistry │◀─────────│ Bridge       │◀── Plugin B
//! │ DataService  │          │ (plugin, name)  │          │ ServiceProxy │
//! └──────────────┘          └─────────────────┘          └──────────────┘
//! ```
//!
//! Nothing in this crate blocks or performs I/O; blocking happens only inside
//! plugin-supplied services.

// Lets the derive macros' `::plugbridge_core` paths resolve inside this crate.
extern crate self as plugbridge_core;

pub mod bridge;
pub mod error;
pub mod mapper;
pub mod plugin;
pub mod proxy;
pub mod record;
pub mod registry;
pub mod service;
pub mod tenant;

pub use bridge::{Bridge, DeleteBuilder, FieldValue, FindBuilder, SaveBuilder};
pub use error::{
    BridgeError, BridgeResult, ConversionError, MappingError, MappingResult, ProxyError,
    ProxyResult, ServiceError, ServiceResult, TenantError,
};
pub use mapper::{
    AuditFields, Entity, EntityMapper, FieldCodec, FieldDescriptor, FieldIssue, FieldKind, Mapped,
    Referenced,
};
pub use plugin::{PluginInfo, PluginStatus, PluginType};
pub use proxy::{Arg, ArgType, FromArg, IntoArgs, IntoReply, OperationTable, Param, ServiceProxy};
pub use record::Record;
pub use registry::{RegistryStats, ServiceRegistry};
pub use service::DataService;
pub use tenant::{ChainedTenant, ScopedTenant, StaticTenant, TenantContext, TenantGuard};

pub use plugbridge_macros::{Entity, EntityEnum};

// Re-exported for generated code.
#[doc(hidden)]
pub use serde_json;
#[doc(hidden)]
pub use uuid;
