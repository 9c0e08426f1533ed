//! The plugin trait and the context handed to its lifecycle hooks.
//!
//! # Example
//!
//! ```rust,ignore
//! use plugbridge_runtime::{BoxError, Plugin, PluginContext};
//!
//! #[derive(serde::Deserialize, Default)]
//! #[serde(default)]
//! struct LabConfig { batch: usize }
//!
//! struct LabPlugin { info: PluginInfo }
//!
//! #[async_trait::async_trait]
//! impl Plugin for LabPlugin {
//!     fn info(&self) -> &PluginInfo {
//!         &self.info
//!     }
//!
//!     async fn on_start(&self, ctx: &PluginContext) -> Result<(), BoxError> {
//!         let config: LabConfig = ctx.config()?;
//!         ctx.register_service(Arc::new(LabResultService::new(config.batch)));
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use plugbridge_core::{
    Bridge, DataService, OperationTable, PluginInfo, ServiceRegistry, TenantContext,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::BoxError;

/// A unit of functionality the host starts and stops.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Static descriptor; `info().id` is the registry key for everything the
    /// plugin registers.
    fn info(&self) -> &PluginInfo;

    /// Registers services and operation tables. Runs after every dependency
    /// has started.
    async fn on_start(&self, ctx: &PluginContext) -> Result<(), BoxError>;

    /// Releases resources. Runs before any dependency stops.
    async fn on_stop(&self, _ctx: &PluginContext) -> Result<(), BoxError> {
        Ok(())
    }
}

// ─── PluginContext ────────────────────────────────────────────────────────────

/// Host services scoped to one plugin.
#[derive(Clone)]
pub struct PluginContext {
    plugin_id: String,
    registry: Arc<ServiceRegistry>,
    bridge: Bridge,
    tenant: Arc<dyn TenantContext>,
    /// This plugin's config section, or an empty object.
    config: Arc<Value>,
}

impl PluginContext {
    pub(crate) fn new(
        plugin_id: impl Into<String>,
        registry: Arc<ServiceRegistry>,
        bridge: Bridge,
        tenant: Arc<dyn TenantContext>,
        config: Arc<Value>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            registry,
            bridge,
            tenant,
            config,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Registers `service` under its own entity name.
    pub fn register_service(&self, service: Arc<dyn DataService>) {
        let entity_name = service.entity_name().to_string();
        self.registry
            .register(&self.plugin_id, &entity_name, service);
    }

    /// Registers `service` under an explicit entity name.
    pub fn register_service_as(&self, entity_name: &str, service: Arc<dyn DataService>) {
        self.registry.register(&self.plugin_id, entity_name, service);
    }

    pub fn register_operations(&self, table: OperationTable) {
        self.registry.register_operations(&self.plugin_id, table);
    }

    /// Deserializes the plugin's config section into `T`.
    ///
    /// Use `#[serde(default)]` on `T` to make every field optional.
    pub fn config<T>(&self) -> serde_json::Result<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(self.config.as_ref())
    }

    pub fn raw_config(&self) -> &Value {
        &self.config
    }

    pub fn tenant(&self) -> Arc<dyn TenantContext> {
        Arc::clone(&self.tenant)
    }

    /// Bridge for reaching entities served by other plugins.
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugbridge_core::{Record, StaticTenant};
    use serde::Deserialize;
    use serde_json::json;

    struct Labs;

    impl DataService for Labs {
        fn entity_name(&self) -> &str {
            "LabResult"
        }

        fn find_all(&self, _tenant_id: &str, _page: usize, _size: usize) -> Vec<Record> {
            vec![Record::new().with("test", "HbA1c")]
        }
    }

    fn context(config: Value) -> PluginContext {
        let registry = Arc::new(ServiceRegistry::new());
        PluginContext::new(
            "lab",
            Arc::clone(&registry),
            Bridge::new(registry),
            Arc::new(StaticTenant::new("facility-1")),
            Arc::new(config),
        )
    }

    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    struct LabConfig {
        batch: usize,
        label: String,
    }

    #[test]
    fn test_register_service_uses_plugin_id() {
        let ctx = context(json!({}));
        ctx.register_service(Arc::new(Labs));
        ctx.register_service_as("LabPanel", Arc::new(Labs));

        assert!(ctx.registry().has_plugin_service("lab", "LabResult"));
        assert!(ctx.registry().has_plugin_service("lab", "LabPanel"));
        assert_eq!(ctx.bridge().find("LabResult").paged("facility-1", 0, 10).len(), 1);
    }

    #[test]
    fn test_config_section() {
        let ctx = context(json!({ "batch": 25 }));
        let config: LabConfig = ctx.config().unwrap();
        assert_eq!(config.batch, 25);
        assert!(config.label.is_empty());

        let ctx = context(json!({ "batch": "many" }));
        assert!(ctx.config::<LabConfig>().is_err());
    }

    #[test]
    fn test_tenant() {
        let ctx = context(json!({}));
        assert_eq!(ctx.tenant().tenant_id().as_deref(), Some("facility-1"));
    }
}
