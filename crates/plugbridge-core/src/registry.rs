//! Service registry for data services and operation tables.
//!
//! Plugins register at start-up; consumers look services up at request time.
//! Both kinds of entries are keyed by `(plugin id, name)` with a secondary
//! index by name alone.
//!
//! # Lookup by name
//!
//! When several plugins provide the same entity (or operation service) name,
//! an unqualified lookup resolves to the provider that registered **first**.
//! Re-registering under an existing key replaces the service but keeps its
//! position. Removing the first provider promotes the next one. A lookup can
//! also be qualified as `"plugin/Entity"` to pick a provider explicitly.
//!
//! The registry is an ordinary value shared through an `Arc`; nothing here is
//! global. Entries are read under a read lock and returned as `Arc` clones, so
//! no lock is held while a service runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::proxy::{OperationTable, ServiceProxy};
use crate::service::DataService;

/// Separator of plugin-qualified lookup names.
pub const QUALIFIER: char = '/';

// =============================================================================
// Directory
// =============================================================================

/// `(plugin, name) → V` with per-name provider order and per-plugin listing.
struct Directory<V> {
    entries: HashMap<(String, String), V>,
    /// Providers of each name, in registration order.
    providers: HashMap<String, Vec<String>>,
    /// Names registered by each plugin, in registration order.
    by_plugin: HashMap<String, Vec<String>>,
}

impl<V> Default for Directory<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            providers: HashMap::new(),
            by_plugin: HashMap::new(),
        }
    }
}

impl<V> Directory<V> {
    fn insert(&mut self, plugin: &str, name: &str, value: V) -> Option<V> {
        let key = (plugin.to_string(), name.to_string());
        let previous = self.entries.insert(key, value);
        if previous.is_none() {
            self.providers
                .entry(name.to_string())
                .or_default()
                .push(plugin.to_string());
            self.by_plugin
                .entry(plugin.to_string())
                .or_default()
                .push(name.to_string());
        }
        previous
    }

    fn get(&self, plugin: &str, name: &str) -> Option<&V> {
        self.entries.get(&(plugin.to_string(), name.to_string()))
    }

    /// Resolves `name` or `plugin/name`.
    ///
    /// A registered name containing the qualifier matches as-is before the
    /// qualified split is tried.
    fn lookup(&self, name: &str) -> Option<&V> {
        if let Some(plugin) = self.providers.get(name).and_then(|p| p.first()) {
            return self.get(plugin, name);
        }
        let (plugin, name) = name.split_once(QUALIFIER)?;
        self.get(plugin, name)
    }

    fn remove(&mut self, plugin: &str, name: &str) -> Option<V> {
        let removed = self
            .entries
            .remove(&(plugin.to_string(), name.to_string()))?;
        if let Some(providers) = self.providers.get_mut(name) {
            providers.retain(|p| p != plugin);
            if providers.is_empty() {
                self.providers.remove(name);
            }
        }
        if let Some(names) = self.by_plugin.get_mut(plugin) {
            names.retain(|n| n != name);
            if names.is_empty() {
                self.by_plugin.remove(plugin);
            }
        }
        Some(removed)
    }

    fn remove_plugin(&mut self, plugin: &str) -> usize {
        let names = self.by_plugin.get(plugin).cloned().unwrap_or_default();
        names
            .iter()
            .filter(|name| self.remove(plugin, name).is_some())
            .count()
    }

    fn for_plugin(&self, plugin: &str) -> impl Iterator<Item = &V> {
        self.by_plugin
            .get(plugin)
            .into_iter()
            .flatten()
            .filter_map(move |name| self.get(plugin, name))
    }

    fn providers(&self, name: &str) -> &[String] {
        self.providers.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

// =============================================================================
// ServiceRegistry
// =============================================================================

#[derive(Default)]
struct Inner {
    services: Directory<Arc<dyn DataService>>,
    operations: Directory<Arc<OperationTable>>,
}

/// Directory of the data services and operation tables plugins expose.
#[derive(Default)]
pub struct ServiceRegistry {
    inner: RwLock<Inner>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Data services ───

    /// Registers `service` as `plugin_id`'s provider of `entity_name`.
    ///
    /// A second registration under the same key replaces the first.
    pub fn register(
        &self,
        plugin_id: &str,
        entity_name: &str,
        service: Arc<dyn DataService>,
    ) {
        if service.entity_name() != entity_name {
            debug!(
                plugin = plugin_id,
                entity = entity_name,
                service_entity = service.entity_name(),
                "Registering service under a different entity name"
            );
        }

        let mut inner = self.inner.write();
        let first = inner.services.providers(entity_name).first().cloned();
        let replaced = inner.services.insert(plugin_id, entity_name, service);

        if replaced.is_some() {
            info!(plugin = plugin_id, entity = entity_name, "Replaced data service");
        } else {
            info!(plugin = plugin_id, entity = entity_name, "Registered data service");
            if let Some(first) = first.filter(|p| p != plugin_id) {
                warn!(
                    plugin = plugin_id,
                    entity = entity_name,
                    resolves_to = %first,
                    "Entity already provided by another plugin"
                );
            }
        }
    }

    /// The service `plugin_id` registered for `entity_name`.
    pub fn get(&self, plugin_id: &str, entity_name: &str) -> Option<Arc<dyn DataService>> {
        self.inner.read().services.get(plugin_id, entity_name).cloned()
    }

    /// The service for an entity name, or a `plugin/Entity` qualified name.
    pub fn get_by_entity(&self, entity_name: &str) -> Option<Arc<dyn DataService>> {
        self.inner.read().services.lookup(entity_name).cloned()
    }

    /// Services registered by `plugin_id`, in registration order.
    pub fn list_for_plugin(&self, plugin_id: &str) -> Vec<Arc<dyn DataService>> {
        self.inner
            .read()
            .services
            .for_plugin(plugin_id)
            .cloned()
            .collect()
    }

    pub fn has_service(&self, entity_name: &str) -> bool {
        self.inner.read().services.lookup(entity_name).is_some()
    }

    pub fn has_plugin_service(&self, plugin_id: &str, entity_name: &str) -> bool {
        self.inner
            .read()
            .services
            .get(plugin_id, entity_name)
            .is_some()
    }

    /// Plugins providing `entity_name`, first-registered first.
    pub fn providers(&self, entity_name: &str) -> Vec<String> {
        self.inner.read().services.providers(entity_name).to_vec()
    }

    /// Removes one data service. Returns whether it existed.
    pub fn unregister(&self, plugin_id: &str, entity_name: &str) -> bool {
        let removed = self
            .inner
            .write()
            .services
            .remove(plugin_id, entity_name)
            .is_some();
        if removed {
            info!(plugin = plugin_id, entity = entity_name, "Unregistered data service");
        }
        removed
    }

    // ─── Operation tables ───

    /// Registers an operation table under its declared service name.
    pub fn register_operations(&self, plugin_id: &str, table: OperationTable) {
        let service = table.service_name().to_string();
        let count = table.len();
        let replaced = self
            .inner
            .write()
            .operations
            .insert(plugin_id, &service, Arc::new(table));
        info!(
            plugin = plugin_id,
            service = %service,
            operations = count,
            replaced = replaced.is_some(),
            "Registered operation table"
        );
    }

    /// Proxy over the table `plugin_id` registered as `service_name`.
    pub fn proxy(&self, plugin_id: &str, service_name: &str) -> Option<ServiceProxy> {
        let table = self
            .inner
            .read()
            .operations
            .get(plugin_id, service_name)
            .cloned()?;
        Some(ServiceProxy::new(table))
    }

    /// Proxy by service name alone (first registered wins) or
    /// `plugin/service`.
    pub fn proxy_by_name(&self, service_name: &str) -> Option<ServiceProxy> {
        let table = self.inner.read().operations.lookup(service_name).cloned()?;
        Some(ServiceProxy::new(table))
    }

    pub fn has_operations(&self, service_name: &str) -> bool {
        self.inner.read().operations.lookup(service_name).is_some()
    }

    // ─── Plugin-wide ───

    /// Removes everything `plugin_id` registered. Returns the entry count.
    pub fn unregister_plugin(&self, plugin_id: &str) -> usize {
        let mut inner = self.inner.write();
        let services = inner.services.remove_plugin(plugin_id);
        let tables = inner.operations.remove_plugin(plugin_id);
        drop(inner);

        if services + tables > 0 {
            info!(
                plugin = plugin_id,
                services, tables, "Removed plugin registrations"
            );
        }
        services + tables
    }

    /// Plugins with at least one registration, sorted.
    pub fn plugins(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut plugins: Vec<String> = inner
            .services
            .by_plugin
            .keys()
            .chain(inner.operations.by_plugin.keys())
            .cloned()
            .collect();
        plugins.sort();
        plugins.dedup();
        plugins
    }

    /// Entity names with at least one provider, sorted.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().services.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read();
        RegistryStats {
            plugins: {
                let mut plugins: Vec<&String> = inner
                    .services
                    .by_plugin
                    .keys()
                    .chain(inner.operations.by_plugin.keys())
                    .collect();
                plugins.sort();
                plugins.dedup();
                plugins.len()
            },
            services: inner.services.entries.len(),
            entities: inner.services.providers.len(),
            shared_entities: inner
                .services
                .providers
                .values()
                .filter(|p| p.len() > 1)
                .count(),
            operation_tables: inner.operations.entries.len(),
        }
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Statistics about the service registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Plugins with at least one registration.
    pub plugins: usize,
    /// Registered data services.
    pub services: usize,
    /// Distinct entity names.
    pub entities: usize,
    /// Entity names provided by more than one plugin.
    pub shared_entities: usize,
    /// Registered operation tables.
    pub operation_tables: usize,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Registry: {} plugins, {} services ({} entities, {} shared), {} operation tables",
            self.plugins, self.services, self.entities, self.shared_entities, self.operation_tables
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    struct Named {
        entity: &'static str,
        tag: &'static str,
    }

    impl DataService for Named {
        fn entity_name(&self) -> &str {
            self.entity
        }

        fn find_by_tenant(&self, _tenant_id: &str) -> Vec<Record> {
            vec![Record::new().with("source", self.tag)]
        }
    }

    fn service(entity: &'static str, tag: &'static str) -> Arc<dyn DataService> {
        Arc::new(Named { entity, tag })
    }

    fn source(service: &Arc<dyn DataService>) -> String {
        service.find_by_tenant("t")[0].text("source")
    }

    #[test]
    fn test_register_and_get() {
        let registry = ServiceRegistry::new();
        registry.register("clinical", "Diagnosis", service("Diagnosis", "a"));

        assert!(registry.has_service("Diagnosis"));
        assert!(registry.has_plugin_service("clinical", "Diagnosis"));
        assert!(!registry.has_plugin_service("billing", "Diagnosis"));
        assert!(!registry.has_service("diagnosis"));
        assert!(registry.get("clinical", "Diagnosis").is_some());
        assert!(registry.get_by_entity("Missing").is_none());
    }

    #[test]
    fn test_first_registered_wins_by_entity_name() {
        let registry = ServiceRegistry::new();
        registry.register("alpha", "Patient", service("Patient", "alpha"));
        registry.register("beta", "Patient", service("Patient", "beta"));

        let resolved = registry.get_by_entity("Patient").unwrap();
        assert_eq!(source(&resolved), "alpha");

        let qualified = registry.get_by_entity("beta/Patient").unwrap();
        assert_eq!(source(&qualified), "beta");
        assert_eq!(registry.providers("Patient"), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_entity_name_containing_qualifier_resolves() {
        let registry = ServiceRegistry::new();
        registry.register("lab", "Lab/Result", service("Lab/Result", "lab"));

        assert!(registry.has_service("Lab/Result"));
        assert_eq!(source(&registry.get_by_entity("Lab/Result").unwrap()), "lab");
        assert_eq!(source(&registry.get_by_entity("lab/Lab/Result").unwrap()), "lab");
        assert!(registry.get_by_entity("other/Lab/Result").is_none());
        assert!(!registry.has_service("Lab"));
    }

    #[test]
    fn test_reregistration_replaces_but_keeps_position() {
        let registry = ServiceRegistry::new();
        registry.register("alpha", "Patient", service("Patient", "alpha-1"));
        registry.register("beta", "Patient", service("Patient", "beta"));
        registry.register("alpha", "Patient", service("Patient", "alpha-2"));

        assert_eq!(source(&registry.get_by_entity("Patient").unwrap()), "alpha-2");
        assert_eq!(registry.stats().services, 2);
    }

    #[test]
    fn test_unregister_promotes_next_provider() {
        let registry = ServiceRegistry::new();
        registry.register("alpha", "Patient", service("Patient", "alpha"));
        registry.register("beta", "Patient", service("Patient", "beta"));

        assert!(registry.unregister("alpha", "Patient"));
        assert!(!registry.unregister("alpha", "Patient"));
        assert_eq!(source(&registry.get_by_entity("Patient").unwrap()), "beta");
    }

    #[test]
    fn test_list_and_unregister_plugin() {
        let registry = ServiceRegistry::new();
        registry.register("clinical", "Diagnosis", service("Diagnosis", "d"));
        registry.register("clinical", "Allergy", service("Allergy", "a"));
        registry.register("billing", "Invoice", service("Invoice", "i"));
        registry.register_operations(
            "clinical",
            OperationTable::builder("clinicalOps", Arc::new(())).build(),
        );

        let listed: Vec<String> = registry
            .list_for_plugin("clinical")
            .iter()
            .map(|s| s.entity_name().to_string())
            .collect();
        assert_eq!(listed, vec!["Diagnosis", "Allergy"]);
        assert_eq!(registry.plugins(), vec!["billing", "clinical"]);

        assert_eq!(registry.unregister_plugin("clinical"), 3);
        assert!(registry.list_for_plugin("clinical").is_empty());
        assert!(!registry.has_operations("clinicalOps"));
        assert_eq!(registry.entity_names(), vec!["Invoice"]);
        assert_eq!(registry.unregister_plugin("clinical"), 0);
    }

    #[test]
    fn test_operation_tables() {
        let registry = ServiceRegistry::new();
        registry.register_operations(
            "alpha",
            OperationTable::builder("stats", Arc::new(()))
                .operation("count", |_: &()| 1)
                .build(),
        );
        registry.register_operations(
            "beta",
            OperationTable::builder("stats", Arc::new(()))
                .operation("count", |_: &()| 2)
                .build(),
        );

        assert!(registry.has_operations("stats"));
        assert_eq!(registry.proxy_by_name("stats").unwrap().call_int("count", ()), 1);
        assert_eq!(registry.proxy("beta", "stats").unwrap().call_int("count", ()), 2);
        assert_eq!(
            registry.proxy_by_name("beta/stats").unwrap().call_int("count", ()),
            2
        );
        assert!(registry.proxy("gamma", "stats").is_none());
    }

    #[test]
    fn test_stats() {
        let registry = ServiceRegistry::new();
        registry.register("alpha", "Patient", service("Patient", "a"));
        registry.register("beta", "Patient", service("Patient", "b"));
        registry.register("beta", "Invoice", service("Invoice", "i"));

        let stats = registry.stats();
        assert_eq!(
            stats,
            RegistryStats {
                plugins: 2,
                services: 3,
                entities: 2,
                shared_entities: 1,
                operation_tables: 0,
            }
        );
        assert_eq!(
            stats.to_string(),
            "Registry: 2 plugins, 3 services (2 entities, 1 shared), 0 operation tables"
        );
    }

    #[test]
    fn test_concurrent_readers() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.register("alpha", "Patient", service("Patient", "a"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..100).all(|_| registry.get_by_entity("Patient").is_some())
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
