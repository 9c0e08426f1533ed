//! Plugin lifecycle management.
//!
//! [`PluginHost`] owns every registered plugin together with the shared
//! [`ServiceRegistry`] they publish into. It:
//!
//! - Accepts [`Plugin`]s with an initial status of [`PluginStatus::Installed`].
//! - Starts them in dependency order via [`start_all`](PluginHost::start_all):
//!   plugins in the same dependency layer start concurrently, and a plugin
//!   only starts once every plugin it depends on is active.
//! - Stops them in reverse order via [`stop_all`](PluginHost::stop_all) and,
//!   unless disabled, purges their services and operation tables from the
//!   registry.
//!
//! # Example
//!
//! ```rust,ignore
//! use plugbridge_runtime::{PluginHost, config::load_config};
//!
//! let config = load_config()?;
//! let host = PluginHost::from_config(&config);
//! host.register(PatientPlugin::new()).await?;
//! host.register(ClinicalPlugin::new()).await?;
//!
//! for err in host.start_all().await {
//!     tracing::error!("{err}");
//! }
//! let diagnoses = host.bridge().find("Diagnosis").by_owner(patient_id);
//! // …later…
//! host.stop_all().await;
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future;
use plugbridge_core::bridge::DEFAULT_MAX_PAGE_SIZE;
use plugbridge_core::{
    Bridge, ChainedTenant, PluginInfo, PluginStatus, ScopedTenant, ServiceProxy, ServiceRegistry,
    TenantContext,
};
use serde_json::{Map, Value};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::BridgeConfig;
use crate::error::{BoxError, PluginError, PluginErrorCode, PluginResult};
use crate::plugin::{Plugin, PluginContext};
use crate::tenant::TaskTenant;

// =============================================================================
// Topological sort utility
// =============================================================================

/// Computes the start order as **layers** via Kahn's algorithm.
///
/// Each inner `Vec<usize>` holds indices of plugins that may start
/// concurrently. Stop order is the reversed list of layers.
///
/// An edge **A → B** means "A starts before B" and exists when B lists A's id
/// among its dependencies. Dependencies on unregistered ids add no edge; the
/// status check in [`PluginHost::start_all`] catches them.
///
/// # Errors
///
/// Returns `Err(description)` when a dependency cycle is detected.
fn topological_layers(infos: &[&PluginInfo]) -> Result<Vec<Vec<usize>>, String> {
    let n = infos.len();

    let index_of: HashMap<&str, usize> = infos
        .iter()
        .enumerate()
        .map(|(i, info)| (info.id.as_str(), i))
        .collect();

    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, info) in infos.iter().enumerate() {
        for dep_id in &info.dependencies {
            match index_of.get(dep_id.as_str()) {
                Some(&provider) if provider != i => {
                    dependents[provider].push(i);
                    in_degree[i] += 1;
                }
                Some(_) => {
                    warn!(plugin = %info.id, "Plugin depends on itself, ignored");
                }
                None => {}
            }
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut processed = 0;

    while !current.is_empty() {
        processed += current.len();
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        layers.push(current);
        current = next;
    }

    if processed != n {
        let cycle_nodes: Vec<&str> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| infos[i].id.as_str())
            .collect();
        return Err(format!(
            "Plugin dependency cycle detected among: {}",
            cycle_nodes.join(", ")
        ));
    }

    Ok(layers)
}

// =============================================================================
// PluginEntry (internal)
// =============================================================================

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    status: PluginStatus,
    /// Set when the plugin is first started; reused by its stop hook.
    context: Option<PluginContext>,
}

impl PluginEntry {
    fn id(&self) -> &str {
        &self.plugin.info().id
    }
}

// =============================================================================
// PluginHost
// =============================================================================

/// Central owner of plugins and the registry they share.
pub struct PluginHost {
    plugins: AsyncRwLock<Vec<PluginEntry>>,
    registry: Arc<ServiceRegistry>,
    bridge: Bridge,
    tenant: Arc<dyn TenantContext>,
    /// Per-plugin config sections, keyed by plugin id.
    plugin_configs: HashMap<String, Value>,
    purge_on_stop: bool,
    max_page_size: usize,
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginHost {
    /// Creates a host with an empty registry and registry purging on stop.
    ///
    /// The tenant comes from [`TaskTenant`] scopes, falling back to
    /// [`ScopedTenant`] for synchronous callers.
    pub fn new() -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        Self {
            plugins: AsyncRwLock::new(Vec::new()),
            bridge: Bridge::new(Arc::clone(&registry)),
            registry,
            tenant: Arc::new(ChainedTenant::new(
                Arc::new(TaskTenant),
                Arc::new(ScopedTenant),
            )),
            plugin_configs: HashMap::new(),
            purge_on_stop: true,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Creates a host from loaded configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let mut host = Self::new();
        host.purge_on_stop = config.registry.purge_on_stop;
        host.max_page_size = config.bridge.max_page_size;
        host.bridge = Bridge::new(Arc::clone(&host.registry)).with_max_page_size(host.max_page_size);
        host.plugin_configs = config.plugins.clone();
        host
    }

    /// Uses an existing registry, e.g. one shared with another host.
    pub fn with_registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.bridge = Bridge::new(Arc::clone(&registry)).with_max_page_size(self.max_page_size);
        self.registry = registry;
        self
    }

    pub fn with_tenant(mut self, tenant: Arc<dyn TenantContext>) -> Self {
        self.tenant = tenant;
        self
    }

    /// Sets the config section handed to `plugin_id`.
    pub fn with_plugin_config(mut self, plugin_id: impl Into<String>, config: Value) -> Self {
        self.plugin_configs.insert(plugin_id.into(), config);
        self
    }

    pub fn purge_on_stop(mut self, enabled: bool) -> Self {
        self.purge_on_stop = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    fn context_for(&self, plugin_id: &str) -> PluginContext {
        let config = self
            .plugin_configs
            .get(plugin_id)
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::default()));
        PluginContext::new(
            plugin_id,
            Arc::clone(&self.registry),
            self.bridge.clone(),
            Arc::clone(&self.tenant),
            Arc::new(config),
        )
    }

    // ─── Plugin registration ─────────────────────────────────────────────────

    /// Registers a plugin with status [`PluginStatus::Installed`].
    ///
    /// It is not started until [`start_all`](Self::start_all) is called.
    pub async fn register<P: Plugin>(&self, plugin: P) -> PluginResult<()> {
        self.register_shared(Arc::new(plugin)).await
    }

    /// Registers an already shared plugin.
    pub async fn register_shared(&self, plugin: Arc<dyn Plugin>) -> PluginResult<()> {
        let info = plugin.info();
        let mut plugins = self.plugins.write().await;
        if plugins.iter().any(|e| e.id() == info.id) {
            warn!(plugin = %info.id, "Plugin already registered");
            return Err(PluginError::already_installed(&info.id));
        }
        info!(
            plugin = %info.id,
            version = %info.version,
            plugin_type = ?info.plugin_type,
            "Plugin registered"
        );
        plugins.push(PluginEntry {
            plugin: Arc::clone(&plugin),
            status: PluginStatus::Installed,
            context: None,
        });
        Ok(())
    }

    /// Number of registered plugins, in any status.
    pub async fn plugin_count(&self) -> usize {
        self.plugins.read().await.len()
    }

    /// Descriptors of all registered plugins in registration order.
    pub async fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .read()
            .await
            .iter()
            .map(|e| e.plugin.info().clone())
            .collect()
    }

    pub async fn status(&self, plugin_id: &str) -> Option<PluginStatus> {
        self.plugins
            .read()
            .await
            .iter()
            .find(|e| e.id() == plugin_id)
            .map(|e| e.status)
    }

    /// Whether `plugin_id` is registered and active.
    pub async fn is_plugin_available(&self, plugin_id: &str) -> bool {
        self.status(plugin_id)
            .await
            .is_some_and(PluginStatus::is_running)
    }

    /// Proxy over an operation table registered by an active plugin.
    pub async fn service_proxy(&self, plugin_id: &str, service_name: &str) -> Option<ServiceProxy> {
        if !self.is_plugin_available(plugin_id).await {
            debug!(
                plugin = plugin_id,
                service = service_name,
                "Plugin not available for service proxy"
            );
            return None;
        }
        self.registry.proxy(plugin_id, service_name)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Starts every startable plugin in dependency order.
    ///
    /// Plugins previously marked [`PluginStatus::MissingDependencies`] or
    /// [`PluginStatus::Failed`] are retried, so registering a missing
    /// dependency or clearing a start failure and calling this again completes
    /// the set. Returns one error per plugin that did not start.
    pub async fn start_all(&self) -> Vec<PluginError> {
        let layers = {
            let list = self.plugins.read().await;
            let infos: Vec<&PluginInfo> = list.iter().map(|e| e.plugin.info()).collect();
            match topological_layers(&infos) {
                Ok(l) => l,
                Err(e) => {
                    error!("{e}");
                    (0..list.len()).map(|i| vec![i]).collect()
                }
            }
        };

        let mut errors = Vec::new();

        for layer in layers {
            // ── 1. Classify: skip non-startable, check dependencies ──────────
            let mut to_start: Vec<(usize, Arc<dyn Plugin>, PluginContext)> = Vec::new();
            {
                let mut list = self.plugins.write().await;
                for &i in &layer {
                    let status = list[i].status;
                    if !status.can_start() && status != PluginStatus::MissingDependencies {
                        continue;
                    }
                    let plugin = Arc::clone(&list[i].plugin);
                    let info = plugin.info();

                    let missing: Vec<String> = info
                        .dependencies
                        .iter()
                        .filter(|dep| {
                            !list
                                .iter()
                                .any(|e| e.id() == dep.as_str() && e.status.is_running())
                        })
                        .cloned()
                        .collect();
                    if !missing.is_empty() {
                        error!(
                            plugin = %info.id,
                            missing = ?missing,
                            "Plugin dependencies not satisfied, plugin will not be started"
                        );
                        list[i].status = PluginStatus::MissingDependencies;
                        errors.push(PluginError::missing_dependencies(&info.id, &missing));
                        continue;
                    }

                    let ctx = self.context_for(&info.id);
                    list[i].status = PluginStatus::Starting;
                    list[i].context = Some(ctx.clone());
                    to_start.push((i, plugin, ctx));
                }
            }

            if to_start.is_empty() {
                continue;
            }

            // ── 2. Run on_start hooks across the layer concurrently ──────────
            let results = future::join_all(to_start.iter().map(|(_, plugin, ctx)| {
                let span = info_span!("plugin_start", plugin = %plugin.info().id);
                run_hook(plugin.on_start(ctx)).instrument(span)
            }))
            .await;

            // ── 3. Record outcomes ───────────────────────────────────────────
            let mut list = self.plugins.write().await;
            for ((i, plugin, _), result) in to_start.iter().zip(results) {
                let info = plugin.info();
                match result {
                    Ok(()) => {
                        list[*i].status = PluginStatus::Active;
                        info!(plugin = %info.id, version = %info.version, "Plugin started");
                    }
                    Err(e) => {
                        // Drop whatever the plugin managed to register before failing.
                        let removed = self.registry.unregister_plugin(&info.id);
                        error!(plugin = %info.id, error = %e, removed, "Plugin failed to start");
                        list[*i].status = PluginStatus::Failed;
                        let message = e.to_string();
                        errors.push(
                            PluginError::new(&info.id, PluginErrorCode::StartFailed, message)
                                .with_source(e),
                        );
                    }
                }
            }
        }

        errors
    }

    /// Stops all active plugins in reverse dependency order.
    ///
    /// A plugin whose stop hook fails is still marked stopped; the failure is
    /// returned.
    pub async fn stop_all(&self) -> Vec<PluginError> {
        let layers = {
            let list = self.plugins.read().await;
            let infos: Vec<&PluginInfo> = list.iter().map(|e| e.plugin.info()).collect();
            let mut layers = match topological_layers(&infos) {
                Ok(l) => l,
                Err(_) => (0..list.len()).map(|i| vec![i]).collect(),
            };
            layers.reverse();
            layers
        };

        let mut errors = Vec::new();

        for layer in layers {
            let to_stop: Vec<(usize, Arc<dyn Plugin>, PluginContext)> = {
                let mut list = self.plugins.write().await;
                let mut to_stop = Vec::new();
                for &i in &layer {
                    if !list[i].status.can_stop() {
                        continue;
                    }
                    let plugin = Arc::clone(&list[i].plugin);
                    let ctx = match &list[i].context {
                        Some(ctx) => ctx.clone(),
                        None => self.context_for(&plugin.info().id),
                    };
                    list[i].status = PluginStatus::Stopping;
                    to_stop.push((i, plugin, ctx));
                }
                to_stop
            };

            if to_stop.is_empty() {
                continue;
            }

            let results = future::join_all(to_stop.iter().map(|(_, plugin, ctx)| {
                let span = info_span!("plugin_stop", plugin = %plugin.info().id);
                run_hook(plugin.on_stop(ctx)).instrument(span)
            }))
            .await;

            let mut list = self.plugins.write().await;
            for ((i, plugin, _), result) in to_stop.iter().zip(results) {
                let id = &plugin.info().id;
                if let Err(e) = result {
                    warn!(plugin = %id, error = %e, "Plugin stop hook failed");
                    let message = e.to_string();
                    errors.push(
                        PluginError::new(id, PluginErrorCode::StopFailed, message).with_source(e),
                    );
                }
                if self.purge_on_stop {
                    let removed = self.registry.unregister_plugin(id);
                    debug!(plugin = %id, removed, "Purged plugin registrations");
                }
                list[*i].status = PluginStatus::Stopped;
                info!(plugin = %id, "Plugin stopped");
            }
        }

        errors
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("registry", &self.registry)
            .field("purge_on_stop", &self.purge_on_stop)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

/// Awaits a lifecycle hook, turning a panic into an error.
async fn run_hook<F>(hook: F) -> Result<(), BoxError>
where
    F: Future<Output = Result<(), BoxError>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("panicked: {message}").into())
        }
    }
}
