//! Plugin descriptor metadata and lifecycle status.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── PluginType ───────────────────────────────────────────────────────────────

/// Functional role a plugin plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginType {
    /// Core domain plugin other plugins build on.
    Base,
    /// Exposes services to other plugins.
    #[default]
    Service,
    Utility,
    /// Bridges to an external system.
    Integration,
    Analytics,
    Security,
}

// ─── PluginInfo ───────────────────────────────────────────────────────────────

/// Static descriptor of a plugin.
///
/// `dependencies` lists the ids of plugins that must be active before this
/// one starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub plugin_type: PluginType,
}

impl PluginInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            dependencies: Vec::new(),
            plugin_type: PluginType::default(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Adds a dependency on another plugin id.
    pub fn depends_on(mut self, plugin_id: impl Into<String>) -> Self {
        self.dependencies.push(plugin_id.into());
        self
    }

    pub fn plugin_type(mut self, plugin_type: PluginType) -> Self {
        self.plugin_type = plugin_type;
        self
    }

    pub fn is_base(&self) -> bool {
        self.plugin_type == PluginType::Base
    }

    pub fn is_service(&self) -> bool {
        self.plugin_type == PluginType::Service
    }
}

impl fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} v{})", self.id, self.name, self.version)
    }
}

// ─── PluginStatus ─────────────────────────────────────────────────────────────

/// Lifecycle state of a plugin inside a host.
///
/// ```text
/// register ──► Installed ──► Starting ──► Active ──► Stopping ──► Stopped
///                  │              └──► Failed
///                  └──► MissingDependencies
/// ```
///
/// `Stopped`, `Failed` and `MissingDependencies` plugins are attempted again
/// by the next start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginStatus {
    Installed,
    Starting,
    Active,
    Stopping,
    Stopped,
    /// The start hook returned an error.
    Failed,
    /// A declared dependency is not registered or not active.
    MissingDependencies,
}

impl PluginStatus {
    pub fn is_running(self) -> bool {
        self == PluginStatus::Active
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            PluginStatus::Failed | PluginStatus::MissingDependencies
        )
    }

    /// Whether a start may be attempted. A failed plugin can be retried.
    pub fn can_start(self) -> bool {
        matches!(
            self,
            PluginStatus::Installed | PluginStatus::Stopped | PluginStatus::Failed
        )
    }

    pub fn can_stop(self) -> bool {
        self == PluginStatus::Active
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginStatus::Installed => "installed",
            PluginStatus::Starting => "starting",
            PluginStatus::Active => "active",
            PluginStatus::Stopping => "stopping",
            PluginStatus::Stopped => "stopped",
            PluginStatus::Failed => "failed",
            PluginStatus::MissingDependencies => "missing dependencies",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(PluginStatus::Active.is_running());
        assert!(PluginStatus::Active.can_stop());
        assert!(PluginStatus::Installed.can_start());
        assert!(PluginStatus::Stopped.can_start());
        assert!(PluginStatus::Failed.can_start());
        assert!(!PluginStatus::Active.can_start());
        assert!(!PluginStatus::Starting.can_start());
        assert!(PluginStatus::MissingDependencies.is_error());
        assert!(!PluginStatus::Stopping.is_error());
    }

    #[test]
    fn test_info_builder_and_serde() {
        let info = PluginInfo::new("clinical", "Clinical Records", "1.2.0")
            .author("Health Team")
            .depends_on("patient")
            .plugin_type(PluginType::Base);
        assert!(info.is_base());
        assert_eq!(info.to_string(), "clinical (Clinical Records v1.2.0)");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["plugin_type"], "BASE");

        let parsed: PluginInfo =
            serde_json::from_str(r#"{"id":"x","name":"X","version":"0.1.0"}"#).unwrap();
        assert!(parsed.is_service());
        assert!(parsed.dependencies.is_empty());
    }
}
