//! Plugin descriptors and the lifecycle state machine.
//!
//! A plugin is an independently supervised unit implementing device,
//! automation, or service behaviour. Its lifecycle is
//! `Registered → Initializing → Running → Stopping → Stopped`, with
//! `Failed` reachable from any active state. `Failed` is terminal until an
//! explicit reload.

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;
use crate::id::PluginId;

/// What kind of behaviour a plugin implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Bridges physical or virtual devices into the hub.
    Device,
    /// Reacts to events with rule-driven behaviour.
    Automation,
    /// Provides a hub-level service (logging, notifications, …).
    Service,
}

/// Lifecycle state of a supervised plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Registered,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl PluginState {
    /// Whether the plugin can serve commands and discovery.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether a reload is permitted from this state.
    #[must_use]
    pub fn can_reload(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }

    /// Wire name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration-supplied description of one plugin instance.
///
/// Unrecognized keys in the source document are ignored; missing required
/// keys fail registration before any lifecycle hook runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin id.
    pub id: PluginId,
    /// Behaviour kind.
    pub kind: PluginKind,
    /// Disabled plugins are skipped at registration.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Reference to the implementing module (e.g. `"virtual"`).
    pub module: String,
    /// Plugin-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

impl PluginDescriptor {
    /// A minimal enabled descriptor.
    #[must_use]
    pub fn new(id: impl Into<PluginId>, kind: PluginKind, module: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: true,
            module: module.into(),
            config: serde_json::Value::Null,
        }
    }

    /// Validate the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when `id` or `module` is empty.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.id.as_str().is_empty() {
            return Err(DescriptorError::MissingId);
        }
        if self.module.is_empty() {
            return Err(DescriptorError::MissingModule {
                id: self.id.to_string(),
            });
        }
        Ok(())
    }
}
