//! Plugin port — the capability interface every plugin implements.
//!
//! The supervisor depends only on this trait, never on concrete plugin
//! types. Lifecycle hooks are invoked in order (`initialize`, `start`,
//! `stop`) and are serialized per plugin instance; `discover` and
//! `execute_command` are optional capabilities with non-device defaults.

use async_trait::async_trait;

use hearth_domain::device::{CommandResult, DeviceCommand, DeviceInfo};
use hearth_domain::error::{CommandError, HubError};
use hearth_domain::id::DeviceId;
use hearth_domain::plugin::PluginDescriptor;

/// A supervised unit implementing device, automation, or service behaviour.
///
/// Hooks return errors instead of panicking; the supervisor captures any
/// error, logs it, and transitions the plugin to `Failed` without affecting
/// other plugins.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Load configuration and set up internal state. Do not connect to
    /// devices yet.
    async fn initialize(&mut self) -> Result<(), HubError>;

    /// Connect to devices, subscribe to topics, start background work.
    async fn start(&mut self) -> Result<(), HubError>;

    /// Disconnect and release resources. Called with a bounded timeout;
    /// cleanup is best-effort.
    async fn stop(&mut self) -> Result<(), HubError>;

    /// Report currently known devices. Device-kind plugins override this;
    /// the default reports none.
    async fn discover(&mut self) -> Result<Vec<DeviceInfo>, HubError> {
        Ok(Vec::new())
    }

    /// Execute a command against a device this plugin owns.
    ///
    /// # Errors
    ///
    /// The default rejects every command — only device-kind plugins serve
    /// them.
    async fn execute_command(
        &self,
        device_id: &DeviceId,
        command: &DeviceCommand,
    ) -> Result<CommandResult, HubError> {
        Err(CommandError {
            device_id: device_id.to_string(),
            command: command.command.clone(),
            message: "plugin does not execute commands".to_string(),
        }
        .into())
    }

    /// Health and metrics snapshot for monitoring.
    async fn health_check(&self) -> serde_json::Value {
        serde_json::json!({ "healthy": true })
    }
}

/// Builds plugin instances from descriptors.
///
/// The composition root provides the concrete factory; the supervisor uses
/// it on registration and reload so a reloaded plugin picks up its new
/// configuration.
#[async_trait]
pub trait PluginFactory: Send + Sync {
    /// Build the plugin the descriptor's `module` refers to.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the module reference is unknown.
    async fn build(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn Plugin>, HubError>;
}
