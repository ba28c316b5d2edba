//! Command dispatch port.
//!
//! Implemented by the plugin supervisor and consumed by the HTTP layer and
//! by [`DeviceStateStore::await_refresh`](crate::state_store::DeviceStateStore::await_refresh),
//! which must issue a refresh command without owning the supervisor.

use async_trait::async_trait;

use hearth_domain::device::{CommandResult, DeviceCommand};
use hearth_domain::error::HubError;
use hearth_domain::id::DeviceId;

/// Routes a command to the plugin owning the target device.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// Dispatch `command` to the device's owning plugin.
    ///
    /// # Errors
    ///
    /// - [`HubError::NotFound`] — unknown device id
    /// - [`HubError::Unavailable`] — owning plugin is not `Running`
    /// - [`HubError::Command`] — the plugin reported a command failure
    async fn dispatch(
        &self,
        device_id: &DeviceId,
        command: DeviceCommand,
    ) -> Result<CommandResult, HubError>;
}
