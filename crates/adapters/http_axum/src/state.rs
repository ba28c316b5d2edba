//! Shared application state for axum handlers.

use std::sync::Arc;

use hearth_app::state_store::DeviceStateStore;
use hearth_app::stream_bridge::StreamBridge;
use hearth_app::supervisor::PluginSupervisor;

/// Application state shared across all axum handlers.
///
/// Everything is behind an `Arc`, so cloning the state per request is
/// cheap and the same instances can be shared with background tasks.
#[derive(Clone)]
pub struct AppState {
    /// Plugin lifecycle owner and command dispatcher.
    pub supervisor: Arc<PluginSupervisor>,
    /// Last-known device state.
    pub store: Arc<DeviceStateStore>,
    /// Fan-out point for streaming sessions.
    pub bridge: Arc<StreamBridge>,
}

impl AppState {
    #[must_use]
    pub fn new(
        supervisor: Arc<PluginSupervisor>,
        store: Arc<DeviceStateStore>,
        bridge: Arc<StreamBridge>,
    ) -> Self {
        Self {
            supervisor,
            store,
            bridge,
        }
    }
}
