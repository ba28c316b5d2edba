//! Events — the only currency exchanged between hub components.
//!
//! An event is immutable once published. Derived state (the device-state
//! store) is mutated exclusively by consuming events, never by direct
//! writes.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, PluginId};
use crate::routing::RoutingKey;
use crate::time::{Timestamp, now};

/// Classification of an event, as exposed on the streaming wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Device state update.
    State,
    /// A newly discovered device.
    Discovery,
    /// Device availability change.
    Available,
    /// Device or plugin error report.
    Error,
    /// Hub-level event (start, stop, plugin status).
    System,
    /// Liveness signal on a streaming session; carries no business data.
    Heartbeat,
    /// Command addressed to a device. Internal — commands are requests, not
    /// observations, and are not forwarded to streaming sessions.
    Command,
}

impl EventType {
    /// Wire name of the event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Discovery => "discovery",
            Self::Available => "available",
            Self::Error => "error",
            Self::System => "system",
            Self::Heartbeat => "heartbeat",
            Self::Command => "command",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of something that happened on the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Subject of the event.
    pub routing_key: RoutingKey,
    /// Classification.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// When the event was created.
    pub timestamp: Timestamp,
    /// The device concerned, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Event-type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(
        routing_key: RoutingKey,
        event_type: EventType,
        device_id: Option<DeviceId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            routing_key,
            event_type,
            timestamp: now(),
            device_id,
            payload,
        }
    }

    /// A `device.{id}.state` event carrying the device's full state.
    #[must_use]
    pub fn device_state(device_id: DeviceId, state: serde_json::Value) -> Self {
        Self::new(
            RoutingKey::device_state(&device_id),
            EventType::State,
            Some(device_id),
            state,
        )
    }

    /// A `device.{id}.command` event requesting a command execution.
    #[must_use]
    pub fn device_command(device_id: DeviceId, command: &str, params: serde_json::Value) -> Self {
        Self::new(
            RoutingKey::device_command(&device_id),
            EventType::Command,
            Some(device_id),
            serde_json::json!({ "command": command, "params": params }),
        )
    }

    /// A `device.{id}.available` event flipping the device's online flag.
    #[must_use]
    pub fn device_available(device_id: DeviceId, available: bool) -> Self {
        Self::new(
            RoutingKey::device_available(&device_id),
            EventType::Available,
            Some(device_id),
            serde_json::json!({ "available": available }),
        )
    }

    /// A `device.discovery.{id}` event announcing a newly discovered device.
    #[must_use]
    pub fn device_discovery(device_id: DeviceId, payload: serde_json::Value) -> Self {
        Self::new(
            RoutingKey::device_discovery(&device_id),
            EventType::Discovery,
            Some(device_id),
            payload,
        )
    }

    /// A `device.{id}.error` event reporting a device-level failure.
    #[must_use]
    pub fn device_error(device_id: DeviceId, message: &str) -> Self {
        Self::new(
            RoutingKey::device_error(&device_id),
            EventType::Error,
            Some(device_id),
            serde_json::json!({ "error": message }),
        )
    }

    /// A `plugin.{id}.status` event recording a lifecycle transition.
    #[must_use]
    pub fn plugin_status(plugin_id: &PluginId, status: &str, details: serde_json::Value) -> Self {
        Self::new(
            RoutingKey::plugin_status(plugin_id),
            EventType::System,
            None,
            serde_json::json!({ "plugin_id": plugin_id, "status": status, "details": details }),
        )
    }

    /// A `system.{event_type}` event.
    #[must_use]
    pub fn system(event_type: &str, data: serde_json::Value) -> Self {
        Self::new(RoutingKey::system(event_type), EventType::System, None, data)
    }

    /// A synthetic heartbeat. Exists purely to prove liveness of a
    /// streaming connection; never published on the bus.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(
            RoutingKey::system("heartbeat"),
            EventType::Heartbeat,
            None,
            serde_json::json!({}),
        )
    }
}
