//! Devices — info, state, records, and commands.
//!
//! A [`DeviceRecord`] is the hub's last-known view of one device: static
//! `info` set at discovery time plus the latest reported `state`. Records
//! are created on the first `discovery` event for a device id and updated
//! in place afterwards — re-discovery never creates a duplicate.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, PluginId};
use crate::time::{Timestamp, now};

/// Broad device classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Light,
    Switch,
    Camera,
    Sensor,
    MotionSensor,
    DoorSensor,
    Thermostat,
    Lock,
    Plug,
    #[default]
    Unknown,
}

/// A capability a device advertises at discovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCapability {
    OnOff,
    Brightness,
    Color,
    ColorTemperature,
    MotionDetection,
    Temperature,
    Humidity,
    Battery,
    Contact,
    EnergyMonitoring,
    PowerMonitoring,
}

/// Last-reported operational state of a device.
///
/// Only the fields a device actually reports are serialized; everything a
/// plugin reports beyond the typed fields lands in `custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Whether the device is reachable. A state report that does not
    /// mention reachability implies the device is online.
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    /// Brightness percentage (0–100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    /// Color temperature in Kelvin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<u16>,
    /// Temperature in °C.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Relative humidity percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
    /// Battery percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<bool>,
    /// Contact sensor: `true` = open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<bool>,
    /// Instantaneous power draw in watts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Cumulative energy in kWh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    /// Plugin-specific attributes outside the typed field set.
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

fn default_online() -> bool {
    true
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            online: true,
            on: None,
            brightness: None,
            color_temperature: None,
            temperature: None,
            humidity: None,
            battery: None,
            motion: None,
            contact: None,
            power: None,
            energy: None,
            custom: serde_json::Map::new(),
        }
    }
}

/// Static device information reported at discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub capabilities: Vec<DeviceCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    /// The plugin that owns this device; command dispatch routes through it.
    pub plugin_id: PluginId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl DeviceInfo {
    /// Minimal info for a device owned by `plugin_id`.
    #[must_use]
    pub fn new(id: DeviceId, name: impl Into<String>, plugin_id: PluginId) -> Self {
        Self {
            id,
            name: name.into(),
            device_type: DeviceType::Unknown,
            capabilities: Vec::new(),
            manufacturer: None,
            model: None,
            sw_version: None,
            plugin_id,
            room: None,
            tags: Vec::new(),
        }
    }

    /// Whether the device advertises `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: DeviceCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// The hub's last-known view of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub info: DeviceInfo,
    pub state: DeviceState,
    pub last_updated: Timestamp,
}

impl DeviceRecord {
    /// Create a record for a freshly discovered device.
    #[must_use]
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            state: DeviceState::default(),
            last_updated: now(),
        }
    }

    /// Replace the reported state and bump `last_updated`.
    pub fn update_state(&mut self, state: DeviceState) {
        self.state = state;
        self.last_updated = now();
    }

    /// Flip the online flag and bump `last_updated`.
    pub fn set_available(&mut self, available: bool) {
        self.state.online = available;
        self.last_updated = now();
    }

    /// Refresh `info` from a re-discovery, keeping the current state.
    pub fn refresh_info(&mut self, info: DeviceInfo) {
        self.info = info;
        self.last_updated = now();
    }
}

/// A command addressed to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    /// Command name (`turn_on`, `set_brightness`, …).
    pub command: String,
    /// Command parameters.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl DeviceCommand {
    /// A command without parameters.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: serde_json::Map::new(),
        }
    }
}

/// Outcome of a dispatched command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Device state after the command, when the plugin reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
}

impl CommandResult {
    /// A successful outcome with the resulting state.
    #[must_use]
    pub fn ok(message: impl Into<String>, state: Option<DeviceState>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            state,
        }
    }
}
