//! # hearth-adapter-virtual
//!
//! Virtual/demo plugin that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Id | Behaviour |
//! |--------|----|-----------|
//! | Virtual Light | `{plugin}_light` | `turn_on` / `turn_off` / `toggle` / `set_brightness` |
//! | Virtual Switch | `{plugin}_switch` | `turn_on` / `turn_off` / `toggle`, simulated power draw |
//! | Virtual Sensor | `{plugin}_sensor` | read-only temperature/humidity/battery |
//!
//! Every executed command publishes the resulting state as a
//! `device.{id}.state` event, so the state store converges without polling.
//!
//! ## Dependency rule
//!
//! Depends on `hearth-app` (port traits) and `hearth-domain` only.

mod devices;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use hearth_app::ports::{EventPublisher, Plugin};
use hearth_domain::device::{CommandResult, DeviceCommand, DeviceInfo};
use hearth_domain::error::{HubError, NotFoundError, PluginLifecycleError};
use hearth_domain::id::{DeviceId, PluginId};

use devices::{VirtualDevice, VirtualLight, VirtualSensor, VirtualSwitch};

/// Plugin-specific configuration, taken from the descriptor's `config`.
#[derive(Deserialize)]
struct VirtualConfig {
    /// Which simulated devices to create.
    #[serde(default = "default_devices")]
    devices: Vec<String>,
}

fn default_devices() -> Vec<String> {
    vec![
        "light".to_string(),
        "switch".to_string(),
        "sensor".to_string(),
    ]
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
        }
    }
}

/// Device plugin backed by simulated hardware.
pub struct VirtualPlugin {
    plugin_id: PluginId,
    config: serde_json::Value,
    publisher: Arc<dyn EventPublisher>,
    devices: HashMap<DeviceId, VirtualDevice>,
}

impl VirtualPlugin {
    #[must_use]
    pub fn new(
        plugin_id: PluginId,
        config: serde_json::Value,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            plugin_id,
            config,
            publisher,
            devices: HashMap::new(),
        }
    }

    fn build_device(&self, kind: &str) -> Option<VirtualDevice> {
        let id = DeviceId::new(format!("{}_{kind}", self.plugin_id));
        match kind {
            "light" => Some(VirtualDevice::Light(VirtualLight::new(
                id,
                self.plugin_id.clone(),
            ))),
            "switch" => Some(VirtualDevice::Switch(VirtualSwitch::new(
                id,
                self.plugin_id.clone(),
            ))),
            "sensor" => Some(VirtualDevice::Sensor(VirtualSensor::new(
                id,
                self.plugin_id.clone(),
            ))),
            _ => None,
        }
    }

    async fn publish_availability(&self, available: bool) {
        for id in self.devices.keys() {
            if let Err(err) = self
                .publisher
                .publish_device_available(id.clone(), available)
                .await
            {
                tracing::warn!(device = %id, %err, "failed to publish availability");
            }
        }
    }
}

#[async_trait]
impl Plugin for VirtualPlugin {
    async fn initialize(&mut self) -> Result<(), HubError> {
        let config = if self.config.is_null() {
            VirtualConfig::default()
        } else {
            serde_json::from_value(self.config.clone()).map_err(|err| PluginLifecycleError {
                plugin_id: self.plugin_id.to_string(),
                hook: "initialize",
                message: format!("invalid config: {err}"),
            })?
        };
        for kind in &config.devices {
            let Some(device) = self.build_device(kind) else {
                return Err(PluginLifecycleError {
                    plugin_id: self.plugin_id.to_string(),
                    hook: "initialize",
                    message: format!("unknown virtual device kind {kind:?}"),
                }
                .into());
            };
            self.devices.insert(device.id().clone(), device);
        }
        tracing::debug!(plugin = %self.plugin_id, devices = self.devices.len(), "initialized");
        Ok(())
    }

    async fn start(&mut self) -> Result<(), HubError> {
        self.publish_availability(true).await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), HubError> {
        self.publish_availability(false).await;
        Ok(())
    }

    async fn discover(&mut self) -> Result<Vec<DeviceInfo>, HubError> {
        Ok(self.devices.values().map(VirtualDevice::info).collect())
    }

    async fn execute_command(
        &self,
        device_id: &DeviceId,
        command: &DeviceCommand,
    ) -> Result<CommandResult, HubError> {
        let device = self.devices.get(device_id).ok_or(NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        })?;
        let result = device.execute(command)?;
        if let Some(state) = &result.state {
            match serde_json::to_value(state) {
                Ok(json) => {
                    self.publisher
                        .publish_device_state(device_id.clone(), json)
                        .await?;
                }
                Err(err) => {
                    tracing::warn!(device = %device_id, %err, "failed to serialize state");
                }
            }
        }
        Ok(result)
    }

    async fn health_check(&self) -> serde_json::Value {
        serde_json::json!({
            "healthy": true,
            "device_count": self.devices.len(),
        })
    }
}
