//! Virtual climate sensor — read-only, supports `refresh`.

use std::sync::Mutex;

use hearth_domain::device::{
    CommandResult, DeviceCapability, DeviceCommand, DeviceInfo, DeviceState, DeviceType,
};
use hearth_domain::error::CommandError;
use hearth_domain::id::{DeviceId, PluginId};

/// A simulated temperature/humidity sensor.
pub struct VirtualSensor {
    id: DeviceId,
    plugin_id: PluginId,
    state: Mutex<DeviceState>,
}

impl VirtualSensor {
    #[must_use]
    pub fn new(id: DeviceId, plugin_id: PluginId) -> Self {
        let state = DeviceState {
            temperature: Some(21.5),
            humidity: Some(45),
            battery: Some(100),
            ..DeviceState::default()
        };
        Self {
            id,
            plugin_id,
            state: Mutex::new(state),
        }
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        let mut info = DeviceInfo::new(self.id.clone(), "Virtual Sensor", self.plugin_id.clone());
        info.device_type = DeviceType::Sensor;
        info.capabilities = vec![
            DeviceCapability::Temperature,
            DeviceCapability::Humidity,
            DeviceCapability::Battery,
        ];
        info.manufacturer = Some("hearth".to_string());
        info.model = Some("VSense-1".to_string());
        info
    }

    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.lock_state().clone()
    }

    /// Execute a command. Sensors are read-only; only `refresh` succeeds.
    ///
    /// # Errors
    ///
    /// [`CommandError`] for anything but `refresh`.
    pub fn execute(&self, command: &DeviceCommand) -> Result<CommandResult, CommandError> {
        if command.command == "refresh" {
            return Ok(CommandResult::ok("refresh", Some(self.state())));
        }
        Err(CommandError {
            device_id: self.id.to_string(),
            command: command.command.clone(),
            message: "sensor is read-only".to_string(),
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
