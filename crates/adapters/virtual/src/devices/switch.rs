//! Virtual switch — responds to `turn_on`, `turn_off`, `toggle`, `refresh`.

use std::sync::Mutex;

use hearth_domain::device::{
    CommandResult, DeviceCapability, DeviceCommand, DeviceInfo, DeviceState, DeviceType,
};
use hearth_domain::error::CommandError;
use hearth_domain::id::{DeviceId, PluginId};

/// Simulated power draw while the switch is on, in watts.
const ACTIVE_POWER_W: f64 = 42.5;

/// A simulated smart plug with power monitoring.
pub struct VirtualSwitch {
    id: DeviceId,
    plugin_id: PluginId,
    state: Mutex<DeviceState>,
}

impl VirtualSwitch {
    #[must_use]
    pub fn new(id: DeviceId, plugin_id: PluginId) -> Self {
        let state = DeviceState {
            on: Some(false),
            power: Some(0.0),
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
        let mut info = DeviceInfo::new(self.id.clone(), "Virtual Switch", self.plugin_id.clone());
        info.device_type = DeviceType::Switch;
        info.capabilities = vec![DeviceCapability::OnOff, DeviceCapability::PowerMonitoring];
        info.manufacturer = Some("hearth".to_string());
        info.model = Some("VSwitch-1".to_string());
        info
    }

    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.lock_state().clone()
    }

    /// Execute a command against the switch.
    ///
    /// # Errors
    ///
    /// [`CommandError`] for unsupported commands.
    pub fn execute(&self, command: &DeviceCommand) -> Result<CommandResult, CommandError> {
        let mut state = self.lock_state();
        match command.command.as_str() {
            "turn_on" => state.on = Some(true),
            "turn_off" => state.on = Some(false),
            "toggle" => state.on = Some(!state.on.unwrap_or(false)),
            "refresh" => {}
            _ => {
                return Err(CommandError {
                    device_id: self.id.to_string(),
                    command: command.command.clone(),
                    message: "unsupported command".to_string(),
                });
            }
        }
        state.power = Some(if state.on == Some(true) {
            ACTIVE_POWER_W
        } else {
            0.0
        });
        Ok(CommandResult::ok(
            command.command.clone(),
            Some(state.clone()),
        ))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
