//! Virtual light — responds to `turn_on`, `turn_off`, `toggle`,
//! `set_brightness`, `refresh`.

use std::sync::Mutex;

use hearth_domain::device::{
    CommandResult, DeviceCapability, DeviceCommand, DeviceInfo, DeviceState, DeviceType,
};
use hearth_domain::error::CommandError;
use hearth_domain::id::{DeviceId, PluginId};

/// A simulated dimmable light.
pub struct VirtualLight {
    id: DeviceId,
    plugin_id: PluginId,
    state: Mutex<DeviceState>,
}

impl VirtualLight {
    #[must_use]
    pub fn new(id: DeviceId, plugin_id: PluginId) -> Self {
        let state = DeviceState {
            on: Some(false),
            brightness: Some(100),
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
        let mut info = DeviceInfo::new(self.id.clone(), "Virtual Light", self.plugin_id.clone());
        info.device_type = DeviceType::Light;
        info.capabilities = vec![DeviceCapability::OnOff, DeviceCapability::Brightness];
        info.manufacturer = Some("hearth".to_string());
        info.model = Some("VLight-1".to_string());
        info
    }

    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.lock_state().clone()
    }

    /// Execute a command against the light.
    ///
    /// # Errors
    ///
    /// [`CommandError`] for unsupported commands or out-of-range
    /// brightness.
    pub fn execute(&self, command: &DeviceCommand) -> Result<CommandResult, CommandError> {
        let mut state = self.lock_state();
        match command.command.as_str() {
            "turn_on" => state.on = Some(true),
            "turn_off" => state.on = Some(false),
            "toggle" => state.on = Some(!state.on.unwrap_or(false)),
            "set_brightness" => {
                let brightness = command
                    .params
                    .get("brightness")
                    .and_then(serde_json::Value::as_u64)
                    .filter(|value| *value <= 100)
                    .ok_or_else(|| self.error(command, "brightness must be 0-100"))?;
                #[allow(clippy::cast_possible_truncation)]
                {
                    state.brightness = Some(brightness as u8);
                }
                state.on = Some(brightness > 0);
            }
            "refresh" => {}
            _ => return Err(self.error(command, "unsupported command")),
        }
        Ok(CommandResult::ok(
            command.command.clone(),
            Some(state.clone()),
        ))
    }

    fn error(&self, command: &DeviceCommand, message: &str) -> CommandError {
        CommandError {
            device_id: self.id.to_string(),
            command: command.command.clone(),
            message: message.to_string(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> VirtualLight {
        VirtualLight::new(DeviceId::new("virtual_light"), PluginId::new("virtual"))
    }

    #[test]
    fn should_default_to_off() {
        assert_eq!(light().state().on, Some(false));
    }

    #[test]
    fn should_turn_on_when_commanded() {
        let light = light();
        let result = light.execute(&DeviceCommand::new("turn_on")).unwrap();
        assert_eq!(result.state.unwrap().on, Some(true));
    }

    #[test]
    fn should_toggle_from_off_to_on() {
        let light = light();
        light.execute(&DeviceCommand::new("toggle")).unwrap();
        assert_eq!(light.state().on, Some(true));
        light.execute(&DeviceCommand::new("toggle")).unwrap();
        assert_eq!(light.state().on, Some(false));
    }

    #[test]
    fn should_set_brightness_and_turn_on() {
        let light = light();
        let mut command = DeviceCommand::new("set_brightness");
        command
            .params
            .insert("brightness".to_string(), serde_json::json!(40));
        light.execute(&command).unwrap();

        let state = light.state();
        assert_eq!(state.brightness, Some(40));
        assert_eq!(state.on, Some(true));
    }

    #[test]
    fn should_reject_out_of_range_brightness() {
        let light = light();
        let mut command = DeviceCommand::new("set_brightness");
        command
            .params
            .insert("brightness".to_string(), serde_json::json!(150));
        assert!(light.execute(&command).is_err());
    }

    #[test]
    fn should_reject_unsupported_command() {
        let err = light()
            .execute(&DeviceCommand::new("play_music"))
            .unwrap_err();
        assert_eq!(err.command, "play_music");
    }

    #[test]
    fn should_report_light_capabilities() {
        let info = light().info();
        assert_eq!(info.device_type, DeviceType::Light);
        assert!(info.has_capability(DeviceCapability::Brightness));
    }
}
