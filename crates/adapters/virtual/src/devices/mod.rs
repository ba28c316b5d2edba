//! Simulated device implementations.

mod light;
mod sensor;
mod switch;

pub use light::VirtualLight;
pub use sensor::VirtualSensor;
pub use switch::VirtualSwitch;

use hearth_domain::device::{CommandResult, DeviceCommand, DeviceInfo, DeviceState};
use hearth_domain::error::CommandError;
use hearth_domain::id::DeviceId;

/// One simulated device.
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
    Switch(VirtualSwitch),
}

impl VirtualDevice {
    /// The device's id.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        match self {
            Self::Light(light) => light.id(),
            Self::Sensor(sensor) => sensor.id(),
            Self::Switch(switch) => switch.id(),
        }
    }

    /// Discovery-time info.
    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        match self {
            Self::Light(light) => light.info(),
            Self::Sensor(sensor) => sensor.info(),
            Self::Switch(switch) => switch.info(),
        }
    }

    /// Current simulated state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        match self {
            Self::Light(light) => light.state(),
            Self::Sensor(sensor) => sensor.state(),
            Self::Switch(switch) => switch.state(),
        }
    }

    /// Execute a command, returning the resulting state.
    ///
    /// # Errors
    ///
    /// [`CommandError`] when the device does not support the command.
    pub fn execute(&self, command: &DeviceCommand) -> Result<CommandResult, CommandError> {
        match self {
            Self::Light(light) => light.execute(command),
            Self::Sensor(sensor) => sensor.execute(command),
            Self::Switch(switch) => switch.execute(command),
        }
    }
}
