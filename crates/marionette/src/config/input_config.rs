use crate::config::default_baud;

use marionette_core::ActuatorMode;

use serde::{Deserialize, Serialize};

/// Which actuator path injects synthesized input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Inject through the local OS input APIs.
    #[default]
    Direct,
    /// Inject through the serial hardware bridge.
    Hardware,
}

impl From<InputMode> for ActuatorMode {
    fn from(mode: InputMode) -> Self {
        match mode {
            InputMode::Direct => ActuatorMode::Direct,
            InputMode::Hardware => ActuatorMode::Hardware,
        }
    }
}

/// Input injection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Actuator selection.
    #[serde(default)]
    pub mode: InputMode,
    /// Serial port override; `None` means auto-detect by probing.
    #[serde(default)]
    pub port: Option<String>,
    /// Serial baud rate for the hardware bridge.
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: InputMode::Direct,
            port: None,
            baud: default_baud(),
        }
    }
}
