use crate::config::{default_kill_switch_hotkey, default_max_text_len};

use marionette_core::{DangerPolicy, ExecutionLimits, KeyCode};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Safety interlock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Maximum commands a script may contain; `None` means unlimited.
    #[serde(default)]
    pub max_commands: Option<usize>,
    /// Maximum session duration in seconds; `None` means unlimited.
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
    /// Text length above which playback requires authorization.
    #[serde(default = "default_max_text_len")]
    pub max_unattended_text_len: usize,
    /// Global hotkey that engages the kill switch, in `global-hotkey` syntax.
    #[serde(default = "default_kill_switch_hotkey")]
    pub kill_switch_hotkey: String,
}

impl SafetyConfig {
    /// Translate into interlock limits.
    pub fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_commands: self.max_commands,
            max_duration: self.max_duration_secs.map(Duration::from_secs),
        }
    }

    /// Translate into the danger classification policy.
    pub fn danger_policy(&self) -> DangerPolicy {
        DangerPolicy {
            max_unattended_text_len: self.max_unattended_text_len,
            gated_keys: vec![KeyCode::META, KeyCode::META_RIGHT],
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_commands: None,
            max_duration_secs: None,
            max_unattended_text_len: default_max_text_len(),
            kill_switch_hotkey: default_kill_switch_hotkey(),
        }
    }
}
