use crate::config::{default_countdown_secs, default_speed_multiplier};

use marionette_core::ExecutionOptions;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Playback behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Delay scaling factor; values above 1.0 run faster.
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
    /// Countdown before the first command, in seconds.
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
    /// Whether a failed command aborts the session or is skipped.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl PlaybackConfig {
    /// Translate into execution options for a new session.
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            speed_multiplier: self.speed_multiplier,
            countdown: Duration::from_secs(self.countdown_secs),
            continue_on_error: self.continue_on_error,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: default_speed_multiplier(),
            countdown_secs: default_countdown_secs(),
            continue_on_error: false,
        }
    }
}
