use crate::config::{
    default_min_move_distance_px, default_min_move_interval_ms, default_record_hotkey,
    default_true,
};

use marionette_core::{CoalescePolicy, HookOptions, RecorderOptions};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recording behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Minimum pointer travel, in pixels, before a move is recorded.
    #[serde(default = "default_min_move_distance_px")]
    pub min_move_distance_px: f64,
    /// Minimum interval between recorded moves, in milliseconds.
    #[serde(default = "default_min_move_interval_ms")]
    pub min_move_interval_ms: u64,
    /// Whether pointer motion is observed.
    #[serde(default = "default_true")]
    pub observe_pointer_moves: bool,
    /// Whether mouse clicks are observed.
    #[serde(default = "default_true")]
    pub observe_clicks: bool,
    /// Whether keyboard input is observed.
    #[serde(default = "default_true")]
    pub observe_keys: bool,
    /// Global hotkey that toggles recording, in `global-hotkey` syntax.
    #[serde(default = "default_record_hotkey")]
    pub toggle_hotkey: String,
}

impl RecordingConfig {
    /// Translate into recorder options for a new session.
    pub fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions {
            hook: HookOptions {
                observe_pointer_moves: self.observe_pointer_moves,
                observe_clicks: self.observe_clicks,
                observe_keys: self.observe_keys,
                filter_injected: true,
            },
            coalesce: CoalescePolicy {
                min_move_distance_px: self.min_move_distance_px,
                min_move_interval: Duration::from_millis(self.min_move_interval_ms),
            },
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            min_move_distance_px: default_min_move_distance_px(),
            min_move_interval_ms: default_min_move_interval_ms(),
            observe_pointer_moves: true,
            observe_clicks: true,
            observe_keys: true,
            toggle_hotkey: default_record_hotkey(),
        }
    }
}
