#[allow(clippy::module_inception)]
mod config;
mod general_config;
mod input_config;
mod playback_config;
mod recording_config;
mod safety_config;

pub(crate) use {
    config::Config,
    general_config::GeneralConfig,
    input_config::{InputConfig, InputMode},
    playback_config::PlaybackConfig,
    recording_config::RecordingConfig,
    safety_config::SafetyConfig,
};

pub(crate) const DEFAULT_MIN_MOVE_DISTANCE_PX: f64 = 4.0;
pub(crate) const DEFAULT_MIN_MOVE_INTERVAL_MS: u64 = 50;
pub(crate) const DEFAULT_SPEED_MULTIPLIER: f64 = 1.0;
pub(crate) const DEFAULT_COUNTDOWN_SECS: u64 = 3;
pub(crate) const DEFAULT_MAX_TEXT_LEN: usize = 64;
pub(crate) const DEFAULT_RECORD_HOTKEY: &str = "control+shift+F9";
pub(crate) const DEFAULT_KILL_SWITCH_HOTKEY: &str = "control+shift+Escape";
pub(crate) const DEFAULT_LANGUAGE: &str = "en";

pub(crate) fn default_min_move_distance_px() -> f64 {
    DEFAULT_MIN_MOVE_DISTANCE_PX
}

pub(crate) fn default_min_move_interval_ms() -> u64 {
    DEFAULT_MIN_MOVE_INTERVAL_MS
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_speed_multiplier() -> f64 {
    DEFAULT_SPEED_MULTIPLIER
}

pub(crate) fn default_countdown_secs() -> u64 {
    DEFAULT_COUNTDOWN_SECS
}

pub(crate) fn default_max_text_len() -> usize {
    DEFAULT_MAX_TEXT_LEN
}

pub(crate) fn default_record_hotkey() -> String {
    DEFAULT_RECORD_HOTKEY.to_string()
}

pub(crate) fn default_kill_switch_hotkey() -> String {
    DEFAULT_KILL_SWITCH_HOTKEY.to_string()
}

pub(crate) fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

pub(crate) fn default_baud() -> u32 {
    marionette_core::DEFAULT_BAUD
}
