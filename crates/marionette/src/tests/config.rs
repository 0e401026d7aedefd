use crate::config::{Config, InputMode};

use marionette_core::{ActuatorMode, KeyCode};

use std::time::Duration;

/// WHAT: Default configuration survives a TOML round-trip
/// WHY: A freshly created config file must parse back identically
#[test]
fn given_default_config_when_round_tripped_through_toml_then_fields_preserved() {
    // Given: The default configuration
    let config = Config::default();

    // When: Serializing to TOML and parsing back
    let contents = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&contents).unwrap();

    // Then: Every section matches the default
    assert_eq!(parsed.input.mode, InputMode::Direct);
    assert_eq!(parsed.input.port, None);
    assert_eq!(parsed.input.baud, marionette_core::DEFAULT_BAUD);
    assert_eq!(parsed.recording.min_move_distance_px, 4.0);
    assert_eq!(parsed.recording.min_move_interval_ms, 50);
    assert!(parsed.recording.observe_keys);
    assert_eq!(parsed.playback.speed_multiplier, 1.0);
    assert_eq!(parsed.playback.countdown_secs, 3);
    assert!(!parsed.playback.continue_on_error);
    assert_eq!(parsed.safety.max_unattended_text_len, 64);
    assert_eq!(parsed.general.language, "en");
}

/// WHAT: An empty TOML document parses to the full default configuration
/// WHY: Missing sections must fall back to defaults instead of failing
#[test]
fn given_empty_toml_when_parsed_then_defaults_apply() {
    let parsed: Config = toml::from_str("").unwrap();

    assert_eq!(parsed.input.mode, InputMode::Direct);
    assert_eq!(parsed.recording.toggle_hotkey, "control+shift+F9");
    assert_eq!(parsed.safety.kill_switch_hotkey, "control+shift+Escape");
    assert_eq!(parsed.safety.max_commands, None);
}

/// WHAT: A partial TOML document overrides only the fields it names
/// WHY: Hand-edited configs usually set one or two values
#[test]
fn given_partial_toml_when_parsed_then_unnamed_fields_keep_defaults() {
    // Given: A document that only sets the playback speed
    let contents = "[playback]\nspeed_multiplier = 2.5\n";

    // When: Parsing it
    let parsed: Config = toml::from_str(contents).unwrap();

    // Then: The named field changed and the rest stayed default
    assert_eq!(parsed.playback.speed_multiplier, 2.5);
    assert_eq!(parsed.playback.countdown_secs, 3);
    assert_eq!(parsed.input.baud, marionette_core::DEFAULT_BAUD);
}

/// WHAT: An unknown input mode string is rejected at parse time
/// WHY: A typo in the mode should be reported, not silently defaulted
#[test]
fn given_unknown_input_mode_when_parsed_then_error() {
    let contents = "[input]\nmode = \"telepathy\"\n";

    assert!(toml::from_str::<Config>(contents).is_err());
}

/// WHAT: Recording settings translate into recorder options
/// WHY: The session must observe exactly what the config asks for
#[test]
fn given_recording_config_when_translated_then_options_match() {
    // Given: A config with custom thresholds and keys disabled
    let mut config = Config::default();
    config.recording.min_move_distance_px = 10.0;
    config.recording.min_move_interval_ms = 200;
    config.recording.observe_keys = false;

    // When: Building recorder options
    let options = config.recording.recorder_options();

    // Then: Thresholds and observe flags carry over, injected input is filtered
    assert_eq!(options.coalesce.min_move_distance_px, 10.0);
    assert_eq!(options.coalesce.min_move_interval, Duration::from_millis(200));
    assert!(options.hook.observe_pointer_moves);
    assert!(!options.hook.observe_keys);
    assert!(options.hook.filter_injected);
}

/// WHAT: Playback settings translate into execution options
/// WHY: Countdown seconds and error policy feed the engine directly
#[test]
fn given_playback_config_when_translated_then_options_match() {
    let mut config = Config::default();
    config.playback.countdown_secs = 5;
    config.playback.continue_on_error = true;

    let options = config.playback.execution_options();

    assert_eq!(options.countdown, Duration::from_secs(5));
    assert!(options.continue_on_error);
    assert_eq!(options.speed_multiplier, 1.0);
}

/// WHAT: Safety settings translate into interlock limits and danger policy
/// WHY: Limits left unset must mean unlimited, not zero
#[test]
fn given_safety_config_when_translated_then_limits_and_policy_match() {
    // Given: A config with a command cap but no duration cap
    let mut config = Config::default();
    config.safety.max_commands = Some(500);
    config.safety.max_unattended_text_len = 32;

    // When: Building the interlock inputs
    let limits = config.safety.execution_limits();
    let policy = config.safety.danger_policy();

    // Then: The cap carries over, the unset limit stays unlimited, and
    //       the OS keys stay gated
    assert_eq!(limits.max_commands, Some(500));
    assert_eq!(limits.max_duration, None);
    assert_eq!(policy.max_unattended_text_len, 32);
    assert!(policy.gated_keys.contains(&KeyCode::META));
}

/// WHAT: The hardware input mode maps to the hardware actuator
/// WHY: Mode selection is the whole point of the input section
#[test]
fn given_hardware_mode_when_converted_then_actuator_mode_is_hardware() {
    assert_eq!(ActuatorMode::from(InputMode::Hardware), ActuatorMode::Hardware);
    assert_eq!(ActuatorMode::from(InputMode::Direct), ActuatorMode::Direct);
}
