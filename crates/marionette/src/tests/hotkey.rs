use crate::{
    AppCommand, HotkeyHandler,
    hotkey_handler::{self, HotkeyBindings, ScriptTrigger},
};

use marionette_core::{HotkeyDefinition, KeyCode, Modifiers, TriggerMode};

use std::collections::HashMap;

use global_hotkey::{
    GlobalHotKeyEvent, HotKeyState,
    hotkey::{Code, HotKey, Modifiers as HotKeyModifiers},
};
use tokio::sync::mpsc;
use uuid::Uuid;

fn definition(modifiers: Modifiers, key: KeyCode) -> HotkeyDefinition {
    HotkeyDefinition {
        modifiers,
        key,
        mode: TriggerMode::FireOncePerPress,
        swallow: false,
    }
}

/// WHAT: A script trigger chord maps to an equivalent global hotkey
/// WHY: Registration must preserve the chord the user recorded
#[test]
fn given_trigger_definition_when_mapped_then_chord_preserved() {
    // Given: Ctrl+Shift+R
    let trigger = definition(Modifiers::CONTROL | Modifiers::SHIFT, KeyCode(0x52));

    // When: Mapping it for registration
    let hotkey = hotkey_handler::trigger_to_hotkey(&trigger).unwrap();

    // Then: The chord matches the same key registered directly
    let expected = HotKey::new(
        Some(HotKeyModifiers::CONTROL | HotKeyModifiers::SHIFT),
        Code::KeyR,
    );
    assert_eq!(hotkey.id(), expected.id());
}

/// WHAT: A bare function-key trigger maps without modifiers
/// WHY: Function keys are the only unmodified triggers the core allows
#[test]
fn given_bare_function_key_when_mapped_then_no_modifiers() {
    let trigger = definition(Modifiers::NONE, KeyCode::F1);

    let hotkey = hotkey_handler::trigger_to_hotkey(&trigger).unwrap();

    assert_eq!(hotkey.id(), HotKey::new(None, Code::F1).id());
}

/// WHAT: The meta modifier maps to the platform super key
/// WHY: The OS key has a different name in the registration namespace
#[test]
fn given_meta_modifier_when_mapped_then_super_is_set() {
    let trigger = definition(Modifiers::META, KeyCode(0x41));

    let hotkey = hotkey_handler::trigger_to_hotkey(&trigger).unwrap();

    assert_eq!(
        hotkey.id(),
        HotKey::new(Some(HotKeyModifiers::SUPER), Code::KeyA).id()
    );
}

/// WHAT: A key with no registration equivalent maps to None
/// WHY: Such triggers are skipped with a warning instead of panicking
#[test]
fn given_unmappable_key_when_mapped_then_none() {
    // 0xA0 is a sided shift; it cannot be a registration primary key
    assert!(hotkey_handler::vk_to_code(KeyCode(0xA0)).is_none());
    assert!(hotkey_handler::vk_to_code(KeyCode(0xE7)).is_none());
}

/// WHAT: Letter, digit, and navigation keys map to their code names
/// WHY: These cover the triggers users actually assign
#[test]
fn given_common_keys_when_mapped_then_codes_match() {
    assert_eq!(hotkey_handler::vk_to_code(KeyCode(0x41)), Some(Code::KeyA));
    assert_eq!(hotkey_handler::vk_to_code(KeyCode(0x39)), Some(Code::Digit9));
    assert_eq!(hotkey_handler::vk_to_code(KeyCode(0x1B)), Some(Code::Escape));
    assert_eq!(hotkey_handler::vk_to_code(KeyCode(0x7B)), Some(Code::F12));
    assert_eq!(hotkey_handler::vk_to_code(KeyCode(0x26)), Some(Code::ArrowUp));
}

fn handler_with_script(
    script_id: Uuid,
    trigger_id: u32,
    mode: TriggerMode,
) -> (HotkeyHandler, mpsc::Receiver<AppCommand>) {
    let (command_tx, command_rx) = mpsc::channel(8);
    let mut scripts = HashMap::new();
    scripts.insert(trigger_id, ScriptTrigger { script_id, mode });
    let bindings = HotkeyBindings {
        record_toggle: 1,
        kill_switch: 2,
        scripts,
    };
    (HotkeyHandler::new(bindings, command_tx), command_rx)
}

/// WHAT: A held one-shot trigger fires once until the chord is released
/// WHY: Holding the chord redelivers Pressed through OS auto-repeat, and
/// each redelivery must not start another run
#[tokio::test]
async fn given_held_one_shot_trigger_when_auto_repeating_then_single_run() {
    let script_id = Uuid::new_v4();
    let (mut handler, mut command_rx) =
        handler_with_script(script_id, 7, TriggerMode::FireOncePerPress);

    // When: Press, two auto-repeats, release, then a fresh press
    for _ in 0..3 {
        handler
            .handle_event(GlobalHotKeyEvent {
                id: 7,
                state: HotKeyState::Pressed,
            })
            .await;
    }
    handler
        .handle_event(GlobalHotKeyEvent {
            id: 7,
            state: HotKeyState::Released,
        })
        .await;
    handler
        .handle_event(GlobalHotKeyEvent {
            id: 7,
            state: HotKeyState::Pressed,
        })
        .await;

    // Then: One run per physical press
    assert_eq!(
        command_rx.try_recv().unwrap(),
        AppCommand::RunScript(script_id)
    );
    assert_eq!(
        command_rx.try_recv().unwrap(),
        AppCommand::RunScript(script_id)
    );
    assert!(command_rx.try_recv().is_err());
}

/// WHAT: A hold-to-run trigger refires on repeat and stops on release
/// WHY: Hold-to-run means the script runs only while the chord is down
#[tokio::test]
async fn given_hold_to_run_trigger_when_released_then_stop_sent() {
    let script_id = Uuid::new_v4();
    let (mut handler, mut command_rx) =
        handler_with_script(script_id, 9, TriggerMode::RepeatWhileHeld);

    // When: Press, one auto-repeat, release
    for _ in 0..2 {
        handler
            .handle_event(GlobalHotKeyEvent {
                id: 9,
                state: HotKeyState::Pressed,
            })
            .await;
    }
    handler
        .handle_event(GlobalHotKeyEvent {
            id: 9,
            state: HotKeyState::Released,
        })
        .await;

    // Then: Every press runs, the release stops
    assert_eq!(
        command_rx.try_recv().unwrap(),
        AppCommand::RunScript(script_id)
    );
    assert_eq!(
        command_rx.try_recv().unwrap(),
        AppCommand::RunScript(script_id)
    );
    assert_eq!(command_rx.try_recv().unwrap(), AppCommand::StopExecution);
    assert!(command_rx.try_recv().is_err());
}

/// WHAT: Commands sent on a closed channel fail without panicking
/// WHY: The app loop may already be gone during shutdown
#[tokio::test]
async fn given_closed_channel_when_sending_command_then_error() {
    // Given: A closed command channel
    let (command_tx, command_rx) = mpsc::channel(1);
    drop(command_rx);

    // When: Sending a run command
    let result = command_tx.send(AppCommand::RunScript(Uuid::new_v4())).await;

    // Then: The send fails cleanly
    assert!(result.is_err());
}

/// WHAT: Commands round-trip through the channel in order
/// WHY: Hotkey hits must arrive at the app in press order
#[tokio::test]
async fn given_open_channel_when_sending_commands_then_received_in_order() {
    let (command_tx, mut command_rx) = mpsc::channel(8);

    command_tx.send(AppCommand::ToggleRecording).await.unwrap();
    command_tx.send(AppCommand::KillSwitch).await.unwrap();

    assert_eq!(command_rx.recv().await.unwrap(), AppCommand::ToggleRecording);
    assert_eq!(command_rx.recv().await.unwrap(), AppCommand::KillSwitch);
}
