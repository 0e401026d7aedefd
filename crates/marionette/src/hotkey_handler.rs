//! Global hotkey registration and event handling.
//!
//! Registration happens on the main thread because the hotkey manager
//! must live where the platform event loop pumps messages. The handler
//! forwards hotkey hits from the crossbeam receiver into the async world
//! and maps them to application commands.

use crate::{AppCommand, AppError, AppResult};

use marionette_core::{HotkeyDefinition, KeyCode, Modifiers, Script, TriggerMode};

use std::{
    collections::{HashMap, HashSet},
    panic::Location,
    time::Duration,
};

use error_location::ErrorLocation;
use global_hotkey::{
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
    hotkey::{Code, HotKey, Modifiers as HotKeyModifiers},
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Registered hotkey ids and what each one means.
#[derive(Debug, Default)]
pub struct HotkeyBindings {
    /// Id of the record-toggle hotkey.
    pub record_toggle: u32,
    /// Id of the kill-switch hotkey.
    pub kill_switch: u32,
    /// Script trigger hotkey ids mapped to what they fire.
    pub scripts: HashMap<u32, ScriptTrigger>,
}

/// What a registered script trigger fires and how.
#[derive(Debug, Clone, Copy)]
pub struct ScriptTrigger {
    /// The script the trigger starts.
    pub script_id: Uuid,
    /// How presses map to runs while the chord is held.
    pub mode: TriggerMode,
}

/// Register the application hotkeys plus every stored script trigger.
///
/// Must be called on the main thread (macOS requirement, and the manager
/// must live on the thread that pumps platform events). The returned
/// manager must be kept alive for the hotkeys to stay registered.
///
/// A script trigger that cannot be mapped or registered is skipped with
/// a warning; the application hotkeys themselves are mandatory.
#[track_caller]
pub fn register_hotkeys(
    record_toggle: &str,
    kill_switch: &str,
    scripts: &[Script],
) -> AppResult<(GlobalHotKeyManager, HotkeyBindings)> {
    let caller = Location::caller();
    let manager = GlobalHotKeyManager::new().map_err(|e| AppError::HotkeyRegistrationFailed {
        reason: format!("Failed to create hotkey manager: {}", e),
        location: ErrorLocation::from(caller),
    })?;

    let record = parse_hotkey(record_toggle)?;
    manager
        .register(record)
        .map_err(|e| AppError::HotkeyRegistrationFailed {
            reason: format!("Failed to register record hotkey '{}': {}", record_toggle, e),
            location: ErrorLocation::from(caller),
        })?;

    let kill = parse_hotkey(kill_switch)?;
    manager
        .register(kill)
        .map_err(|e| AppError::HotkeyRegistrationFailed {
            reason: format!("Failed to register kill switch '{}': {}", kill_switch, e),
            location: ErrorLocation::from(caller),
        })?;

    let mut bindings = HotkeyBindings {
        record_toggle: record.id(),
        kill_switch: kill.id(),
        scripts: HashMap::new(),
    };

    for script in scripts {
        let Some(definition) = script.hotkey else {
            continue;
        };
        let Some(hotkey) = trigger_to_hotkey(&definition) else {
            warn!(
                script = script.name(),
                trigger = %definition,
                "Script trigger key has no global hotkey equivalent, skipping"
            );
            continue;
        };
        if !definition.swallow {
            // Registration captures a chord exclusively on every platform;
            // pass-through triggers cannot be honored here.
            warn!(
                script = script.name(),
                trigger = %definition,
                "Pass-through trigger registered as exclusive capture"
            );
        }
        match manager.register(hotkey) {
            Ok(()) => {
                bindings.scripts.insert(
                    hotkey.id(),
                    ScriptTrigger {
                        script_id: script.id,
                        mode: definition.mode,
                    },
                );
                debug!(script = script.name(), trigger = %definition, "Script trigger registered");
            }
            Err(e) => warn!(
                script = script.name(),
                trigger = %definition,
                error = %e,
                "Failed to register script trigger, skipping"
            ),
        }
    }

    info!(
        record = record_toggle,
        kill_switch = kill_switch,
        script_triggers = bindings.scripts.len(),
        "Global hotkeys registered"
    );

    Ok((manager, bindings))
}

#[track_caller]
fn parse_hotkey(spec: &str) -> AppResult<HotKey> {
    let caller = Location::caller();
    spec.parse()
        .map_err(|e| AppError::HotkeyRegistrationFailed {
            reason: format!("Invalid hotkey '{}': {}", spec, e),
            location: ErrorLocation::from(caller),
        })
}

/// Map a script trigger definition to a global hotkey.
///
/// Returns `None` for primary keys that have no `Code` equivalent.
pub(crate) fn trigger_to_hotkey(definition: &HotkeyDefinition) -> Option<HotKey> {
    let code = vk_to_code(definition.key)?;

    let mut modifiers = HotKeyModifiers::empty();
    for (bit, mapped) in [
        (Modifiers::CONTROL, HotKeyModifiers::CONTROL),
        (Modifiers::ALT, HotKeyModifiers::ALT),
        (Modifiers::SHIFT, HotKeyModifiers::SHIFT),
        (Modifiers::META, HotKeyModifiers::SUPER),
    ] {
        if definition.modifiers.contains(bit) {
            modifiers |= mapped;
        }
    }

    let modifiers = (!modifiers.is_empty()).then_some(modifiers);

    Some(HotKey::new(modifiers, code))
}

/// Map a virtual-key code to the `Code` namespace used for registration.
pub(crate) fn vk_to_code(key: KeyCode) -> Option<Code> {
    let code = match key.0 {
        0x08 => Code::Backspace,
        0x09 => Code::Tab,
        0x0D => Code::Enter,
        0x1B => Code::Escape,
        0x20 => Code::Space,
        0x21 => Code::PageUp,
        0x22 => Code::PageDown,
        0x23 => Code::End,
        0x24 => Code::Home,
        0x25 => Code::ArrowLeft,
        0x26 => Code::ArrowUp,
        0x27 => Code::ArrowRight,
        0x28 => Code::ArrowDown,
        0x2E => Code::Delete,
        0x30 => Code::Digit0,
        0x31 => Code::Digit1,
        0x32 => Code::Digit2,
        0x33 => Code::Digit3,
        0x34 => Code::Digit4,
        0x35 => Code::Digit5,
        0x36 => Code::Digit6,
        0x37 => Code::Digit7,
        0x38 => Code::Digit8,
        0x39 => Code::Digit9,
        0x41 => Code::KeyA,
        0x42 => Code::KeyB,
        0x43 => Code::KeyC,
        0x44 => Code::KeyD,
        0x45 => Code::KeyE,
        0x46 => Code::KeyF,
        0x47 => Code::KeyG,
        0x48 => Code::KeyH,
        0x49 => Code::KeyI,
        0x4A => Code::KeyJ,
        0x4B => Code::KeyK,
        0x4C => Code::KeyL,
        0x4D => Code::KeyM,
        0x4E => Code::KeyN,
        0x4F => Code::KeyO,
        0x50 => Code::KeyP,
        0x51 => Code::KeyQ,
        0x52 => Code::KeyR,
        0x53 => Code::KeyS,
        0x54 => Code::KeyT,
        0x55 => Code::KeyU,
        0x56 => Code::KeyV,
        0x57 => Code::KeyW,
        0x58 => Code::KeyX,
        0x59 => Code::KeyY,
        0x5A => Code::KeyZ,
        0x70 => Code::F1,
        0x71 => Code::F2,
        0x72 => Code::F3,
        0x73 => Code::F4,
        0x74 => Code::F5,
        0x75 => Code::F6,
        0x76 => Code::F7,
        0x77 => Code::F8,
        0x78 => Code::F9,
        0x79 => Code::F10,
        0x7A => Code::F11,
        0x7B => Code::F12,
        _ => return None,
    };
    Some(code)
}

/// Forwards global hotkey hits to the application as commands.
pub struct HotkeyHandler {
    /// Registered hotkey ids.
    pub bindings: HotkeyBindings,
    /// Channel for sending commands to the main app.
    pub command_tx: mpsc::Sender<AppCommand>,
    /// Chords currently held down, to tell auto-repeat from new presses.
    held: HashSet<u32>,
}

impl HotkeyHandler {
    /// Create a handler over registered bindings.
    #[must_use]
    pub fn new(bindings: HotkeyBindings, command_tx: mpsc::Sender<AppCommand>) -> Self {
        Self {
            bindings,
            command_tx,
            held: HashSet::new(),
        }
    }

    /// Run the hotkey event loop until shutdown is signalled.
    ///
    /// The crossbeam receiver blocks, so a `spawn_blocking` forwarder
    /// bridges it into the async select loop.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Hotkey handler started");

        let receiver = GlobalHotKeyEvent::receiver().clone();
        let (event_tx, mut event_rx) = mpsc::channel::<GlobalHotKeyEvent>(32);

        let forwarder = tokio::task::spawn_blocking(move || {
            while let Ok(event) = receiver.recv() {
                if event_tx.blocking_send(event).is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Hotkey handler shutting down");
                        break;
                    }
                }
            }
        }

        // Dropping the receiver unblocks the forwarder on its next send.
        drop(event_rx);
        if tokio::time::timeout(Duration::from_secs(1), forwarder)
            .await
            .is_err()
        {
            warn!("Hotkey forwarder did not stop within timeout");
        }
    }

    pub(crate) async fn handle_event(&mut self, event: GlobalHotKeyEvent) {
        if event.state == HotKeyState::Released {
            self.held.remove(&event.id);
            // Hold-to-run triggers stop their script when the chord is
            // let go; everything else ignores releases.
            if let Some(trigger) = self.bindings.scripts.get(&event.id)
                && trigger.mode == TriggerMode::RepeatWhileHeld
            {
                debug!(script_id = %trigger.script_id, "Hold trigger released");
                self.send(AppCommand::StopExecution).await;
            }
            return;
        }

        // Holding a chord redelivers Pressed through OS auto-repeat.
        let first_press = self.held.insert(event.id);

        let command = if event.id == self.bindings.record_toggle {
            if !first_press {
                return;
            }
            AppCommand::ToggleRecording
        } else if event.id == self.bindings.kill_switch {
            if !first_press {
                return;
            }
            AppCommand::KillSwitch
        } else if let Some(trigger) = self.bindings.scripts.get(&event.id) {
            if !first_press && trigger.mode == TriggerMode::FireOncePerPress {
                return;
            }
            AppCommand::RunScript(trigger.script_id)
        } else {
            debug!(hotkey_id = event.id, "Ignoring unbound hotkey");
            return;
        };

        debug!(?command, "Hotkey pressed");
        self.send(command).await;
    }

    async fn send(&self, command: AppCommand) {
        if let Err(e) = self.command_tx.send(command).await {
            error!("Failed to send hotkey command: {}", e);
        }
    }
}
