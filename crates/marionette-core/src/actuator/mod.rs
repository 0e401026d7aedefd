//! Actuator abstraction: the component that performs an input action.
//!
//! Two interchangeable backends implement the same capability trait:
//! direct OS synthetic injection and the serial hardware bridge. Methods
//! are synchronous and the engine invokes them through `spawn_blocking`,
//! so implementations may block (enigo sleeps, serial round-trips).

mod direct;

pub use direct::DirectActuator;

use crate::{
    CoreResult,
    command::{ClickPhase, CommandKind, KeyPhase, MouseButton, TextInput},
    keys::KeyCode,
};

use std::sync::{Arc, Mutex};

/// Which actuator backend dispatches commands.
///
/// Switching modes between commands is allowed; the engine re-selects the
/// backend before every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorMode {
    /// OS synthetic input injection.
    Direct,
    /// Serial-attached hardware actuator.
    Hardware,
}

/// Mode-switched pair of actuator backends.
///
/// The engine asks for [`ActuatorSelector::current`] immediately before
/// every dispatch, so a mode change takes effect on the next command.
pub struct ActuatorSelector {
    direct: Arc<dyn Actuator>,
    hardware: Arc<dyn Actuator>,
    mode: Mutex<ActuatorMode>,
}

impl ActuatorSelector {
    /// Pair the two backends under an initial mode.
    #[must_use]
    pub fn new(
        direct: Arc<dyn Actuator>,
        hardware: Arc<dyn Actuator>,
        mode: ActuatorMode,
    ) -> Self {
        Self {
            direct,
            hardware,
            mode: Mutex::new(mode),
        }
    }

    /// The currently selected mode.
    #[must_use]
    pub fn mode(&self) -> ActuatorMode {
        self.mode
            .lock()
            .map(|guard| *guard)
            .unwrap_or(ActuatorMode::Direct)
    }

    /// Select a mode; applies from the next dispatched command.
    pub fn set_mode(&self, mode: ActuatorMode) {
        if let Ok(mut guard) = self.mode.lock() {
            *guard = mode;
        }
    }

    /// The backend for the current mode.
    #[must_use]
    pub fn current(&self) -> Arc<dyn Actuator> {
        match self.mode() {
            ActuatorMode::Direct => Arc::clone(&self.direct),
            ActuatorMode::Hardware => Arc::clone(&self.hardware),
        }
    }
}

/// Capability interface for performing input actions.
pub trait Actuator: Send + Sync {
    /// Backend name for logs and errors.
    fn name(&self) -> &'static str;

    /// Move the pointer to an absolute screen coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ActuatorDispatch`] if the backend
    /// rejects the action.
    fn move_absolute(&self, x: i32, y: i32) -> CoreResult<()>;

    /// Move the pointer by a delta.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ActuatorDispatch`] if the backend
    /// rejects the action.
    fn move_relative(&self, dx: i16, dy: i16) -> CoreResult<()>;

    /// Press, release, or click a mouse button.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ActuatorDispatch`] if the backend
    /// rejects the action.
    fn click(&self, button: MouseButton, phase: ClickPhase) -> CoreResult<()>;

    /// Press or release a key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ActuatorDispatch`] if the backend
    /// rejects the action.
    fn key(&self, key: KeyCode, phase: KeyPhase) -> CoreResult<()>;

    /// Type a run of text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ActuatorDispatch`] if the backend
    /// rejects the action.
    fn type_text(&self, text: &str) -> CoreResult<()>;

    /// Current pointer position.
    ///
    /// The hardware backend cannot observe the host cursor and reports
    /// a dispatch error; this asymmetry is part of the contract.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::ActuatorDispatch`] when the backend
    /// cannot report a position.
    fn cursor_position(&self) -> CoreResult<(i32, i32)>;
}

/// Route one command variant to the matching actuator capability.
///
/// Sleep is a timing concern the engine handles; here it dispatches to
/// nothing and succeeds.
///
/// # Errors
///
/// Propagates the backend's dispatch error.
pub fn dispatch(actuator: &dyn Actuator, kind: &CommandKind) -> CoreResult<()> {
    match kind {
        CommandKind::MoveAbsolute { x, y } => actuator.move_absolute(*x, *y),
        CommandKind::MoveRelative { dx, dy } => actuator.move_relative(*dx, *dy),
        CommandKind::Click { button, phase } => actuator.click(*button, *phase),
        CommandKind::KeyEvent { key, phase } => actuator.key(*key, *phase),
        CommandKind::TypeText {
            input: TextInput::Text(text),
        } => actuator.type_text(text),
        CommandKind::TypeText {
            input: TextInput::Keys(keys),
        } => {
            for key in keys {
                actuator.key(*key, KeyPhase::Down)?;
                actuator.key(*key, KeyPhase::Up)?;
            }
            Ok(())
        }
        CommandKind::Sleep { .. } => Ok(()),
    }
}
