//! Direct-injection actuator over the OS synthetic-input facility.

use crate::{
    CoreError, CoreResult,
    actuator::Actuator,
    command::{ClickPhase, KeyPhase, MouseButton},
    keys::{self, KeyCode},
};

use std::panic::Location;

use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use error_location::ErrorLocation;
use tracing::debug;

/// Actuator backend that synthesizes events through the OS.
///
/// Each call returns once the OS accepted the injected event; delivery to
/// the focused application is not guaranteed.
///
/// A fresh `Enigo` is created per call: `Enigo` is not `Send`, the engine
/// dispatches from `spawn_blocking` closures that must be `'static +
/// Send`, and construction does no heavy platform work.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectActuator;

impl DirectActuator {
    /// Create the direct-injection backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[track_caller]
    fn enigo() -> CoreResult<Enigo> {
        Enigo::new(&Settings::default()).map_err(|e| CoreError::ActuatorDispatch {
            reason: format!("Failed to create injector: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl Actuator for DirectActuator {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn move_absolute(&self, x: i32, y: i32) -> CoreResult<()> {
        Self::enigo()?
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| CoreError::ActuatorDispatch {
                reason: format!("Absolute move failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn move_relative(&self, dx: i16, dy: i16) -> CoreResult<()> {
        Self::enigo()?
            .move_mouse(i32::from(dx), i32::from(dy), Coordinate::Rel)
            .map_err(|e| CoreError::ActuatorDispatch {
                reason: format!("Relative move failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn click(&self, button: MouseButton, phase: ClickPhase) -> CoreResult<()> {
        let button = map_button(button);
        let direction = match phase {
            ClickPhase::Down => Direction::Press,
            ClickPhase::Up => Direction::Release,
            ClickPhase::Click => Direction::Click,
        };
        Self::enigo()?
            .button(button, direction)
            .map_err(|e| CoreError::ActuatorDispatch {
                reason: format!("Button {button:?} {direction:?} failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn key(&self, key: KeyCode, phase: KeyPhase) -> CoreResult<()> {
        let mapped = keys::to_enigo(key).ok_or_else(|| CoreError::ActuatorDispatch {
            reason: format!("Virtual key 0x{:02X} has no injection mapping", key.0),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let direction = match phase {
            KeyPhase::Down => Direction::Press,
            KeyPhase::Up => Direction::Release,
        };
        Self::enigo()?
            .key(mapped, direction)
            .map_err(|e| CoreError::ActuatorDispatch {
                reason: format!("Key 0x{:02X} {direction:?} failed: {e}", key.0),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn type_text(&self, text: &str) -> CoreResult<()> {
        debug!(chars = text.chars().count(), "Injecting text");
        Self::enigo()?
            .text(text)
            .map_err(|e| CoreError::ActuatorDispatch {
                reason: format!("Text injection failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn cursor_position(&self) -> CoreResult<(i32, i32)> {
        Self::enigo()?
            .location()
            .map_err(|e| CoreError::ActuatorDispatch {
                reason: format!("Cursor query failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

fn map_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
        MouseButton::X1 => Button::Back,
        MouseButton::X2 => Button::Forward,
    }
}
