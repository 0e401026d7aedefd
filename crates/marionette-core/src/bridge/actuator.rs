//! Actuator backend that forwards every call over the hardware bridge.

use crate::{
    CoreError, CoreResult,
    actuator::Actuator,
    bridge::{
        connection::BridgeConnection,
        frame::{OutboundFrame, button_code, click_phase_code, key_phase_code},
    },
    command::{ClickPhase, KeyPhase, MouseButton},
    keys::KeyCode,
};

use std::{panic::Location, sync::Arc};

use error_location::ErrorLocation;

/// Hardware actuator: each capability call becomes one acknowledged wire
/// command through the [`BridgeConnection`].
pub struct BridgeActuator {
    connection: Arc<BridgeConnection>,
}

impl BridgeActuator {
    /// Wrap a bridge connection.
    #[must_use]
    pub fn new(connection: Arc<BridgeConnection>) -> Self {
        Self { connection }
    }
}

impl Actuator for BridgeActuator {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn move_absolute(&self, x: i32, y: i32) -> CoreResult<()> {
        self.connection
            .request_blocking(OutboundFrame::MoveAbsolute { x, y })
    }

    fn move_relative(&self, dx: i16, dy: i16) -> CoreResult<()> {
        self.connection
            .request_blocking(OutboundFrame::MoveRelative { dx, dy })
    }

    fn click(&self, button: MouseButton, phase: ClickPhase) -> CoreResult<()> {
        self.connection.request_blocking(OutboundFrame::Click {
            button: button_code(button),
            phase: click_phase_code(phase),
        })
    }

    fn key(&self, key: KeyCode, phase: KeyPhase) -> CoreResult<()> {
        self.connection.request_blocking(OutboundFrame::Key {
            code: key.0,
            phase: key_phase_code(phase),
        })
    }

    fn type_text(&self, text: &str) -> CoreResult<()> {
        self.connection
            .request_blocking(OutboundFrame::TypeText(text.to_string()))
    }

    /// A physical actuator cannot observe the host cursor; this is the
    /// documented asymmetry with the direct backend.
    fn cursor_position(&self) -> CoreResult<(i32, i32)> {
        Err(CoreError::ActuatorDispatch {
            reason: "cursor position is not available from the hardware actuator".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
