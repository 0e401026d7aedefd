//! Binary framing for the hardware bridge: `[tag: u8][payload]`,
//! integers little-endian.
//!
//! Inbound (device → host) and outbound (host → device) tags are
//! independent spaces. Every outbound command is acknowledged by a
//! [`InboundFrame::StatusResponse`] (status 0 = ok) or an
//! [`InboundFrame::Error`] frame; inbound tags `0x01`–`0x03` are
//! unsolicited device notifications.

use crate::{CoreError, CoreResult, command::{ClickPhase, KeyPhase, MouseButton}};

use std::panic::Location;

use error_location::ErrorLocation;

/// Protocol version expected in handshake responses.
pub const PROTOCOL_VERSION: u8 = 1;

/// Inbound tag: device-originated pointer motion.
pub const TAG_MOUSE_MOVE: u8 = 0x01;
/// Inbound tag: device-originated button event.
pub const TAG_MOUSE_CLICK: u8 = 0x02;
/// Inbound tag: device-originated key event.
pub const TAG_KEYBOARD_INPUT: u8 = 0x03;
/// Inbound tag: status/acknowledgment response.
pub const TAG_STATUS_RESPONSE: u8 = 0x20;
/// Inbound tag: device error report.
pub const TAG_ERROR: u8 = 0xFF;

/// Outbound tag: absolute pointer move.
pub const TAG_CMD_MOVE_ABSOLUTE: u8 = 0x10;
/// Outbound tag: relative pointer move.
pub const TAG_CMD_MOVE_RELATIVE: u8 = 0x11;
/// Outbound tag: button action.
pub const TAG_CMD_CLICK: u8 = 0x12;
/// Outbound tag: key action.
pub const TAG_CMD_KEY: u8 = 0x13;
/// Outbound tag: text injection.
pub const TAG_CMD_TYPE_TEXT: u8 = 0x14;
/// Outbound tag: handshake / status query.
pub const TAG_CMD_STATUS_QUERY: u8 = 0x20;

/// A host → device command frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Move the device pointer to an absolute coordinate.
    MoveAbsolute {
        /// Target x.
        x: i32,
        /// Target y.
        y: i32,
    },
    /// Move the device pointer by a delta.
    MoveRelative {
        /// Horizontal delta.
        dx: i16,
        /// Vertical delta.
        dy: i16,
    },
    /// Actuate a mouse button.
    Click {
        /// Wire button code.
        button: u8,
        /// Wire phase code.
        phase: u8,
    },
    /// Actuate a key.
    Key {
        /// Virtual key code.
        code: u16,
        /// Wire phase code.
        phase: u8,
    },
    /// Type text (UTF-8, u16 length prefix).
    TypeText(String),
    /// Handshake / status probe.
    StatusQuery,
}

impl OutboundFrame {
    /// Serialize to wire bytes.
    ///
    /// Returns [`CoreError::Validation`] when a text payload does not
    /// fit the `u16` length prefix.
    #[track_caller]
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let caller = Location::caller();
        Ok(match self {
            OutboundFrame::MoveAbsolute { x, y } => {
                let mut out = Vec::with_capacity(9);
                out.push(TAG_CMD_MOVE_ABSOLUTE);
                out.extend_from_slice(&x.to_le_bytes());
                out.extend_from_slice(&y.to_le_bytes());
                out
            }
            OutboundFrame::MoveRelative { dx, dy } => {
                let mut out = Vec::with_capacity(5);
                out.push(TAG_CMD_MOVE_RELATIVE);
                out.extend_from_slice(&dx.to_le_bytes());
                out.extend_from_slice(&dy.to_le_bytes());
                out
            }
            OutboundFrame::Click { button, phase } => {
                vec![TAG_CMD_CLICK, *button, *phase]
            }
            OutboundFrame::Key { code, phase } => {
                let mut out = Vec::with_capacity(4);
                out.push(TAG_CMD_KEY);
                out.extend_from_slice(&code.to_le_bytes());
                out.push(*phase);
                out
            }
            OutboundFrame::TypeText(text) => {
                let bytes = text.as_bytes();
                let len =
                    u16::try_from(bytes.len()).map_err(|_| CoreError::Validation {
                        reason: format!(
                            "text payload of {} bytes exceeds the u16 length prefix",
                            bytes.len()
                        ),
                        location: ErrorLocation::from(caller),
                    })?;
                let mut out = Vec::with_capacity(3 + bytes.len());
                out.push(TAG_CMD_TYPE_TEXT);
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(bytes);
                out
            }
            OutboundFrame::StatusQuery => vec![TAG_CMD_STATUS_QUERY],
        })
    }
}

/// A device → host frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Unsolicited: the device moved the pointer.
    MouseMove {
        /// Reported x.
        x: i32,
        /// Reported y.
        y: i32,
    },
    /// Unsolicited: the device actuated a button.
    MouseClick {
        /// Wire button code.
        button: u8,
        /// Wire phase code.
        phase: u8,
    },
    /// Unsolicited: the device actuated a key.
    KeyboardInput {
        /// Virtual key code.
        code: u16,
        /// Wire phase code.
        phase: u8,
    },
    /// Acknowledgment / handshake response.
    StatusResponse {
        /// Device protocol version.
        version: u8,
        /// 0 = ok, anything else is a device-defined failure code.
        status: u8,
    },
    /// Device-reported error.
    Error {
        /// Device-defined error code.
        code: u8,
        /// Human-readable message.
        message: String,
    },
}

impl InboundFrame {
    /// Whether this frame is an unsolicited device notification rather
    /// than a command acknowledgment.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            InboundFrame::MouseMove { .. }
                | InboundFrame::MouseClick { .. }
                | InboundFrame::KeyboardInput { .. }
        )
    }
}

/// Incremental decoder for the inbound byte stream.
///
/// Serial reads deliver arbitrary chunks; the decoder buffers until a
/// complete frame is available. An unknown tag poisons the stream (there
/// is no way to resynchronize a tag-length protocol after a bad tag) and
/// surfaces as a transport error.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transport`] on an unknown tag or malformed
    /// payload; the connection must be torn down after that.
    #[track_caller]
    pub fn next_frame(&mut self) -> CoreResult<Option<InboundFrame>> {
        let Some(&tag) = self.buf.first() else {
            return Ok(None);
        };

        let frame = match tag {
            TAG_MOUSE_MOVE => {
                let Some(payload) = self.payload(8) else {
                    return Ok(None);
                };
                InboundFrame::MouseMove {
                    x: i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
                    y: i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
                }
            }
            TAG_MOUSE_CLICK => {
                let Some(payload) = self.payload(2) else {
                    return Ok(None);
                };
                InboundFrame::MouseClick {
                    button: payload[0],
                    phase: payload[1],
                }
            }
            TAG_KEYBOARD_INPUT => {
                let Some(payload) = self.payload(3) else {
                    return Ok(None);
                };
                InboundFrame::KeyboardInput {
                    code: u16::from_le_bytes([payload[0], payload[1]]),
                    phase: payload[2],
                }
            }
            TAG_STATUS_RESPONSE => {
                let Some(payload) = self.payload(2) else {
                    return Ok(None);
                };
                InboundFrame::StatusResponse {
                    version: payload[0],
                    status: payload[1],
                }
            }
            TAG_ERROR => {
                // [code: u8][len: u8][message: len bytes]
                if self.buf.len() < 3 {
                    return Ok(None);
                }
                let len = self.buf[2] as usize;
                let Some(payload) = self.payload(2 + len) else {
                    return Ok(None);
                };
                InboundFrame::Error {
                    code: payload[0],
                    message: String::from_utf8_lossy(&payload[2..]).into_owned(),
                }
            }
            unknown => {
                return Err(CoreError::Transport {
                    reason: format!("unknown inbound frame tag 0x{unknown:02X}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        Ok(Some(frame))
    }

    /// Take `len` payload bytes (plus the tag) off the buffer if present.
    fn payload(&mut self, len: usize) -> Option<Vec<u8>> {
        if self.buf.len() < 1 + len {
            return None;
        }
        let payload = self.buf[1..=len].to_vec();
        self.buf.drain(..=len);
        Some(payload)
    }
}

/// Wire code for a mouse button.
#[must_use]
pub fn button_code(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Right => 1,
        MouseButton::Middle => 2,
        MouseButton::X1 => 3,
        MouseButton::X2 => 4,
    }
}

/// Wire code for a click phase.
#[must_use]
pub fn click_phase_code(phase: ClickPhase) -> u8 {
    match phase {
        ClickPhase::Down => 0,
        ClickPhase::Up => 1,
        ClickPhase::Click => 2,
    }
}

/// Wire code for a key phase.
#[must_use]
pub fn key_phase_code(phase: KeyPhase) -> u8 {
    match phase {
        KeyPhase::Down => 0,
        KeyPhase::Up => 1,
    }
}
