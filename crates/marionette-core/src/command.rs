//! The command model: tagged variants for a single automation step.
//!
//! Commands are value-like records. Everything except the pre-execution
//! delay is fixed at creation; the delay may be edited after recording.

use crate::{CoreError, CoreResult, keys::KeyCode};

use std::{
    panic::Location,
    time::{Duration, SystemTime},
};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    /// Primary button.
    Left,
    /// Secondary button.
    Right,
    /// Wheel button.
    Middle,
    /// First extended button (usually "back").
    X1,
    /// Second extended button (usually "forward").
    X2,
}

/// Phase of a click command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickPhase {
    /// Button press only.
    Down,
    /// Button release only.
    Up,
    /// Full press-and-release.
    Click,
}

/// Phase of a key command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPhase {
    /// Key press.
    Down,
    /// Key release.
    Up,
}

/// Text payload for a [`CommandKind::TypeText`] command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextInput {
    /// A unicode string typed as-is.
    Text(String),
    /// An ordered list of key codes, each pressed and released.
    Keys(Vec<KeyCode>),
}

/// One automation step, as a closed tagged union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Move the pointer to an absolute screen coordinate.
    MoveAbsolute {
        /// Target x, screen pixels.
        x: i32,
        /// Target y, screen pixels.
        y: i32,
    },
    /// Move the pointer by a delta.
    MoveRelative {
        /// Horizontal delta.
        dx: i16,
        /// Vertical delta.
        dy: i16,
    },
    /// Press, release, or click a mouse button at the current position.
    Click {
        /// Which button.
        button: MouseButton,
        /// Press, release, or full click.
        phase: ClickPhase,
    },
    /// Press or release a single key.
    KeyEvent {
        /// Virtual key code.
        key: KeyCode,
        /// Press or release.
        phase: KeyPhase,
    },
    /// Inject a run of text.
    TypeText {
        /// The text or key-list payload.
        input: TextInput,
    },
    /// Do nothing for a fixed duration.
    Sleep {
        /// How long to sleep.
        #[serde(with = "duration_millis")]
        duration: Duration,
    },
}

impl CommandKind {
    /// Short human-readable description for logs and progress reporting.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            CommandKind::MoveAbsolute { x, y } => format!("move to ({x}, {y})"),
            CommandKind::MoveRelative { dx, dy } => format!("move by ({dx}, {dy})"),
            CommandKind::Click { button, phase } => format!("{phase:?} {button:?} button"),
            CommandKind::KeyEvent { key, phase } => format!("key 0x{:02X} {phase:?}", key.0),
            CommandKind::TypeText {
                input: TextInput::Text(text),
            } => format!("type {} chars", text.chars().count()),
            CommandKind::TypeText {
                input: TextInput::Keys(keys),
            } => format!("type {} keys", keys.len()),
            CommandKind::Sleep { duration } => format!("sleep {}ms", duration.as_millis()),
        }
    }

    /// Validate the variant's payload per the command model rules.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] describing the first violation.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        let caller = Location::caller();
        let fail = |reason: String| {
            Err(CoreError::Validation {
                reason,
                location: ErrorLocation::from(caller),
            })
        };

        match self {
            CommandKind::MoveAbsolute { x, y } => {
                if *x < 0 || *y < 0 {
                    return fail(format!("absolute move target ({x}, {y}) is negative"));
                }
            }
            // Delta range is enforced by the i16 payload type.
            CommandKind::MoveRelative { .. } | CommandKind::Click { .. } => {}
            CommandKind::KeyEvent { key, .. } => {
                if !key.is_recognized() {
                    return fail(format!("unrecognized virtual key 0x{:02X}", key.0));
                }
            }
            CommandKind::TypeText { input } => match input {
                TextInput::Text(text) if text.is_empty() => {
                    return fail("text payload is empty".to_string());
                }
                TextInput::Keys(keys) if keys.is_empty() => {
                    return fail("key list payload is empty".to_string());
                }
                TextInput::Keys(keys) => {
                    if let Some(bad) = keys.iter().find(|k| !k.is_recognized()) {
                        return fail(format!("unrecognized virtual key 0x{:02X} in list", bad.0));
                    }
                }
                TextInput::Text(_) => {}
            },
            // Duration is unsigned, non-negative by construction.
            CommandKind::Sleep { .. } => {}
        }

        Ok(())
    }
}

/// A single recorded or authored automation step.
///
/// Carries stable identity, a creation timestamp, and the delay waited
/// before the step executes. Owned exclusively by its script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Stable identity, preserved across edits.
    pub id: Uuid,
    /// When the command was created, milliseconds since the unix epoch.
    #[serde(with = "system_time_millis")]
    pub created_at: SystemTime,
    /// Wait before executing this command.
    #[serde(with = "duration_millis")]
    pub delay: Duration,
    /// The step itself.
    pub kind: CommandKind,
}

impl Command {
    /// Create a command with a fresh identity and the current timestamp.
    #[must_use]
    pub fn new(kind: CommandKind, delay: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: SystemTime::now(),
            delay,
            kind,
        }
    }

    /// Whether the command passes validation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.kind.validate().is_ok()
    }

    /// This command's contribution to a script's estimated duration:
    /// its delay, plus its sleep duration if it is a sleep.
    #[must_use]
    pub fn time_cost(&self) -> Duration {
        match &self.kind {
            CommandKind::Sleep { duration } => self.delay + *duration,
            _ => self.delay,
        }
    }
}

pub(crate) mod duration_millis {
    //! Serialize `Duration` as whole milliseconds.

    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(de)?))
    }
}

pub(crate) mod system_time_millis {
    //! Serialize `SystemTime` as milliseconds since the unix epoch.

    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SystemTime, ser: S) -> Result<S::Ok, S::Error> {
        let millis = value
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        ser.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<SystemTime, D::Error> {
        Ok(UNIX_EPOCH + Duration::from_millis(u64::deserialize(de)?))
    }
}
