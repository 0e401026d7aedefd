//! Trigger hotkey definitions for scripts and application actions.

use crate::{CoreError, CoreResult, keys::KeyCode};

use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
    panic::Location,
};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};

/// A bit set of modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(u8);

impl Modifiers {
    /// No modifiers.
    pub const NONE: Modifiers = Modifiers(0);
    /// Control.
    pub const CONTROL: Modifiers = Modifiers(1 << 0);
    /// Alt / Option.
    pub const ALT: Modifiers = Modifiers(1 << 1);
    /// Shift.
    pub const SHIFT: Modifiers = Modifiers(1 << 2);
    /// Meta / Windows / Command.
    pub const META: Modifiers = Modifiers(1 << 3);

    /// Whether all bits of `other` are set in `self`.
    #[must_use]
    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no modifier bit is set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Modifiers) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (bit, name) in [
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::META, "Meta"),
        ] {
            if self.contains(bit) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("(none)")?;
        }
        Ok(())
    }
}

/// How a hotkey fires while held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Fire once per physical press.
    FireOncePerPress,
    /// Fire repeatedly while the chord is held.
    RepeatWhileHeld,
}

/// A trigger hotkey: modifier chord plus a primary key.
///
/// Immutable once constructed; edits replace the whole definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyDefinition {
    /// Modifier chord.
    pub modifiers: Modifiers,
    /// The primary (non-modifier) key.
    pub key: KeyCode,
    /// Firing behavior while held.
    pub mode: TriggerMode,
    /// Whether the keystroke is swallowed instead of delivered onward.
    pub swallow: bool,
}

impl HotkeyDefinition {
    /// Construct and validate a definition.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the primary key is itself a
    /// modifier, is unrecognized, or the combination would fire during
    /// ordinary typing (no modifiers on a non-function key).
    #[track_caller]
    pub fn new(
        modifiers: Modifiers,
        key: KeyCode,
        mode: TriggerMode,
        swallow: bool,
    ) -> CoreResult<Self> {
        let definition = Self {
            modifiers,
            key,
            mode,
            swallow,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Re-check the combination rules (used after deserialization).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] describing the violation.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        let caller = Location::caller();
        let fail = |reason: String| {
            Err(CoreError::Validation {
                reason,
                location: ErrorLocation::from(caller),
            })
        };

        if self.key.is_modifier() {
            return fail(format!(
                "hotkey primary key 0x{:02X} is a modifier",
                self.key.0
            ));
        }
        if !self.key.is_recognized() {
            return fail(format!("hotkey primary key 0x{:02X} is unknown", self.key.0));
        }
        // A bare printable key would trigger on every keystroke of normal
        // typing; only function keys may go unmodified.
        if self.modifiers.is_empty() && !self.key.is_function_key() {
            return fail(format!(
                "hotkey on key 0x{:02X} requires at least one modifier",
                self.key.0
            ));
        }

        Ok(())
    }
}

impl fmt::Display for HotkeyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "0x{:02X}", self.key.0)
        } else {
            write!(f, "{}+0x{:02X}", self.modifiers, self.key.0)
        }
    }
}
