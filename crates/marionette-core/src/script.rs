//! Script aggregate: an ordered command sequence plus metadata.

use crate::{
    Command, CoreError, CoreResult,
    hotkey::HotkeyDefinition,
};

use std::{
    panic::Location,
    time::{Duration, SystemTime},
};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered command sequence with identity, name, and optional trigger.
///
/// Every mutating operation advances `modified_at` monotonically. The
/// engine never executes a `Script` directly; it takes a [`Script::snapshot`]
/// at start so concurrent edits cannot reorder an in-flight run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Stable identity.
    pub id: Uuid,
    name: String,
    commands: Vec<Command>,
    /// Optional trigger hotkey.
    pub hotkey: Option<HotkeyDefinition>,
    /// Creation time, milliseconds since the unix epoch.
    #[serde(with = "crate::command::system_time_millis")]
    pub created_at: SystemTime,
    /// Last-modification time; advances on every mutation.
    #[serde(with = "crate::command::system_time_millis")]
    pub modified_at: SystemTime,
    /// Opaque alternate source representation.
    ///
    /// Stored and round-tripped untouched for the external raw-source
    /// executor; the command list is authoritative for this engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_source: Option<String>,
}

impl Script {
    /// Create an empty script with a trimmed, non-blank name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the name is blank.
    #[track_caller]
    pub fn new(name: &str) -> CoreResult<Self> {
        let name = validated_name(name)?;
        let now = SystemTime::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            commands: Vec::new(),
            hotkey: None,
            created_at: now,
            modified_at: now,
            raw_source: None,
        })
    }

    /// Infallible constructor for generated names (recorder finalization).
    pub(crate) fn untitled() -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            name: "Recording".to_string(),
            commands: Vec::new(),
            hotkey: None,
            created_at: now,
            modified_at: now,
            raw_source: None,
        }
    }

    /// The script name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command sequence, in execution order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the script has no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Clone the command list for execution.
    ///
    /// Execution always reads a start-time snapshot, so editing the script
    /// while a session runs is permitted.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Command> {
        self.commands.clone()
    }

    /// Sum of every command's delay plus sleep durations.
    #[must_use]
    pub fn estimated_duration(&self) -> Duration {
        self.commands.iter().map(Command::time_cost).sum()
    }

    /// Rename the script.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the new name is blank.
    #[track_caller]
    pub fn rename(&mut self, name: &str) -> CoreResult<()> {
        self.name = validated_name(name)?;
        self.touch();
        Ok(())
    }

    /// Append a command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
        self.touch();
    }

    /// Insert a command at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `index` is past the end.
    #[track_caller]
    pub fn insert(&mut self, index: usize, command: Command) -> CoreResult<()> {
        if index > self.commands.len() {
            return Err(out_of_range(index, self.commands.len()));
        }
        self.commands.insert(index, command);
        self.touch();
        Ok(())
    }

    /// Remove and return the command at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `index` is out of range.
    #[track_caller]
    pub fn remove(&mut self, index: usize) -> CoreResult<Command> {
        if index >= self.commands.len() {
            return Err(out_of_range(index, self.commands.len()));
        }
        let removed = self.commands.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Move the command at `from` to position `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if either index is out of range.
    #[track_caller]
    pub fn move_command(&mut self, from: usize, to: usize) -> CoreResult<()> {
        let len = self.commands.len();
        if from >= len || to >= len {
            return Err(out_of_range(from.max(to), len));
        }
        let command = self.commands.remove(from);
        self.commands.insert(to, command);
        self.touch();
        Ok(())
    }

    /// Replace the command at `index`, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `index` is out of range.
    #[track_caller]
    pub fn replace(&mut self, index: usize, command: Command) -> CoreResult<Command> {
        if index >= self.commands.len() {
            return Err(out_of_range(index, self.commands.len()));
        }
        let previous = std::mem::replace(&mut self.commands[index], command);
        self.touch();
        Ok(previous)
    }

    /// Edit the delay of the command at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `index` is out of range.
    #[track_caller]
    pub fn set_delay(&mut self, index: usize, delay: Duration) -> CoreResult<()> {
        if index >= self.commands.len() {
            return Err(out_of_range(index, self.commands.len()));
        }
        self.commands[index].delay = delay;
        self.touch();
        Ok(())
    }

    /// Remove all commands.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.touch();
    }

    /// Set or clear the trigger hotkey.
    pub fn set_hotkey(&mut self, hotkey: Option<HotkeyDefinition>) {
        self.hotkey = hotkey;
        self.touch();
    }

    /// Validate the whole aggregate: name, every command, the hotkey.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for the first violation found.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        validated_name(&self.name)?;
        for command in &self.commands {
            command.kind.validate()?;
        }
        if let Some(hotkey) = &self.hotkey {
            hotkey.validate()?;
        }
        Ok(())
    }

    /// Advance `modified_at`, strictly monotonically.
    ///
    /// Wall clocks can step backwards or stand still within a millisecond;
    /// when `now` does not advance past the stored stamp, nudge by 1ms so
    /// observers always see the timestamp move.
    fn touch(&mut self) {
        let now = SystemTime::now();
        self.modified_at = if now > self.modified_at {
            now
        } else {
            self.modified_at + Duration::from_millis(1)
        };
    }
}

#[track_caller]
fn validated_name(name: &str) -> CoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation {
            reason: "script name is blank".to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(trimmed.to_string())
}

#[track_caller]
fn out_of_range(index: usize, len: usize) -> CoreError {
    CoreError::Validation {
        reason: format!("command index {index} out of range (len {len})"),
        location: ErrorLocation::from(Location::caller()),
    }
}
