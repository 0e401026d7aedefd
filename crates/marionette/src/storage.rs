//! Script persistence over a scripts directory.
//!
//! One JSON file per script, named by the script's id. Writes use the
//! same temp-then-rename pattern as the configuration file.

use crate::{AppError, AppResult};

use marionette_core::{Command, Script};

use std::{
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
};

use error_location::ErrorLocation;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Filesystem-backed store for recorded scripts.
#[derive(Debug)]
pub struct ScriptStore {
    dir: PathBuf,
}

impl ScriptStore {
    /// Create a store over the given directory, creating it if needed.
    #[track_caller]
    pub fn new(dir: PathBuf) -> AppResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            debug!(dir = ?dir, "Created scripts directory");
        }
        Ok(Self { dir })
    }

    /// Save a script, overwriting any previous version.
    #[track_caller]
    #[instrument(skip(self, script), fields(script_id = %script.id))]
    pub fn save(&self, script: &Script) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(script).map_err(|e| AppError::StorageError {
            reason: format!("Failed to serialize script: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Self::write_atomic(&self.script_path(script.id), &contents)?;

        info!(name = script.name(), commands = script.len(), "Script saved");

        Ok(())
    }

    /// Load a script by id.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn load(&self, id: Uuid) -> AppResult<Script> {
        let path = self.script_path(id);
        let script = Self::read_script(&path)?;

        script.validate().map_err(|e| AppError::StorageError {
            reason: format!("Stored script {} failed validation: {}", id, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(script)
    }

    /// Load every script in the store.
    ///
    /// Unreadable entries are skipped with a warning so one corrupt file
    /// does not hide the rest of the library.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn list(&self) -> AppResult<Vec<Script>> {
        let mut scripts = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_script(&path) {
                Ok(script) => scripts.push(script),
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable script"),
            }
        }

        scripts.sort_by(|a, b| a.name().cmp(b.name()));

        Ok(scripts)
    }

    /// Copy a stored script to an external path for sharing.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn export(&self, id: Uuid, path: &Path) -> AppResult<()> {
        let script = self.load(id)?;

        let contents = serde_json::to_string_pretty(&script).map_err(|e| {
            AppError::StorageError {
                reason: format!("Failed to serialize script: {}", e),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        Self::write_atomic(path, &contents)?;

        info!(name = script.name(), "Script exported");

        Ok(())
    }

    /// Import a script from an external file under a fresh identity.
    ///
    /// Commands, delays, name, and trigger hotkey are preserved; the
    /// script id, command ids, and timestamps are newly minted so the
    /// import never collides with an existing store entry.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn import(&self, path: &Path) -> AppResult<Script> {
        let source = Self::read_script(path)?;

        let mut script = Script::new(source.name()).map_err(|e| AppError::StorageError {
            reason: format!("Imported script has an invalid name: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        for command in source.commands() {
            script.push(Command::new(command.kind.clone(), command.delay));
        }
        script.set_hotkey(source.hotkey);

        script.validate().map_err(|e| AppError::StorageError {
            reason: format!("Imported script failed validation: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        self.save(&script)?;

        info!(name = script.name(), id = %script.id, "Script imported");

        Ok(script)
    }

    fn script_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    #[track_caller]
    fn read_script(path: &Path) -> AppResult<Script> {
        let contents = fs::read_to_string(path).map_err(|e| AppError::StorageError {
            reason: format!("Failed to read script file {:?}: {}", path, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        serde_json::from_str(&contents).map_err(|e| AppError::StorageError {
            reason: format!("Failed to parse script file {:?}: {}", path, e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    #[track_caller]
    fn write_atomic(path: &Path, contents: &str) -> AppResult<()> {
        let temp_path = path.with_extension("json.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::StorageError {
            reason: format!("Failed to create temp script file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::StorageError {
                reason: format!("Failed to write temp script file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::StorageError {
            reason: format!("Failed to sync temp script file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, path).map_err(|e| AppError::StorageError {
            reason: format!("Failed to rename temp script to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(())
    }
}
