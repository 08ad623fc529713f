//! Persisted "already completed" flags.
//!
//! A small JSON file mapping surface names to the time they first ran to
//! completion. `textplay run --state-file` reads it to decide whether a
//! surface starts in its terminal state and records new completions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StateError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FlagFile {
    #[serde(default)]
    completed: BTreeMap<String, DateTime<Utc>>,
}

/// File-backed completion flags.
#[derive(Debug, Clone)]
pub struct FlagStore {
    path: PathBuf,
}

impl FlagStore {
    /// Store backed by `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When `surface` first completed, if it has.
    ///
    /// A missing file means nothing has completed. An unparsable file is
    /// logged and treated the same way.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Read`] if the file exists but can't be read.
    pub fn completed_at(&self, surface: &str) -> Result<Option<DateTime<Utc>>, StateError> {
        Ok(self.read()?.completed.get(surface).copied())
    }

    /// Whether `surface` has completed before.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Read`] if the file exists but can't be read.
    pub fn is_completed(&self, surface: &str) -> Result<bool, StateError> {
        Ok(self.completed_at(surface)?.is_some())
    }

    /// Records a completion of `surface`. The first completion time is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the file can't be read or written.
    pub fn mark_completed(&self, surface: &str) -> Result<(), StateError> {
        let mut flags = self.read()?;
        if flags.completed.contains_key(surface) {
            return Ok(());
        }
        flags.completed.insert(surface.to_string(), Utc::now());
        debug!(surface, path = %self.path.display(), "recording completion");
        self.write(&flags)
    }

    /// Forgets `surface` so it plays from the start next time.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the file can't be read or written.
    pub fn clear(&self, surface: &str) -> Result<(), StateError> {
        let mut flags = self.read()?;
        if flags.completed.remove(surface).is_some() {
            self.write(&flags)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<FlagFile, StateError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FlagFile::default()),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        match serde_json::from_str(&raw) {
            Ok(flags) => Ok(flags),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable state file");
                Ok(FlagFile::default())
            }
        }
    }

    fn write(&self, flags: &FlagFile) -> Result<(), StateError> {
        let write_err = |source| StateError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let body = serde_json::to_string_pretty(flags)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        // Write then rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)
    }
}
