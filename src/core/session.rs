//! Purpose: Durable client-side storage for the serialized session.
//! Exports: `SessionFile`.
//! Role: The single persisted key of client state; absence means logged out.
//! Invariants: A session is written fully or not at all; partial state never
//! hits disk.
//! Invariants: Malformed persisted data degrades to logged-out (warned, not
//! an error).

use crate::core::error::{Error, ErrorKind};
use crate::core::model::UserInfo;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.json";

/// Handle on the per-user session file under the config directory. Other
/// processes may write or remove the same file; `load` always re-reads the
/// source of truth.
#[derive(Clone, Debug)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: config_dir.into().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted session. Absent or unreadable content is treated
    /// as logged out.
    pub fn load(&self) -> Option<UserInfo> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to read session file");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "malformed session file; treating as logged out");
                None
            }
        }
    }

    /// Persist the session atomically (temp file + rename).
    pub fn store(&self, user: &UserInfo) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to create config directory")
                    .with_source(err)
            })?;
        }
        let raw = serde_json::to_string(user).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode session")
                .with_source(err)
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write session file")
                .with_source(err)
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to replace session file")
                .with_source(err)
        })
    }

    /// Remove the persisted session. Missing file is not an error.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove session file");
            }
        }
    }
}
