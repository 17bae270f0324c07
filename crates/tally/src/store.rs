//! Persistent identity storage.
//!
//! The identity lives in a single JSON file, `{"userid": "<id>"}`, under
//! the platform user-data directory. Loading never fails on a bad file:
//! a missing, unreadable or corrupt file is replaced by a freshly generated
//! identifier. Only the write of that replacement can fail.
//!
//! There is no cross-process locking. Two processes racing on a fresh path
//! may both write; the last writer wins and each keeps the value it wrote
//! for its own lifetime.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tally_types::UserId;
use tracing::{debug, info, warn};

use crate::error::TelemetryError;

/// File name of the identity file inside the app's data directory.
pub const IDENTITY_FILE_NAME: &str = "uuid.json";

/// On-disk shape of the identity file.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    userid: String,
}

/// A backing store that yields a stable identifier.
pub trait IdentityStore: Send + Sync {
    /// Return the persisted identifier, creating and persisting one if needed.
    fn load_or_create(&self) -> Result<UserId, TelemetryError>;
}

/// [`IdentityStore`] backed by a JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store reading and writing `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<platform user-data dir>/<app_name>/uuid.json`.
    ///
    /// Returns `None` when no home directory can be resolved.
    pub fn for_app(app_name: &str) -> Option<Self> {
        user_data_dir(app_name).map(|dir| Self::new(dir.join(IDENTITY_FILE_NAME)))
    }

    /// Path of the identity file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for JsonFileStore {
    fn load_or_create(&self) -> Result<UserId, TelemetryError> {
        load_or_create(&self.path)
    }
}

/// Load the identifier stored at `path`, or create and persist a new one.
pub fn load_or_create(path: &Path) -> Result<UserId, TelemetryError> {
    if let Some(existing) = read_identity(path) {
        return Ok(existing);
    }

    let user_id = UserId::generate();
    write_identity(path, &user_id)?;
    info!(path = %path.display(), "created telemetry identity file");
    Ok(user_id)
}

/// Read a usable identifier from `path`. Any problem yields `None`.
fn read_identity(path: &Path) -> Option<UserId> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no telemetry identity file yet");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable telemetry identity file, regenerating");
            return None;
        }
    };

    match serde_json::from_str::<IdentityFile>(&contents) {
        Ok(file) => {
            let parsed = UserId::parse(file.userid);
            if parsed.is_none() {
                warn!(path = %path.display(), "empty userid in telemetry identity file, regenerating");
            }
            parsed
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt telemetry identity file, regenerating");
            None
        }
    }
}

fn write_identity(path: &Path, user_id: &UserId) -> Result<(), TelemetryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TelemetryError::storage(parent, e))?;
    }
    let body = serde_json::to_string(&IdentityFile {
        userid: user_id.as_str().to_owned(),
    })?;
    std::fs::write(path, body).map_err(|e| TelemetryError::storage(path, e))
}

/// Platform user-data directory for `app_name`.
///
/// - Linux and other Unix: `$XDG_DATA_HOME/<app>` or `~/.local/share/<app>`
/// - macOS: `~/Library/Application Support/<app>`
/// - Windows: `%APPDATA%\<app>`
pub fn user_data_dir(app_name: &str) -> Option<PathBuf> {
    platform_data_root().map(|root| root.join(app_name))
}

#[cfg(target_os = "macos")]
fn platform_data_root() -> Option<PathBuf> {
    home_dir().map(|h| h.join("Library").join("Application Support"))
}

#[cfg(target_os = "windows")]
fn platform_data_root() -> Option<PathBuf> {
    std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|h| h.join("AppData").join("Roaming")))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_data_root() -> Option<PathBuf> {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| home_dir().map(|h| h.join(".local").join("share")))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
