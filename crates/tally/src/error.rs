//! Error types for the telemetry client.
//!
//! None of these ever reach the host application through
//! [`Dispatcher::track`](crate::Dispatcher::track); they surface from the
//! lower-level components so the dispatcher can log them and give up on
//! the current event.

use std::path::PathBuf;

use tally_types::EventError;

/// Errors that can occur inside the telemetry pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The identity file could not be written (or its directory created).
    #[error("identity storage error at {}: {source}", path.display())]
    Storage {
        /// File or directory that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The collector was unreachable or rejected the payload.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration is invalid or a client could not be built from it.
    #[error("config error: {0}")]
    Config(String),

    /// The event payload has the wrong shape.
    #[error("invalid event: {0}")]
    Event(#[from] EventError),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl TelemetryError {
    /// Build a [`TelemetryError::Storage`] for `path`.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
