//! Tally -- opt-out, anonymous usage telemetry for libraries.
//!
//! A host library builds a [`Dispatcher`] once at startup and calls
//! [`Dispatcher::track`] after notable operations (an evaluation run, a
//! test-set generation). Events carry an anonymous per-installation
//! identifier persisted in `<user data dir>/<app>/uuid.json`, and are
//! posted to a collector unless the user opted out.
//!
//! Telemetry never affects the host: `track` cannot fail, storage is read
//! at most once per process, and each event gets a single short-timeout
//! send attempt.
//!
//! # Opt-out
//!
//! ```bash
//! # Via environment variable (checked on every event)
//! export TALLY_DO_NOT_TRACK=true
//!
//! # Route events to the debug destination instead of production
//! export TALLY_DEBUG_TRACKING=true
//! ```
//!
//! Or in a YAML config file loaded with [`TelemetryConfig::from_file`]:
//!
//! ```yaml
//! do_not_track: true
//! ```
//!
//! # Modules
//!
//! - [`store`] -- JSON identity file and platform data-dir resolution
//! - [`cache`] -- Memoized, thread-safe identity accessor
//! - [`gate`] -- Opt-out and debug flag evaluation
//! - [`sink`] -- HTTP, log and in-memory destinations
//! - [`dispatch`] -- The fire-and-forget dispatcher
//! - [`config`] -- Layered configuration
//! - [`error`] -- Error types

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod sink;
pub mod store;

pub use cache::IdentityCache;
pub use config::{ConfigError, TelemetryConfig};
pub use dispatch::{Dispatcher, TrackOutcome};
pub use error::TelemetryError;
pub use gate::{TrackingFlags, TrackingGate};
pub use sink::{HttpSink, LogSink, MemorySink, Sink};
pub use store::{IDENTITY_FILE_NAME, IdentityStore, JsonFileStore, load_or_create, user_data_dir};

pub use tally_types::{
    BaseEvent, EvaluationEvent, EventError, EventMapping, TestsetGenerationEvent, UsageEvent,
    UserId,
};
