//! Event dispatch.
//!
//! [`Dispatcher::track`] is the only entry point host code needs. It is
//! fire-and-forget: every failure (storage, invalid payload, transport) is
//! logged and swallowed, so the host's execution path never sees an error
//! from telemetry.
//!
//! # Flow
//!
//! ```text
//! gate disabled? --yes--> return (no I/O)
//!      |no
//! debug mode? --> pick debug or production sink
//!      |
//! IdentityCache::get_userid --err--> warn, abort
//!      |
//! stamp user_id, to_mapping --> Sink::send (one attempt)
//! ```

use std::sync::Arc;

use tally_types::UsageEvent;
use tracing::{debug, warn};

use crate::cache::IdentityCache;
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::gate::TrackingGate;
use crate::sink::{HttpSink, LogSink, Sink};
use crate::store::JsonFileStore;

/// What happened to a tracked event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Tracking is disabled; nothing was read or sent.
    Disabled,
    /// The payload was handed to the named sink successfully.
    Sent {
        /// [`Sink::name`] of the sink used.
        sink: &'static str,
    },
    /// Something failed and the event was dropped.
    Failed,
}

/// Sends usage events when the gate allows it.
#[derive(Debug)]
pub struct Dispatcher {
    gate: TrackingGate,
    identity: Arc<IdentityCache>,
    production: Sink,
    debug: Sink,
    library_version: String,
}

impl Dispatcher {
    /// Dispatcher from explicit parts.
    pub const fn new(
        gate: TrackingGate,
        identity: Arc<IdentityCache>,
        production: Sink,
        debug: Sink,
    ) -> Self {
        Self {
            gate,
            identity,
            production,
            debug,
            library_version: String::new(),
        }
    }

    /// Production dispatcher wired from configuration.
    ///
    /// Uses an environment-reading gate, a JSON file identity store at
    /// [`TelemetryConfig::identity_path`], an HTTP sink for `endpoint`, and
    /// for debug mode either an HTTP sink for `debug_endpoint` or a log-only
    /// sink when none is configured.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let path = config.identity_path().ok_or_else(|| {
            TelemetryError::Config("cannot resolve a user data directory".to_owned())
        })?;
        let identity = Arc::new(IdentityCache::new(JsonFileStore::new(path)));

        let production = Sink::from(HttpSink::new(config.endpoint.as_str(), config.timeout())?);
        let debug = match &config.debug_endpoint {
            Some(url) => Sink::from(HttpSink::new(url.as_str(), config.timeout())?),
            None => Sink::from(LogSink),
        };

        Ok(Self::new(config.gate(), identity, production, debug)
            .with_library_version(config.library_version.as_str()))
    }

    /// Stamp `version` on events that do not carry one.
    #[must_use]
    pub fn with_library_version(mut self, version: impl Into<String>) -> Self {
        self.library_version = version.into();
        self
    }

    /// The gate consulted on every call.
    pub const fn gate(&self) -> &TrackingGate {
        &self.gate
    }

    /// The shared identity cache.
    pub fn identity(&self) -> &Arc<IdentityCache> {
        &self.identity
    }

    /// Track an event. Never fails and never panics.
    pub async fn track(&self, event: &UsageEvent) {
        self.try_track(event).await;
    }

    /// Track an event and report what happened.
    ///
    /// The outcome is informational only; failures have already been
    /// logged by the time it is returned.
    pub async fn try_track(&self, event: &UsageEvent) -> TrackOutcome {
        let flags = self.gate.flags();
        if flags.opt_out {
            return TrackOutcome::Disabled;
        }
        let sink = if flags.debug { &self.debug } else { &self.production };

        if let Err(e) = event.validate() {
            warn!(event_type = event.event_type(), error = %e, "dropping malformed usage event");
            return TrackOutcome::Failed;
        }

        let user_id = match self.identity.get_userid() {
            Ok(user_id) => user_id,
            Err(e) => {
                warn!(error = %e, "telemetry identity unavailable, skipping event");
                return TrackOutcome::Failed;
            }
        };

        let mut event = event.clone();
        let base = event.base_mut();
        base.user_id = user_id.into_inner();
        if base.library_version.is_empty() {
            base.library_version.clone_from(&self.library_version);
        }
        let payload = event.to_mapping();

        match sink.send(&payload).await {
            Ok(()) => {
                debug!(
                    event_type = event.event_type(),
                    sink = sink.name(),
                    debug_mode = flags.debug,
                    "usage event sent"
                );
                TrackOutcome::Sent { sink: sink.name() }
            }
            Err(e) => {
                warn!(
                    event_type = event.event_type(),
                    sink = sink.name(),
                    error = %e,
                    "failed to send usage event"
                );
                TrackOutcome::Failed
            }
        }
    }
}
