//! Event destinations.
//!
//! Uses enum dispatch rather than trait objects because async methods are
//! not dyn-compatible. The dispatcher holds one sink for production and one
//! for debug mode and calls [`Sink::send`] once per event.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tally_types::EventMapping;
use tracing::info;

use crate::error::TelemetryError;

// ---------------------------------------------------------------------------
// Unified sink enum
// ---------------------------------------------------------------------------

/// A destination for serialized events.
#[derive(Debug, Clone)]
pub enum Sink {
    /// POST to a remote collector.
    Http(HttpSink),
    /// Log locally, send nothing.
    Log(LogSink),
    /// Keep payloads in memory.
    Memory(MemorySink),
}

impl Sink {
    /// Deliver one payload. A single attempt, no retries.
    pub async fn send(&self, payload: &EventMapping) -> Result<(), TelemetryError> {
        match self {
            Self::Http(sink) => sink.send(payload).await,
            Self::Log(sink) => {
                sink.send(payload);
                Ok(())
            }
            Self::Memory(sink) => {
                sink.send(payload);
                Ok(())
            }
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Log(_) => "log",
            Self::Memory(_) => "memory",
        }
    }
}

impl From<HttpSink> for Sink {
    fn from(sink: HttpSink) -> Self {
        Self::Http(sink)
    }
}

impl From<LogSink> for Sink {
    fn from(sink: LogSink) -> Self {
        Self::Log(sink)
    }
}

impl From<MemorySink> for Sink {
    fn from(sink: MemorySink) -> Self {
        Self::Memory(sink)
    }
}

// ---------------------------------------------------------------------------
// HTTP collector
// ---------------------------------------------------------------------------

/// Sends payloads as JSON via HTTP POST with a short timeout.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    /// Sink posting to `endpoint`, giving up after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// The collector URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, payload: &EventMapping) -> Result<(), TelemetryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| TelemetryError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Transport(format!(
                "collector returned {status}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Local log
// ---------------------------------------------------------------------------

/// Writes each payload to the `tracing` log at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    fn send(self, payload: &EventMapping) {
        let event_type = payload
            .get("event_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let body = serde_json::Value::Object(payload.clone());
        info!(event_type, payload = %body, "tracking payload");
    }
}

// ---------------------------------------------------------------------------
// In-memory recorder
// ---------------------------------------------------------------------------

/// Records payloads in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    sent: Arc<Mutex<Vec<EventMapping>>>,
}

impl MemorySink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<EventMapping> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of payloads sent so far.
    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been sent.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn send(&self, payload: &EventMapping) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(event_type: &str) -> EventMapping {
        let mut map = EventMapping::new();
        map.insert("event_type".to_owned(), event_type.into());
        map.insert("user_id".to_owned(), "a-test".into());
        map
    }

    #[tokio::test]
    async fn memory_sink_records_in_order() -> Result<(), TelemetryError> {
        let recorder = MemorySink::new();
        let sink = Sink::from(recorder.clone());
        assert!(recorder.is_empty());

        sink.send(&payload("evaluation")).await?;
        sink.send(&payload("testset_generation")).await?;

        let sent = recorder.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent.first().and_then(|p| p.get("event_type")),
            Some(&serde_json::Value::from("evaluation"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn log_sink_never_fails() {
        assert!(Sink::from(LogSink).send(&payload("evaluation")).await.is_ok());
    }

    #[test]
    fn sink_names() -> Result<(), TelemetryError> {
        let http = HttpSink::new("https://collector.example.com", Duration::from_secs(1))?;
        assert_eq!(http.endpoint(), "https://collector.example.com");
        assert_eq!(Sink::from(http).name(), "http");
        assert_eq!(Sink::from(LogSink).name(), "log");
        assert_eq!(Sink::from(MemorySink::new()).name(), "memory");
        Ok(())
    }
}
