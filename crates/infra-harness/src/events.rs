// crates/infra-harness/src/events.rs
// ============================================================================
// Module: Harness Events
// Description: Structured lifecycle events for provisioning test runs.
// Purpose: Emit JSON-lines logs without a global logger.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every externally visible step (tool invocation, retry attempt, teardown,
//! skip) is recorded as a [`HarnessEvent`] through an [`EventSink`]. Sinks
//! serialize events as JSON lines. Event payloads carry redacted text only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::config::ConfigError;
use crate::config::HarnessConfig;


// ============================================================================
// SECTION: Types
// ============================================================================

/// Event classification.
///
/// # Invariants
/// - Variants are stable for log labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A provisioning tool command finished (successfully or not).
    CommandFinished,
    /// A retried action failed one attempt.
    RetryAttemptFailed,
    /// A retried action ran out of attempts.
    RetryExhausted,
    /// A named output satisfied its expectation.
    OutputVerified,
    /// An S3 bucket property was inspected.
    BucketInspected,
    /// A configuration value fell back to its default.
    FallbackUsed,
    /// A scenario was skipped.
    TestSkipped,
    /// The test body panicked.
    TestPanicked,
    /// Teardown started.
    TeardownStarted,
    /// Teardown destroyed the provisioned resources.
    TeardownCompleted,
    /// Teardown gave up; resources may have leaked.
    DestroyExhausted,
}

/// Event outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Step succeeded.
    Ok,
    /// Step failed.
    Error,
    /// Informational record.
    Info,
}

/// Structured harness event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessEvent {
    /// Event classification.
    pub event: EventKind,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Run identifier when known.
    pub run_id: Option<String>,
    /// Operation label (for example `terraform apply`).
    pub operation: String,
    /// Attempt number for retried operations.
    pub attempt: Option<u32>,
    /// Outcome classification.
    pub outcome: EventOutcome,
    /// Elapsed time in milliseconds when measured.
    pub duration_ms: Option<u128>,
    /// Redacted detail message.
    pub message: Option<String>,
}

impl HarnessEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event: EventKind, operation: impl Into<String>, outcome: EventOutcome) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            run_id: None,
            operation: operation.into(),
            attempt: None,
            outcome,
            duration_ms: None,
            message: None,
        }
    }

    /// Attaches a run identifier.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Option<&str>) -> Self {
        self.run_id = run_id.map(str::to_string);
        self
    }

    /// Attaches an attempt number.
    #[must_use]
    pub const fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches an elapsed duration.
    #[must_use]
    pub const fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = Some(elapsed.as_millis());
        self
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for harness events.
pub trait EventSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: &HarnessEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op sink.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _event: &HarnessEvent) {}
}

/// In-memory sink for assertions over emitted events.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Recorded events in emission order.
    events: Mutex<Vec<HarnessEvent>>,
}

impl MemoryEventSink {
    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HarnessEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the kinds of recorded events in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|event| event.event).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the sink selected by configuration: a file sink when an event log
/// path is configured, stderr otherwise.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the event log cannot be opened.
pub fn sink_from_config(config: &HarnessConfig) -> Result<Arc<dyn EventSink>, ConfigError> {
    match &config.event_log {
        Some(path) => {
            let sink = FileEventSink::new(path).map_err(|err| {
                ConfigError::Io(format!("open event log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrEventSink)),
    }
}

/// Builds the sink selected by the process environment
/// (`INFRA_TEST_EVENT_LOG`).
///
/// # Errors
///
/// Returns [`ConfigError`] when the environment is invalid or the event log
/// cannot be opened.
pub fn sink_from_env() -> Result<Arc<dyn EventSink>, ConfigError> {
    sink_from_config(&HarnessConfig::load()?)
}
