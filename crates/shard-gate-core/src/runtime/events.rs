// crates/shard-gate-core/src/runtime/events.rs
// ============================================================================
// Module: Event Sinks
// Description: Structured diagnostic sinks for coordinator and harness events.
// Purpose: Emit JSON-line events without binding to a logging backend.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Sinks receive [`GateEvent`] values and route them somewhere. The stderr
//! and file sinks write one JSON object per line, with the event fields
//! flattened next to a `timestamp_ms` field. Sink failures are swallowed:
//! diagnostics never change the outcome of an apply or benchmark.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::interfaces::EventSink;
use crate::interfaces::GateEvent;

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Serialized form of one event line.
#[derive(Serialize)]
struct EventLine<'a> {
    /// Event timestamp (milliseconds since epoch).
    timestamp_ms: u128,
    /// Event payload.
    #[serde(flatten)]
    event: &'a GateEvent,
}

/// Renders an event as a single JSON line (without the newline).
fn render(event: &GateEvent) -> Option<String> {
    let timestamp_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    serde_json::to_string(&EventLine {
        timestamp_ms,
        event,
    })
    .ok()
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Event sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn record(&self, event: &GateEvent) {
        if let Some(payload) = render(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Event sink that appends JSON lines to a file.
pub struct FileEventSink {
    /// File handle guarded for concurrent writers.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens a file-backed event sink in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileEventSink {
    fn record(&self, event: &GateEvent) {
        if let Some(payload) = render(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op event sink.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _event: &GateEvent) {}
}

/// Forwards each event to every inner sink, in order.
#[derive(Default)]
pub struct FanoutEventSink {
    /// Inner sinks.
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    /// Creates a fanout over `sinks`.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            sinks,
        }
    }

    /// Adds a sink to the end of the fanout.
    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for FanoutEventSink {
    fn record(&self, event: &GateEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

/// Event sink that keeps every event in memory, for tests and reports.
#[derive(Default)]
pub struct RecordingEventSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<GateEvent>>,
}

impl RecordingEventSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<GateEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl EventSink for RecordingEventSink {
    fn record(&self, event: &GateEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests unwrap known-good fixtures.")]
mod tests {
    use std::sync::Arc;

    use super::FanoutEventSink;
    use super::FileEventSink;
    use super::RecordingEventSink;
    use super::render;
    use crate::core::ShardKey;
    use crate::interfaces::EventSink;
    use crate::interfaces::GateEvent;

    #[test]
    fn render_flattens_event_next_to_timestamp() {
        let line = render(&GateEvent::ShardCommitted {
            shard_key: ShardKey::parse("c").unwrap(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "shard_committed");
        assert_eq!(value["shard_key"], "c");
        assert!(value["timestamp_ms"].as_u64().is_some());
    }

    #[test]
    fn render_handles_unit_variant() {
        let line = render(&GateEvent::ExecuteStarted).unwrap();
        assert!(line.contains("\"event\":\"execute_started\""));
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let sink = FileEventSink::new(&path).unwrap();
        sink.record(&GateEvent::ExecuteStarted);
        sink.record(&GateEvent::FinalizeStarted {
            commit: true,
        });
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn fanout_forwards_to_every_sink() {
        let first = Arc::new(RecordingEventSink::new());
        let second = Arc::new(RecordingEventSink::new());
        let fanout = FanoutEventSink::new(vec![Arc::clone(&first) as Arc<dyn EventSink>, Arc::clone(&second) as Arc<dyn EventSink>]);
        fanout.record(&GateEvent::ExecuteStarted);
        assert_eq!(first.events(), vec![GateEvent::ExecuteStarted]);
        assert_eq!(second.events(), vec![GateEvent::ExecuteStarted]);
    }
}
