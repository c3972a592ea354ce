//! Run telemetry: events delivered off the run thread to a sink.
//!
//! The [`Tracker`] owns a bounded queue and one worker thread. Sending never
//! blocks the run: when the queue is full the event is dropped. Reports go
//! to `tracing` by default, or are appended as JSON lines to the file named
//! by `RELAY_ANALYTICS_FILE`.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

pub const ANALYTICS_FILE_ENV_KEY: &str = "RELAY_ANALYTICS_FILE";

const QUEUE_CAPACITY: usize = 256;

/// One telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl TelemetryEvent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            timestamp: Utc::now(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Where telemetry records end up.
pub trait TelemetrySink: Send {
    fn record(&mut self, event: &TelemetryEvent) -> Result<()>;
}

/// Reports events as `tracing` debug records.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&mut self, event: &TelemetryEvent) -> Result<()> {
        tracing::debug!(event = %event.name, properties = ?event.properties, "telemetry");
        Ok(())
    }
}

/// Appends each event as one JSON line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TelemetrySink for JsonLinesSink {
    fn record(&mut self, event: &TelemetryEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// The sink selected by the environment.
pub fn default_sink() -> Box<dyn TelemetrySink> {
    match std::env::var(ANALYTICS_FILE_ENV_KEY) {
        Ok(path) if !path.trim().is_empty() => Box::new(JsonLinesSink::new(path)),
        _ => Box::new(LogSink),
    }
}

/// Background delivery of telemetry events.
pub struct Tracker {
    sender: Option<SyncSender<TelemetryEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl Tracker {
    /// Start the worker thread.
    pub fn start(mut sink: Box<dyn TelemetrySink>) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<TelemetryEvent>(QUEUE_CAPACITY);
        let worker = thread::spawn(move || {
            for event in receiver {
                if let Err(err) = sink.record(&event) {
                    tracing::warn!("Failed to record telemetry event '{}': {}", event.name, err);
                }
            }
        });
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Queue an event without blocking.
    pub fn send(&self, event: TelemetryEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!("Telemetry queue full, dropping '{}'", event.name);
            }
            Err(TrySendError::Disconnected(event)) => {
                tracing::debug!("Telemetry worker gone, dropping '{}'", event.name);
            }
        }
    }

    /// Close the queue and wait until every queued event is delivered.
    pub fn wait(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Telemetry worker panicked");
            }
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Collect(Arc<Mutex<Vec<String>>>);

    impl TelemetrySink for Collect {
        fn record(&mut self, event: &TelemetryEvent) -> Result<()> {
            self.0.lock().unwrap().push(event.name.clone());
            Ok(())
        }
    }

    #[test]
    fn delivers_events_in_order_before_wait_returns() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = Tracker::start(Box::new(Collect(seen.clone())));
        tracker.send(TelemetryEvent::new("first"));
        tracker.send(TelemetryEvent::new("second"));
        tracker.wait();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn drop_drains_queue() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let tracker = Tracker::start(Box::new(Collect(seen.clone())));
            tracker.send(TelemetryEvent::new("only"));
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn send_after_wait_is_ignored() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = Tracker::start(Box::new(Collect(seen.clone())));
        tracker.wait();
        tracker.send(TelemetryEvent::new("late"));
        tracker.wait();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn json_lines_sink_appends() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("analytics.jsonl");
        let mut sink = JsonLinesSink::new(&path);
        sink.record(&TelemetryEvent::new("a").with("step", "hello"))
            .unwrap();
        sink.record(&TelemetryEvent::new("b").with("exit_code", 1))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["name"], "a");
        assert_eq!(lines[0]["properties"]["step"], "hello");
        assert_eq!(lines[1]["properties"]["exit_code"], 1);
    }

    #[test]
    fn event_builder_collects_properties() {
        let event = TelemetryEvent::new("step_finished")
            .with("status", "success")
            .with("duration_ms", 12u64);
        assert_eq!(event.properties.len(), 2);
        assert_eq!(event.properties["status"], "success");
    }
}
