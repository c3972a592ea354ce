//! Machine-readable log rendering: one JSON record per line.

use std::io;

use chrono::SecondsFormat;
use serde::Serialize;

use super::events::LogEvent;
use super::{flush_sink, write_sink, Level, LogSink, Logger, LoggerOpts, TimeProvider};

#[derive(Serialize)]
struct MessageRecord<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    record_type: &'static str,
    producer: &'a str,
    producer_id: &'a str,
    level: Level,
    message: &'a str,
}

#[derive(Serialize)]
struct EventRecord<'a, T: Serialize> {
    timestamp: String,
    #[serde(rename = "type")]
    record_type: &'static str,
    producer: &'a str,
    producer_id: &'a str,
    content: T,
}

/// Writes each message and event as a single JSON line.
pub struct JsonLogger {
    sink: LogSink,
    producer: String,
    producer_id: String,
    time_provider: TimeProvider,
    debug: bool,
}

impl JsonLogger {
    pub fn new(opts: &LoggerOpts) -> Self {
        Self {
            sink: opts.sink.clone(),
            producer: opts.producer.clone(),
            producer_id: opts.producer_id.clone(),
            time_provider: opts.time_provider.clone(),
            debug: opts.debug,
        }
    }

    fn timestamp(&self) -> String {
        (self.time_provider)().to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    fn write_record<T: Serialize>(&self, record: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        write_sink(&self.sink, &line)
    }

    fn write_event<T: Serialize>(&self, record_type: &'static str, content: T) -> io::Result<()> {
        self.write_record(&EventRecord {
            timestamp: self.timestamp(),
            record_type,
            producer: &self.producer,
            producer_id: &self.producer_id,
            content,
        })
    }
}

impl Logger for JsonLogger {
    fn log_message(&mut self, message: &str, level: Level) -> io::Result<()> {
        let stripped = console::strip_ansi_codes(message);
        self.write_record(&MessageRecord {
            timestamp: self.timestamp(),
            record_type: "log",
            producer: &self.producer,
            producer_id: &self.producer_id,
            level,
            message: &stripped,
        })
    }

    fn log_event(&mut self, event: &LogEvent<'_>) -> io::Result<()> {
        let record_type = event.event_type();
        match event {
            LogEvent::RelayStarted(plan) => self.write_event(record_type, plan),
            LogEvent::StepStarted(params) => self.write_event(record_type, params),
            LogEvent::StepFinished(params) => self.write_event(record_type, params),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        flush_sink(&self.sink)
    }

    fn is_debug(&self) -> bool {
        self.debug
    }
}
