//! Human-readable log rendering.

use std::io;

use chrono::SecondsFormat;

use super::events::{started_messages, LogEvent, StepFinishedParams, StepStartedParams};
use super::summary::{column_border, full_border, full_row, status_row};
use super::{flush_sink, write_sink, Level, LogSink, Logger, LoggerOpts, TimeProvider};

/// Writes colored text, optionally prefixed with timestamp and producer.
pub struct ConsoleLogger {
    sink: LogSink,
    producer: String,
    producer_id: String,
    time_provider: TimeProvider,
    timestamps: bool,
    debug: bool,
}

impl ConsoleLogger {
    pub fn new(opts: &LoggerOpts) -> Self {
        Self {
            sink: opts.sink.clone(),
            producer: opts.producer.clone(),
            producer_id: opts.producer_id.clone(),
            time_provider: opts.time_provider.clone(),
            timestamps: opts.timestamps,
            debug: opts.debug,
        }
    }

    fn prefix(&self) -> String {
        let mut prefixes = Vec::new();
        if self.timestamps {
            let now = (self.time_provider)();
            prefixes.push(format!(
                "[{}]",
                now.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if !self.producer.is_empty() {
            prefixes.push(self.producer.clone());
        }
        if !self.producer_id.is_empty() {
            prefixes.push(self.producer_id.clone());
        }
        prefixes.join(" ")
    }

    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.log_message(&format!("{}\n", line), Level::Normal)?;
        }
        Ok(())
    }

    fn step_started(&mut self, params: &StepStartedParams) -> io::Result<()> {
        let lines = vec![
            full_border(),
            full_row(&format!("({}) {}", params.position, params.title)),
            full_border(),
            full_row(&format!("id: {}", params.step_id)),
            full_row(&format!("uuid: {}", params.uuid)),
            full_border(),
            full_row(""),
        ];
        self.write_lines(&lines)
    }

    fn step_finished(&mut self, params: &StepFinishedParams) -> io::Result<()> {
        let mut lines = vec![
            full_row(""),
            column_border(),
            status_row(params.status, &params.title, params.duration),
            column_border(),
        ];
        if let Some(code) = params.exit_code.filter(|code| *code != 0) {
            lines.push(format!("exit code: {}", code));
        }
        lines.push(String::new());
        self.write_lines(&lines)
    }
}

/// Wrap a message in its level color. Empty messages and normal level stay
/// as they are.
pub fn add_color(level: Level, message: &str) -> String {
    if message.is_empty() {
        return String::new();
    }
    match level.color_code() {
        Some(code) => super::ansi::paint(code, message),
        None => message.to_string(),
    }
}

impl Logger for ConsoleLogger {
    fn log_message(&mut self, message: &str, level: Level) -> io::Result<()> {
        let mut line = self.prefix();
        let colored = add_color(level, message);
        if !line.is_empty() && !colored.is_empty() {
            line.push(' ');
        }
        line.push_str(&colored);
        write_sink(&self.sink, line.as_bytes())
    }

    fn log_event(&mut self, event: &LogEvent<'_>) -> io::Result<()> {
        match event {
            LogEvent::RelayStarted(plan) => {
                for (message, level) in started_messages(plan) {
                    self.log_message(&message, level)?;
                }
                Ok(())
            }
            LogEvent::StepStarted(params) => self.step_started(params),
            LogEvent::StepFinished(params) => self.step_finished(params),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        flush_sink(&self.sink)
    }

    fn is_debug(&self) -> bool {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{ansi, fixed_time, LoggerType, SharedBuffer};
    use crate::runner::results::StepRunStatus;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn logger(buffer: &SharedBuffer) -> ConsoleLogger {
        ConsoleLogger::new(&LoggerOpts::new(LoggerType::Console, buffer.sink()))
    }

    #[test]
    fn normal_message_is_written_verbatim() {
        let buffer = SharedBuffer::new();
        logger(&buffer)
            .log_message("plain text", Level::Normal)
            .unwrap();
        assert_eq!(buffer.contents(), "plain text");
    }

    #[test]
    fn colored_message_is_wrapped() {
        let buffer = SharedBuffer::new();
        logger(&buffer).log_message("boom", Level::Error).unwrap();
        assert_eq!(buffer.contents(), format!("{}boom{}", ansi::RED, ansi::RESET));
    }

    #[test]
    fn empty_message_gets_no_color() {
        assert_eq!(add_color(Level::Warn, ""), "");
    }

    #[test]
    fn prefix_joins_fields_with_single_spaces() {
        let buffer = SharedBuffer::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let opts = LoggerOpts::new(LoggerType::Console, buffer.sink())
            .with_producer("step", "abc")
            .with_time_provider(fixed_time(at))
            .with_timestamps(true);
        ConsoleLogger::new(&opts)
            .log_message("hi\n", Level::Normal)
            .unwrap();
        assert_eq!(buffer.contents(), "[2024-05-01T12:00:00Z] step abc hi\n");
    }

    #[test]
    fn prefix_without_message_has_no_trailing_space() {
        let buffer = SharedBuffer::new();
        let opts =
            LoggerOpts::new(LoggerType::Console, buffer.sink()).with_producer("step", "");
        ConsoleLogger::new(&opts)
            .log_message("", Level::Normal)
            .unwrap();
        assert_eq!(buffer.contents(), "step");
    }

    #[test]
    fn step_events_render_title_and_status() {
        let buffer = SharedBuffer::new();
        let mut console = logger(&buffer);
        let started = StepStartedParams {
            uuid: "u-1".to_string(),
            position: 0,
            step_id: "hello".to_string(),
            title: "Say hello".to_string(),
        };
        console
            .log_event(&LogEvent::StepStarted(&started))
            .unwrap();
        let finished = StepFinishedParams {
            uuid: "u-1".to_string(),
            step_id: "hello".to_string(),
            title: "Say hello".to_string(),
            status: StepRunStatus::Failed,
            exit_code: Some(3),
            duration: Duration::from_millis(250),
            errors: vec![],
        };
        console
            .log_event(&LogEvent::StepFinished(&finished))
            .unwrap();

        let out = buffer.contents();
        assert!(out.contains("(0) Say hello"));
        assert!(out.contains("id: hello"));
        assert!(out.contains("exit code: 3"));
    }
}
