//! Step output pipeline.
//!
//! Every byte a step writes goes through, in order:
//! 1. [`SecretFilter`] (when secret filtering is on and there are secrets)
//! 2. [`ErrorFinder`], which records red error bands
//! 3. [`LevelWriter`], which renders leveled messages through a logger
//!
//! [`StepOutputWriter`] owns one such pipeline per step invocation.
//!
//! # Example
//!
//! ```
//! use relay::log::{LoggerOpts, LoggerType, SharedBuffer};
//! use relay::output::{PipelineSpec, StepOutputWriter};
//! use std::io::Write;
//!
//! let buffer = SharedBuffer::new();
//! let opts = LoggerOpts::new(LoggerType::Console, buffer.sink());
//! let spec = PipelineSpec::new(vec!["hunter2".to_string()], true);
//!
//! let mut writer = StepOutputWriter::new(&spec, &opts);
//! writer.write_all(b"password: hun").unwrap();
//! writer.write_all(b"ter2\n").unwrap();
//! writer.close().unwrap();
//!
//! assert_eq!(buffer.contents(), "password: [REDACTED]\n");
//! ```

pub mod error_finder;
pub mod filter;
pub mod level_writer;

use std::io::{self, Write};

use crate::log::{new_logger, LoggerOpts, TimeProvider};

pub use error_finder::{ErrorFinder, ErrorMessage};
pub use filter::{SecretFilter, REDACTED};
pub use level_writer::LevelWriter;

/// A byte-stream stage of the output pipeline.
pub trait Transform: Send {
    /// Process `input`, appending whatever can be released to `out`.
    fn transform(&mut self, input: &[u8], out: &mut Vec<u8>);

    /// End of stream: release everything still held.
    fn finish(&mut self, out: &mut Vec<u8>);
}

/// The stages a pipeline can contain.
pub enum Stage {
    Redact(SecretFilter),
    FindErrors(ErrorFinder),
}

impl Transform for Stage {
    fn transform(&mut self, input: &[u8], out: &mut Vec<u8>) {
        match self {
            Stage::Redact(filter) => filter.transform(input, out),
            Stage::FindErrors(finder) => finder.transform(input, out),
        }
    }

    fn finish(&mut self, out: &mut Vec<u8>) {
        match self {
            Stage::Redact(filter) => filter.finish(out),
            Stage::FindErrors(finder) => finder.finish(out),
        }
    }
}

/// Which stages a step's pipeline gets.
#[derive(Debug, Clone, Default)]
pub struct PipelineSpec {
    pub secrets: Vec<String>,
    pub secret_filtering: bool,
}

impl PipelineSpec {
    pub fn new(secrets: Vec<String>, secret_filtering: bool) -> Self {
        Self {
            secrets,
            secret_filtering,
        }
    }

    /// Ordered stages, without the terminal renderer.
    pub fn stages(&self, time_provider: TimeProvider) -> Vec<Stage> {
        let mut stages = Vec::new();
        if self.secret_filtering {
            if let Some(filter) = SecretFilter::new(&self.secrets) {
                stages.push(Stage::Redact(filter));
            }
        }
        stages.push(Stage::FindErrors(ErrorFinder::new(time_provider)));
        stages
    }
}

/// The output sink handed to one step invocation.
pub struct StepOutputWriter {
    stages: Vec<Stage>,
    renderer: LevelWriter,
    closed: bool,
}

impl StepOutputWriter {
    pub fn new(spec: &PipelineSpec, opts: &LoggerOpts) -> Self {
        Self {
            stages: spec.stages(opts.time_provider.clone()),
            renderer: LevelWriter::new(new_logger(opts)),
            closed: false,
        }
    }

    /// Whether a secret filter stage is active.
    pub fn is_filtering_secrets(&self) -> bool {
        self.stages.iter().any(|s| matches!(s, Stage::Redact(_)))
    }

    /// Drain every stage and the renderer.
    ///
    /// Returns the number of bytes the secret filter released.
    pub fn flush(&mut self) -> io::Result<usize> {
        let mut released = 0;
        let mut data = Vec::new();
        for stage in &mut self.stages {
            let mut out = Vec::new();
            stage.transform(&data, &mut out);
            let before = out.len();
            stage.finish(&mut out);
            if matches!(stage, Stage::Redact(_)) {
                released = out.len() - before;
            }
            data = out;
        }
        self.renderer.write(&data)?;
        self.renderer.flush()?;
        Ok(released)
    }

    /// Final flush. Later calls do nothing.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush().map(|_| ())
    }

    /// Error bands found in the output so far.
    pub fn error_messages(&self) -> &[ErrorMessage] {
        self.stages
            .iter()
            .find_map(|stage| match stage {
                Stage::FindErrors(finder) => Some(finder.error_messages()),
                Stage::Redact(_) => None,
            })
            .unwrap_or(&[])
    }
}

impl Write for StepOutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "step output writer is closed",
            ));
        }
        let mut data = buf.to_vec();
        for stage in &mut self.stages {
            let mut out = Vec::new();
            stage.transform(&data, &mut out);
            data = out;
        }
        self.renderer.write(&data)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        StepOutputWriter::flush(self).map(|_| ())
    }
}

impl Drop for StepOutputWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!("Failed to flush step output: {}", err);
        }
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Length of the longest suffix of `data` that is a strict prefix of `marker`.
pub(crate) fn partial_marker_len(data: &[u8], marker: &[u8]) -> usize {
    let max = data.len().min(marker.len().saturating_sub(1));
    (1..=max)
        .rev()
        .find(|&k| data.ends_with(&marker[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{fixed_time, LoggerType, SharedBuffer};
    use chrono::{TimeZone, Utc};

    const SIMPLE: &str = "failed to create file artifact: /bitrise/src/assets";
    const ERROR: &str = "\x1b[31;1mfailed to create file artifact: /bitrise/src/assets:\n  failed to get file size, error: file not exist at: /bitrise/src/assets\x1b[0m";
    const ERROR_TEXT: &str = "failed to create file artifact: /bitrise/src/assets:\\n  failed to get file size, error: file not exist at: /bitrise/src/assets";

    fn console_opts(buffer: &SharedBuffer) -> LoggerOpts {
        LoggerOpts::new(LoggerType::Console, buffer.sink())
            .with_time_provider(fixed_time(Utc.timestamp_opt(0, 0).unwrap()))
    }

    fn json_opts(buffer: &SharedBuffer) -> LoggerOpts {
        LoggerOpts::new(LoggerType::Json, buffer.sink())
            .with_producer("Test", "UUID")
            .with_time_provider(fixed_time(Utc.timestamp_opt(0, 0).unwrap()))
    }

    fn json_line(level: &str, message: &str) -> String {
        format!(
            "{{\"timestamp\":\"1970-01-01T00:00:00Z\",\"type\":\"log\",\"producer\":\"Test\",\"producer_id\":\"UUID\",\"level\":\"{}\",\"message\":\"{}\"}}\n",
            level, message
        )
    }

    fn feed(writer: &mut StepOutputWriter, messages: &[&str]) {
        for message in messages {
            let n = writer.write(message.as_bytes()).unwrap();
            assert_eq!(n, message.len());
        }
        StepOutputWriter::flush(writer).unwrap();
    }

    #[test]
    fn console_transmits_logs_unchanged() {
        for input in [SIMPLE, ERROR] {
            let buffer = SharedBuffer::new();
            let mut writer = StepOutputWriter::new(&PipelineSpec::default(), &console_opts(&buffer));
            feed(&mut writer, &[input]);
            assert_eq!(buffer.contents(), input);
        }
    }

    #[test]
    fn json_writes_records() {
        for (input, expected) in [
            (SIMPLE, json_line("normal", SIMPLE)),
            (ERROR, json_line("error", ERROR_TEXT)),
        ] {
            let buffer = SharedBuffer::new();
            let mut writer = StepOutputWriter::new(&PipelineSpec::default(), &json_opts(&buffer));
            feed(&mut writer, &[input]);
            assert_eq!(buffer.contents(), expected);
        }
    }

    #[test]
    fn json_with_secret_filtering_writes_records() {
        let spec = PipelineSpec::new(vec!["secret value".to_string()], true);
        for (input, expected) in [
            (SIMPLE, json_line("normal", SIMPLE)),
            (ERROR, json_line("error", ERROR_TEXT)),
        ] {
            let buffer = SharedBuffer::new();
            let mut writer = StepOutputWriter::new(&spec, &json_opts(&buffer));
            assert!(writer.is_filtering_secrets());
            feed(&mut writer, &[input]);
            assert_eq!(buffer.contents(), expected);
        }
    }

    #[test]
    fn returns_error_messages() {
        let spec = PipelineSpec::new(vec!["secret value".to_string()], true);

        let buffer = SharedBuffer::new();
        let mut writer = StepOutputWriter::new(&spec, &json_opts(&buffer));
        feed(&mut writer, &[SIMPLE]);
        assert!(writer.error_messages().is_empty());

        let buffer = SharedBuffer::new();
        let mut writer = StepOutputWriter::new(&spec, &json_opts(&buffer));
        feed(&mut writer, &[ERROR]);
        assert_eq!(
            writer.error_messages(),
            &[ErrorMessage {
                timestamp: Utc.timestamp_opt(0, 0).unwrap(),
                message: ERROR_TEXT.replace("\\n", "\n"),
            }]
        );
    }

    #[test]
    fn redacts_secret_split_across_writes() {
        let buffer = SharedBuffer::new();
        let spec = PipelineSpec::new(vec!["secret".to_string()], true);
        let mut writer = StepOutputWriter::new(&spec, &console_opts(&buffer));
        feed(&mut writer, &["my sec", "ret\n"]);
        assert_eq!(buffer.contents(), "my [REDACTED]\n");
    }

    #[test]
    fn secret_filtering_off_passes_secrets() {
        let buffer = SharedBuffer::new();
        let spec = PipelineSpec::new(vec!["secret".to_string()], false);
        let mut writer = StepOutputWriter::new(&spec, &console_opts(&buffer));
        assert!(!writer.is_filtering_secrets());
        feed(&mut writer, &["my secret\n"]);
        assert_eq!(buffer.contents(), "my secret\n");
    }

    #[test]
    fn unterminated_error_band_records_nothing() {
        let buffer = SharedBuffer::new();
        let mut writer = StepOutputWriter::new(&PipelineSpec::default(), &json_opts(&buffer));
        feed(&mut writer, &["\x1b[31;1mnever closed"]);
        assert!(writer.error_messages().is_empty());
    }

    #[test]
    fn flush_reports_released_bytes() {
        let buffer = SharedBuffer::new();
        let spec = PipelineSpec::new(vec!["secret".to_string()], true);
        let mut writer = StepOutputWriter::new(&spec, &console_opts(&buffer));
        writer.write_all(b"held sec").unwrap();
        assert_eq!(buffer.contents(), "held ");
        assert_eq!(StepOutputWriter::flush(&mut writer).unwrap(), 3);
        assert_eq!(buffer.contents(), "held sec");
    }

    #[test]
    fn drop_flushes_pending_output() {
        let buffer = SharedBuffer::new();
        let spec = PipelineSpec::new(vec!["token".to_string()], true);
        {
            let mut writer = StepOutputWriter::new(&spec, &console_opts(&buffer));
            writer.write_all(b"tail to").unwrap();
        }
        assert_eq!(buffer.contents(), "tail to");
    }

    #[test]
    fn close_is_idempotent_and_rejects_writes() {
        let buffer = SharedBuffer::new();
        let mut writer = StepOutputWriter::new(&PipelineSpec::default(), &console_opts(&buffer));
        writer.write_all(b"done\n").unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.write(b"late").is_err());
        assert_eq!(buffer.contents(), "done\n");
    }

    #[test]
    fn marker_helpers() {
        assert_eq!(find_subslice(b"abc\x1b[0m", b"\x1b[0m"), Some(3));
        assert_eq!(find_subslice(b"ab", b"abc"), None);
        assert_eq!(partial_marker_len(b"text\x1b[", b"\x1b[0m"), 2);
        assert_eq!(partial_marker_len(b"text", b"\x1b[0m"), 0);
        assert_eq!(partial_marker_len(b"\x1b[0m", b"\x1b[0m"), 0);
    }
}
