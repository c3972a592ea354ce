//! User-facing log rendering.
//!
//! Two renderers share the [`Logger`] trait:
//! - [`ConsoleLogger`] writes colored text for humans
//! - [`JsonLogger`] writes one JSON record per message or event
//!
//! Internal diagnostics go through `tracing`; this module is only for the
//! output a user or a log collector reads.
//!
//! # Example
//!
//! ```
//! use relay::log::{new_logger, Level, LoggerOpts, LoggerType, SharedBuffer};
//!
//! let buffer = SharedBuffer::new();
//! let opts = LoggerOpts::new(LoggerType::Console, buffer.sink());
//! let mut logger = new_logger(&opts);
//! logger.log_message("hello\n", Level::Normal).unwrap();
//! assert_eq!(buffer.contents(), "hello\n");
//! ```

pub mod console;
pub mod events;
pub mod json;
pub mod summary;

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::console::ConsoleLogger;
pub use events::{LogEvent, StepFinishedParams, StepStartedParams};
pub use json::JsonLogger;

/// ANSI color codes used to mark levels in text output.
pub mod ansi {
    pub const RED: &str = "\x1b[31;1m";
    pub const YELLOW: &str = "\x1b[33;1m";
    pub const BLUE: &str = "\x1b[34;1m";
    pub const GREEN: &str = "\x1b[32;1m";
    pub const MAGENTA: &str = "\x1b[35;1m";
    pub const RESET: &str = "\x1b[0m";

    /// Wrap `text` in a color code and a reset.
    pub fn paint(code: &str, text: &str) -> String {
        format!("{}{}{}", code, text, RESET)
    }
}

/// Producer name for messages emitted by relay itself.
pub const CLI_PRODUCER: &str = "relay_cli";

/// Producer name for step output.
pub const STEP_PRODUCER: &str = "step";

/// Message severity, detected from or rendered as a color band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warn,
    Info,
    Done,
    Normal,
    Debug,
}

impl Level {
    /// Colored levels in detection precedence order.
    pub const COLORED: [Level; 5] = [
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Done,
        Level::Debug,
    ];

    /// The color code for this level (`None` for normal).
    pub fn color_code(self) -> Option<&'static str> {
        match self {
            Level::Error => Some(ansi::RED),
            Level::Warn => Some(ansi::YELLOW),
            Level::Info => Some(ansi::BLUE),
            Level::Done => Some(ansi::GREEN),
            Level::Debug => Some(ansi::MAGENTA),
            Level::Normal => None,
        }
    }

    /// The level whose color code `text` starts with, if any.
    pub fn from_color_prefix(text: &[u8]) -> Option<Level> {
        Self::COLORED.into_iter().find(|level| {
            level
                .color_code()
                .is_some_and(|code| text.starts_with(code.as_bytes()))
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Done => "done",
            Level::Normal => "normal",
            Level::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggerType {
    #[default]
    Console,
    Json,
}

impl FromStr for LoggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Clock used for timestamps; injectable for tests.
pub type TimeProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system clock.
pub fn system_time() -> TimeProvider {
    Arc::new(Utc::now)
}

/// A fixed clock.
pub fn fixed_time(at: DateTime<Utc>) -> TimeProvider {
    Arc::new(move || at)
}

/// Shared destination for rendered output.
pub type LogSink = Arc<Mutex<dyn Write + Send>>;

/// Standard output as a [`LogSink`].
pub fn stdout_sink() -> LogSink {
    Arc::new(Mutex::new(io::stdout()))
}

/// Write all of `bytes` to a shared sink.
pub(crate) fn write_sink(sink: &LogSink, bytes: &[u8]) -> io::Result<()> {
    let mut writer = sink
        .lock()
        .map_err(|_| io::Error::other("log sink lock poisoned"))?;
    writer.write_all(bytes)
}

pub(crate) fn flush_sink(sink: &LogSink) -> io::Result<()> {
    let mut writer = sink
        .lock()
        .map_err(|_| io::Error::other("log sink lock poisoned"))?;
    writer.flush()
}

/// In-memory sink whose contents can be read back.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink writing into this buffer.
    pub fn sink(&self) -> LogSink {
        Arc::new(Mutex::new(self.clone()))
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("buffer lock poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Options for constructing a logger.
#[derive(Clone)]
pub struct LoggerOpts {
    pub logger_type: LoggerType,
    pub producer: String,
    pub producer_id: String,
    pub sink: LogSink,
    pub time_provider: TimeProvider,
    /// Render debug-level messages.
    pub debug: bool,
    /// Prefix console lines with a timestamp.
    pub timestamps: bool,
}

impl LoggerOpts {
    pub fn new(logger_type: LoggerType, sink: LogSink) -> Self {
        Self {
            logger_type,
            producer: String::new(),
            producer_id: String::new(),
            sink,
            time_provider: system_time(),
            debug: false,
            timestamps: false,
        }
    }

    pub fn with_producer(mut self, producer: &str, producer_id: &str) -> Self {
        self.producer = producer.to_string();
        self.producer_id = producer_id.to_string();
        self
    }

    pub fn with_time_provider(mut self, time_provider: TimeProvider) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Options for relay's own messages.
    pub fn for_cli(&self) -> Self {
        let opts = self.clone();
        match self.logger_type {
            LoggerType::Console => opts.with_producer("", ""),
            LoggerType::Json => opts.with_producer(CLI_PRODUCER, ""),
        }
    }

    /// Options for the output of one step invocation.
    ///
    /// Console output stays unprefixed so step text renders as the step
    /// wrote it; JSON records carry the step producer and its plan ID.
    pub fn for_step(&self, step_uuid: &str) -> Self {
        let opts = self.clone();
        match self.logger_type {
            LoggerType::Console => opts.with_producer("", ""),
            LoggerType::Json => opts.with_producer(STEP_PRODUCER, step_uuid),
        }
    }
}

impl fmt::Debug for LoggerOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerOpts")
            .field("logger_type", &self.logger_type)
            .field("producer", &self.producer)
            .field("producer_id", &self.producer_id)
            .field("debug", &self.debug)
            .field("timestamps", &self.timestamps)
            .finish_non_exhaustive()
    }
}

/// Build the logger selected by `opts`.
pub fn new_logger(opts: &LoggerOpts) -> Box<dyn Logger> {
    match opts.logger_type {
        LoggerType::Console => Box::new(ConsoleLogger::new(opts)),
        LoggerType::Json => Box::new(JsonLogger::new(opts)),
    }
}

/// A renderer for messages and lifecycle events.
pub trait Logger: Send {
    /// Render one message at `level`.
    fn log_message(&mut self, message: &str, level: Level) -> io::Result<()>;

    /// Render a lifecycle event.
    fn log_event(&mut self, event: &LogEvent<'_>) -> io::Result<()>;

    /// Flush the underlying sink.
    fn flush(&mut self) -> io::Result<()>;

    /// Whether debug-level messages are rendered.
    fn is_debug(&self) -> bool;

    /// Render a message, reporting a failure on stderr instead of returning it.
    fn report(&mut self, message: &str, level: Level) {
        if let Err(err) = self.log_message(message, level) {
            eprintln!("writing log message failed: {}", err);
        }
    }

    /// Render an event, reporting a failure on stderr instead of returning it.
    fn report_event(&mut self, event: &LogEvent<'_>) {
        if let Err(err) = self.log_event(event) {
            eprintln!("writing log event failed: {}", err);
        }
    }

    /// Flush, reporting a failure on stderr. Returns whether it succeeded.
    fn report_flush(&mut self) -> bool {
        match self.flush() {
            Ok(()) => true,
            Err(err) => {
                eprintln!("flushing log output failed: {}", err);
                false
            }
        }
    }

    fn print(&mut self, message: &str) {
        self.report(&format!("{}\n", message), Level::Normal);
    }

    fn error(&mut self, message: &str) {
        self.report(&format!("{}\n", message), Level::Error);
    }

    fn warn(&mut self, message: &str) {
        self.report(&format!("{}\n", message), Level::Warn);
    }

    fn info(&mut self, message: &str) {
        self.report(&format!("{}\n", message), Level::Info);
    }

    fn done(&mut self, message: &str) {
        self.report(&format!("{}\n", message), Level::Done);
    }

    fn debug(&mut self, message: &str) {
        if self.is_debug() {
            self.report(&format!("{}\n", message), Level::Debug);
        }
    }
}
