//! Splits a colored byte stream into leveled log messages.

use std::io;

use crate::log::{ansi, Level, Logger};

/// Longest run of an open band held without a newline or a reset.
pub(crate) const MAX_HELD_BAND_BYTES: usize = 16 * 1024;

/// Terminal pipeline stage: turns color bands into [`Logger`] messages.
///
/// Text outside bands is logged at [`Level::Normal`]. A band opened by a
/// level color is logged at that level with the escapes removed: in one
/// piece when its reset arrives with it, otherwise line by line (or in
/// [`MAX_HELD_BAND_BYTES`] pieces) until the reset or [`flush`](Self::flush).
pub struct LevelWriter {
    logger: Box<dyn Logger>,
    pending: Vec<u8>,
    /// Level of a band whose reset has not arrived yet.
    open_band: Option<Level>,
}

impl LevelWriter {
    pub fn new(logger: Box<dyn Logger>) -> Self {
        Self {
            logger,
            pending: Vec::new(),
            open_band: None,
        }
    }

    /// Feed bytes; complete messages are logged immediately.
    pub fn write(&mut self, input: &[u8]) -> io::Result<()> {
        self.pending.extend_from_slice(input);

        while !self.pending.is_empty() {
            if let Some(level) = self.open_band {
                let Some(end) = super::find_subslice(&self.pending, ansi::RESET.as_bytes()) else {
                    return self.release_open_band(level);
                };
                let message = String::from_utf8_lossy(&self.pending[..end]).into_owned();
                self.pending.drain(..end + ansi::RESET.len());
                self.open_band = None;
                self.emit(&message, level)?;
                continue;
            }

            if let Some(level) = Level::from_color_prefix(&self.pending) {
                let Some(code) = level.color_code() else {
                    break;
                };
                self.pending.drain(..code.len());
                self.open_band = Some(level);
                continue;
            }

            if is_partial_color_code(&self.pending) {
                break;
            }

            let next_escape = self.pending[1..]
                .iter()
                .position(|b| *b == 0x1b)
                .map(|pos| pos + 1);
            let take = match next_escape {
                Some(pos) => pos,
                None => self.pending.len() - incomplete_utf8_tail(&self.pending),
            };
            if take == 0 {
                break;
            }
            let message = String::from_utf8_lossy(&self.pending[..take]).into_owned();
            self.pending.drain(..take);
            self.emit(&message, Level::Normal)?;
        }
        Ok(())
    }

    /// Log whatever is buffered, including an unterminated band.
    pub fn flush(&mut self) -> io::Result<()> {
        let level = self.open_band.take().unwrap_or(Level::Normal);
        if !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            let message = String::from_utf8_lossy(&pending).into_owned();
            self.emit(&message, level)?;
        }
        self.logger.flush()
    }

    /// Logs the complete lines of an open band, or a capped piece of it
    /// when no newline came. A possible reset prefix stays pending.
    fn release_open_band(&mut self, level: Level) -> io::Result<()> {
        let held = super::partial_marker_len(&self.pending, ansi::RESET.as_bytes());
        let available = &self.pending[..self.pending.len() - held];
        let take = match available.iter().rposition(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None if available.len() >= MAX_HELD_BAND_BYTES => {
                available.len() - incomplete_utf8_tail(available)
            }
            None => 0,
        };
        if take == 0 {
            return Ok(());
        }
        let message = String::from_utf8_lossy(&self.pending[..take]).into_owned();
        self.pending.drain(..take);
        self.emit(&message, level)
    }

    fn emit(&mut self, message: &str, level: Level) -> io::Result<()> {
        if message.is_empty() {
            return Ok(());
        }
        self.logger.log_message(message, level)
    }
}

/// Whether `bytes` is a strict prefix of some level color code.
fn is_partial_color_code(bytes: &[u8]) -> bool {
    Level::COLORED.iter().any(|level| {
        level
            .color_code()
            .is_some_and(|code| code.len() > bytes.len() && code.as_bytes().starts_with(bytes))
    })
}

/// Length of a trailing UTF-8 sequence that is not yet complete.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            b if b >= 0xF0 => 4,
            b if b >= 0xE0 => 3,
            b if b >= 0xC0 => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{new_logger, LoggerOpts, LoggerType, SharedBuffer};

    fn console(buffer: &SharedBuffer) -> LevelWriter {
        LevelWriter::new(new_logger(&LoggerOpts::new(
            LoggerType::Console,
            buffer.sink(),
        )))
    }

    fn json_levels(buffer: &SharedBuffer) -> Vec<(String, String)> {
        buffer
            .contents()
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                (
                    value["level"].as_str().unwrap().to_string(),
                    value["message"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn console_output_is_byte_identical() {
        let buffer = SharedBuffer::new();
        let mut writer = console(&buffer);
        let input = "plain \x1b[33;1mwarn\x1b[0m mid \x1b[31;1merr\nline\x1b[0m tail \x1b[1mbold";
        writer.write(input.as_bytes()).unwrap();
        writer.flush().unwrap();
        assert_eq!(buffer.contents(), input);
    }

    #[test]
    fn splits_messages_by_level() {
        let buffer = SharedBuffer::new();
        let opts = LoggerOpts::new(LoggerType::Json, buffer.sink());
        let mut writer = LevelWriter::new(new_logger(&opts));
        writer
            .write(b"a \x1b[34;1minfo\x1b[0m\x1b[32;1mdone\x1b[0m\x1b[35;1mdbg\x1b[0m b")
            .unwrap();
        writer.flush().unwrap();

        assert_eq!(
            json_levels(&buffer),
            vec![
                ("normal".to_string(), "a ".to_string()),
                ("info".to_string(), "info".to_string()),
                ("done".to_string(), "done".to_string()),
                ("debug".to_string(), "dbg".to_string()),
                ("normal".to_string(), " b".to_string()),
            ]
        );
    }

    #[test]
    fn holds_partial_escape_across_writes() {
        let buffer = SharedBuffer::new();
        let opts = LoggerOpts::new(LoggerType::Json, buffer.sink());
        let mut writer = LevelWriter::new(new_logger(&opts));
        writer.write(b"\x1b[31").unwrap();
        assert_eq!(buffer.contents(), "");
        writer.write(b";1mbad\x1b[0").unwrap();
        assert_eq!(buffer.contents(), "");
        writer.write(b"m").unwrap();
        assert_eq!(
            json_levels(&buffer),
            vec![("error".to_string(), "bad".to_string())]
        );
    }

    #[test]
    fn holds_incomplete_utf8() {
        let buffer = SharedBuffer::new();
        let mut writer = console(&buffer);
        let bytes = "héllo".as_bytes();
        writer.write(&bytes[..2]).unwrap();
        writer.write(&bytes[2..]).unwrap();
        writer.flush().unwrap();
        assert_eq!(buffer.contents(), "héllo");
    }

    #[test]
    fn flush_emits_open_band_at_its_level() {
        let buffer = SharedBuffer::new();
        let opts = LoggerOpts::new(LoggerType::Json, buffer.sink());
        let mut writer = LevelWriter::new(new_logger(&opts));
        writer.write(b"\x1b[33;1mstill open").unwrap();
        assert_eq!(buffer.contents(), "");
        writer.flush().unwrap();
        assert_eq!(
            json_levels(&buffer),
            vec![("warn".to_string(), "still open".to_string())]
        );
    }

    #[test]
    fn unclosed_band_is_logged_line_by_line() {
        let buffer = SharedBuffer::new();
        let opts = LoggerOpts::new(LoggerType::Json, buffer.sink());
        let mut writer = LevelWriter::new(new_logger(&opts));
        writer.write(b"\x1b[31;1mError: build failed\n").unwrap();
        for i in 0..1000 {
            writer.write(format!("line {}\n", i).as_bytes()).unwrap();
        }

        let levels = json_levels(&buffer);
        assert_eq!(levels.len(), 1001);
        assert_eq!(
            levels[0],
            ("error".to_string(), "Error: build failed\n".to_string())
        );
        assert_eq!(
            levels[1000],
            ("error".to_string(), "line 999\n".to_string())
        );
        assert!(writer.pending.is_empty());
    }

    #[test]
    fn band_level_survives_partial_lines() {
        let buffer = SharedBuffer::new();
        let opts = LoggerOpts::new(LoggerType::Json, buffer.sink());
        let mut writer = LevelWriter::new(new_logger(&opts));
        writer.write(b"\x1b[33;1mfirst\nsec").unwrap();
        writer.write(b"ond\x1b[0").unwrap();
        writer.write(b"m after").unwrap();
        writer.flush().unwrap();

        assert_eq!(
            json_levels(&buffer),
            vec![
                ("warn".to_string(), "first\n".to_string()),
                ("warn".to_string(), "second".to_string()),
                ("normal".to_string(), " after".to_string()),
            ]
        );
    }

    #[test]
    fn long_band_without_newline_is_capped() {
        let buffer = SharedBuffer::new();
        let opts = LoggerOpts::new(LoggerType::Json, buffer.sink());
        let mut writer = LevelWriter::new(new_logger(&opts));
        writer.write(b"\x1b[31;1m").unwrap();
        let chunk = vec![b'x'; 1024];
        for _ in 0..20 {
            writer.write(&chunk).unwrap();
        }

        let levels = json_levels(&buffer);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].0, "error");
        assert_eq!(levels[0].1.len(), MAX_HELD_BAND_BYTES);
        assert!(writer.pending.len() < MAX_HELD_BAND_BYTES);

        writer.flush().unwrap();
        let total: usize = json_levels(&buffer).iter().map(|(_, m)| m.len()).sum();
        assert_eq!(total, 20 * 1024);
    }

    #[test]
    fn utf8_tail_detection() {
        assert_eq!(incomplete_utf8_tail(b"abc"), 0);
        assert_eq!(incomplete_utf8_tail(&"é".as_bytes()[..1]), 1);
        assert_eq!(incomplete_utf8_tail("é".as_bytes()), 0);
        assert_eq!(incomplete_utf8_tail(&"€".as_bytes()[..2]), 2);
    }
}
