//! Structured error extraction from colored output.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{find_subslice, partial_marker_len, Transform};
use crate::log::{ansi, TimeProvider};

/// Text of one red band from a step's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Longest error message kept from one band; the rest of the band is dropped.
pub(crate) const MAX_ERROR_MESSAGE_BYTES: usize = 64 * 1024;

struct OpenBand {
    started_at: DateTime<Utc>,
    text: Vec<u8>,
}

impl OpenBand {
    fn push(&mut self, bytes: &[u8]) {
        let room = MAX_ERROR_MESSAGE_BYTES.saturating_sub(self.text.len());
        self.text.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }
}

/// Forwards bytes unchanged while collecting every complete error band
/// (`\x1b[31;1m` ... `\x1b[0m`).
pub struct ErrorFinder {
    time_provider: TimeProvider,
    /// Tail that may be the start of a marker.
    carry: Vec<u8>,
    band: Option<OpenBand>,
    messages: Vec<ErrorMessage>,
}

impl ErrorFinder {
    pub fn new(time_provider: TimeProvider) -> Self {
        Self {
            time_provider,
            carry: Vec::new(),
            band: None,
            messages: Vec::new(),
        }
    }

    /// Errors found so far, in stream order.
    pub fn error_messages(&self) -> &[ErrorMessage] {
        &self.messages
    }

    fn scan(&mut self, input: &[u8]) {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(input);
        let start_marker = ansi::RED.as_bytes();
        let end_marker = ansi::RESET.as_bytes();

        let mut rest: &[u8] = &data;
        loop {
            if self.band.is_none() {
                match find_subslice(rest, start_marker) {
                    Some(pos) => {
                        self.band = Some(OpenBand {
                            started_at: (self.time_provider)(),
                            text: Vec::new(),
                        });
                        rest = &rest[pos + start_marker.len()..];
                    }
                    None => {
                        let keep = partial_marker_len(rest, start_marker);
                        self.carry = rest[rest.len() - keep..].to_vec();
                        return;
                    }
                }
                continue;
            }

            match find_subslice(rest, end_marker) {
                Some(pos) => {
                    if let Some(mut band) = self.band.take() {
                        band.push(&rest[..pos]);
                        self.messages.push(ErrorMessage {
                            timestamp: band.started_at,
                            message: String::from_utf8_lossy(&band.text).into_owned(),
                        });
                    }
                    rest = &rest[pos + end_marker.len()..];
                }
                None => {
                    let keep = partial_marker_len(rest, end_marker);
                    if let Some(band) = self.band.as_mut() {
                        band.push(&rest[..rest.len() - keep]);
                    }
                    self.carry = rest[rest.len() - keep..].to_vec();
                    return;
                }
            }
        }
    }
}

impl Transform for ErrorFinder {
    fn transform(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(input);
        self.scan(input);
    }

    /// Drops an unterminated band.
    fn finish(&mut self, _out: &mut Vec<u8>) {
        if self.band.take().is_some() {
            tracing::debug!("Discarding unterminated error band");
        }
        self.carry.clear();
    }
}
