//! Secret redaction for streamed output.
//!
//! Secrets can arrive split across writes, so the filter holds back the
//! shortest tail that could still grow into a secret and releases it once
//! the next write (or the end of the stream) decides it.

use super::Transform;

/// Replacement written in place of every secret occurrence.
pub const REDACTED: &str = "[REDACTED]";

/// Replaces secret literals in a byte stream with [`REDACTED`].
///
/// # Example
///
/// ```
/// use relay::output::{SecretFilter, Transform};
///
/// let mut filter = SecretFilter::new(["super-secret-value"]).unwrap();
/// let mut out = Vec::new();
/// filter.transform(b"The key is super-", &mut out);
/// filter.transform(b"secret-value here", &mut out);
/// filter.finish(&mut out);
/// assert_eq!(out, b"The key is [REDACTED] here");
/// ```
#[derive(Debug, Clone)]
pub struct SecretFilter {
    /// Longest first.
    secrets: Vec<Vec<u8>>,
    held: Vec<u8>,
}

impl SecretFilter {
    /// Build a filter; `None` when no non-empty secret remains.
    ///
    /// Multi-line values are also registered line by line, since tools often
    /// echo only part of a multi-line secret.
    pub fn new(values: impl IntoIterator<Item = impl AsRef<str>>) -> Option<Self> {
        let mut secrets: Vec<Vec<u8>> = Vec::new();
        let mut add = |value: &str| {
            if !value.is_empty() && !secrets.iter().any(|s| s == value.as_bytes()) {
                secrets.push(value.as_bytes().to_vec());
            }
        };

        for value in values {
            let value = value.as_ref();
            add(value);
            if value.contains('\n') {
                for line in value.lines() {
                    add(line.trim_end_matches('\r'));
                }
            }
        }

        if secrets.is_empty() {
            return None;
        }
        secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        Some(Self {
            secrets,
            held: Vec::new(),
        })
    }

    /// Number of registered secret literals.
    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// Redact `input` in one go, with no streaming state.
    pub fn mask(&self, input: &str) -> String {
        let mut scratch = Self {
            secrets: self.secrets.clone(),
            held: Vec::new(),
        };
        let mut out = Vec::new();
        scratch.redact(input.as_bytes(), &mut out, true);
        String::from_utf8_lossy(&out).into_owned()
    }

    fn could_grow_into_secret(&self, tail: &[u8]) -> bool {
        self.secrets
            .iter()
            .any(|s| s.len() > tail.len() && s.starts_with(tail))
    }

    fn redact(&mut self, input: &[u8], out: &mut Vec<u8>, at_end: bool) {
        let mut data = std::mem::take(&mut self.held);
        data.extend_from_slice(input);

        let mut i = 0;
        while i < data.len() {
            let rest = &data[i..];

            if !at_end && self.could_grow_into_secret(rest) {
                self.held = rest.to_vec();
                return;
            }

            match self.secrets.iter().find(|s| rest.starts_with(s)) {
                Some(secret) => {
                    out.extend_from_slice(REDACTED.as_bytes());
                    i += secret.len();
                }
                None => {
                    out.push(data[i]);
                    i += 1;
                }
            }
        }
    }
}

impl Transform for SecretFilter {
    fn transform(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.redact(input, out, false);
    }

    fn finish(&mut self, out: &mut Vec<u8>) {
        self.redact(&[], out, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(filter: &mut SecretFilter, chunks: &[&str]) -> String {
        let mut out = Vec::new();
        for chunk in chunks {
            filter.transform(chunk.as_bytes(), &mut out);
        }
        filter.finish(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn masks_single_secret() {
        let filter = SecretFilter::new(["super-secret-value"]).unwrap();
        let output = filter.mask("The key is super-secret-value here");
        assert_eq!(output, "The key is [REDACTED] here");
    }

    #[test]
    fn masks_multiple_occurrences() {
        let filter = SecretFilter::new(["token"]).unwrap();
        assert_eq!(
            filter.mask("token=token123, other_token=abc"),
            "[REDACTED]=[REDACTED]123, other_[REDACTED]=abc"
        );
    }

    #[test]
    fn ignores_empty_secrets() {
        assert!(SecretFilter::new([""]).is_none());
        let filter = SecretFilter::new(["", "real-secret"]).unwrap();
        assert_eq!(filter.secret_count(), 1);
    }

    #[test]
    fn redacts_secret_split_across_writes() {
        let mut filter = SecretFilter::new(["secret"]).unwrap();
        assert_eq!(run(&mut filter, &["my sec", "ret is out"]), "my [REDACTED] is out");
    }

    #[test]
    fn redacts_secret_split_byte_by_byte() {
        let mut filter = SecretFilter::new(["abc"]).unwrap();
        assert_eq!(run(&mut filter, &["x", "a", "b", "c", "y"]), "x[REDACTED]y");
    }

    #[test]
    fn holds_back_only_possible_prefix() {
        let mut filter = SecretFilter::new(["secret"]).unwrap();
        let mut out = Vec::new();
        filter.transform(b"hello se", &mut out);
        assert_eq!(out, b"hello ");
        filter.transform(b"x", &mut out);
        assert_eq!(out, b"hello sex");
    }

    #[test]
    fn releases_held_tail_at_finish() {
        let mut filter = SecretFilter::new(["secret"]).unwrap();
        assert_eq!(run(&mut filter, &["trailing sec"]), "trailing sec");
    }

    #[test]
    fn longest_secret_wins() {
        let mut filter = SecretFilter::new(["ab", "abcd"]).unwrap();
        assert_eq!(run(&mut filter, &["x ab", "cd y"]), "x [REDACTED] y");
        assert_eq!(filter.mask("abcd ab"), "[REDACTED] [REDACTED]");
        assert_eq!(filter.mask("abcab"), "[REDACTED]c[REDACTED]");
    }

    #[test]
    fn shorter_secret_still_redacted_at_end() {
        let mut filter = SecretFilter::new(["ab", "abcd"]).unwrap();
        assert_eq!(run(&mut filter, &["tail ab"]), "tail [REDACTED]");
    }

    #[test]
    fn registers_multiline_secret_lines() {
        let filter = SecretFilter::new(["line-one\nline-two"]).unwrap();
        assert_eq!(filter.secret_count(), 3);
        assert_eq!(filter.mask("got line-two only"), "got [REDACTED] only");
        assert_eq!(filter.mask("line-one\nline-two"), "[REDACTED]");
    }

    #[test]
    fn passes_through_without_matches() {
        let mut filter = SecretFilter::new(["secret value"]).unwrap();
        let input = "failed to create file artifact: /bitrise/src/assets";
        assert_eq!(run(&mut filter, &[input]), input);
    }
}
