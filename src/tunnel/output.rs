//! Subprocess output handling.
//!
//! # Responsibilities
//! - Keep a bounded tail of combined stdout/stderr for error reports
//! - Recognise the assigned public hostname in each stream as it arrives
//!
//! # Design Decisions
//! - The tail is capped in characters; oldest text is dropped first
//! - Matching never looks at the tail: each stream has its own `LineScanner`
//!   holding the unfinished line, so the tail cap and output from the other
//!   stream cannot hide a URL
//! - The service's own API host is never taken as the assigned hostname

use regex::Regex;

/// Labels under the tunnel domain that belong to the service itself.
const RESERVED_LABELS: &[&str] = &["api"];

/// Longest unterminated line carried between reads.
const MAX_PENDING_CHARS: usize = 1024;

/// Drop leading characters until `buf` holds at most `cap` of them.
fn keep_last_chars(buf: &mut String, cap: usize) {
    let excess = buf.chars().count().saturating_sub(cap);
    if excess > 0 {
        let cut = buf.char_indices().nth(excess).map_or(buf.len(), |(i, _)| i);
        buf.drain(..cut);
    }
}

/// Bounded tail of subprocess output.
#[derive(Debug, Clone)]
pub struct OutputTail {
    buf: String,
    cap: usize,
}

impl OutputTail {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: String::new(),
            cap,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.buf.push_str(chunk);
        keep_last_chars(&mut self.buf, self.cap);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

/// Per-stream hostname scanner.
///
/// Each chunk is matched together with the unfinished line left over from the
/// previous read; completed lines that did not match are discarded.
#[derive(Debug, Default)]
pub struct LineScanner {
    pending: String,
}

impl LineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan(&mut self, chunk: &str, matcher: &HostnameMatcher) -> Option<String> {
        self.pending.push_str(chunk);
        if let Some(url) = matcher.find(&self.pending) {
            self.pending.clear();
            return Some(url);
        }

        if let Some(end) = self.pending.rfind('\n') {
            self.pending.drain(..=end);
        }
        keep_last_chars(&mut self.pending, MAX_PENDING_CHARS);
        None
    }
}

/// Finds `https://<label>.<suffix>` in tunnel output.
#[derive(Debug, Clone)]
pub struct HostnameMatcher {
    pattern: Regex,
}

impl HostnameMatcher {
    pub fn new(suffix: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?i)https://([a-z0-9-]+)\.{}",
            regex::escape(suffix)
        ))?;
        Ok(Self { pattern })
    }

    /// First assigned hostname in `text`, lower-cased.
    pub fn find(&self, text: &str) -> Option<String> {
        self.pattern
            .captures_iter(text)
            .filter(|caps| {
                let label = caps.get(1).map_or("", |m| m.as_str());
                !RESERVED_LABELS.iter().any(|r| label.eq_ignore_ascii_case(r))
            })
            .find_map(|caps| caps.get(0))
            .map(|m| m.as_str().to_lowercase())
    }
}
