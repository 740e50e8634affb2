//! AT command/response protocol
//!
//! The modem speaks a line-oriented textual protocol: a formatted command
//! line goes out, response lines come back until a command-specific
//! terminator token appears. This module provides the command formatter
//! ([`AtCommand`]) and the parsed response ([`AtResponse`]); the blocking
//! exchange itself lives in [`crate::devices::modem`].

pub mod command;

pub use command::{AtCommand, AtFormatError, AtSyntax, DEFAULT_TERMINATOR};

use heapless::{String, Vec};

/// Maximum length of one response line
pub const AT_LINE_SIZE: usize = 512;
/// Maximum number of non-empty lines in one response
pub const AT_MAX_LINES: usize = 8;

/// A parsed modem response: the non-empty lines of one exchange, in order
///
/// When echo mode is active the first line is the echoed command text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtResponse {
    lines: Vec<String<AT_LINE_SIZE>, AT_MAX_LINES>,
}

impl AtResponse {
    /// Create an empty response
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Append a line
    ///
    /// Returns `Err` when the line limit is reached; the caller decides
    /// whether that is tolerable for its command.
    pub fn push_line(&mut self, line: &str) -> Result<(), ()> {
        let mut owned = String::new();
        // Oversized lines are truncated to the line capacity
        let take = line.len().min(AT_LINE_SIZE);
        owned.push_str(&line[..take]).ok();
        self.lines.push(owned).map_err(|_| ())
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the response has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|line| line.as_str())
    }

    /// First line
    pub fn first(&self) -> Option<&str> {
        self.get(0)
    }

    /// Last line
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(|line| line.as_str())
    }

    /// Iterate over the lines
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.as_str())
    }
}
