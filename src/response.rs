//! Response framing: terminator recognition and the accumulated buffer.

use crate::error::DeviceFailure;
use serde::Serialize;

const ERROR: &str = "ERROR";
const CME_PREFIX: &str = "+CME ERROR:";
const CMS_PREFIX: &str = "+CMS ERROR:";

/// What a received line means for the command in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// The expected success terminator.
    Terminator,
    /// An error terminator.
    Failure(DeviceFailure),
    /// Anything else, echo and empty lines included.
    Data,
}

/// Classify `line` against the expected terminator.
///
/// Matching is whole-line after trimming trailing whitespace: an SMS body
/// reading "OK thanks" is data. Empty lines are always data. The expected
/// terminator wins over the error set, so `expect("ERROR")` is possible.
pub fn classify(line: &str, expected: &str) -> LineKind {
    let line = line.trim_end();
    if line.is_empty() {
        return LineKind::Data;
    }
    if line == expected.trim_end() {
        return LineKind::Terminator;
    }
    if line == ERROR {
        return LineKind::Failure(DeviceFailure::Error);
    }
    if let Some(detail) = line.strip_prefix(CME_PREFIX) {
        return LineKind::Failure(DeviceFailure::Cme(detail.trim().to_string()));
    }
    if let Some(detail) = line.strip_prefix(CMS_PREFIX) {
        return LineKind::Failure(DeviceFailure::Cms(detail.trim().to_string()));
    }
    LineKind::Data
}

/// Lines received for one successful command, terminator included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    command: String,
    lines: Vec<String>,
}

impl Response {
    pub(crate) fn new(command: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            command: command.into(),
            lines,
        }
    }

    /// Every received line, in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The buffer as one newline-joined string.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// The line that completed the command.
    pub fn terminator(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    /// Information lines: no echo, no blank lines, no terminator.
    pub fn body(&self) -> Vec<&str> {
        let end = self.lines.len().saturating_sub(1);
        self.lines[..end]
            .iter()
            .map(|line| line.trim_end())
            .enumerate()
            .filter(|(i, line)| !line.is_empty() && !(*i == 0 && *line == self.command))
            .map(|(_, line)| line)
            .collect()
    }

    /// Whether any line equals `needle` exactly (after trimming).
    pub fn contains_line(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.trim_end() == needle)
    }
}

/// Join buffered lines the way [`Response::text`] does.
pub(crate) fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}
