//! AT command lines as issued by the engine.

use crate::error::ErrorCategory;
use std::fmt;
use std::time::Duration;

/// Line ending appended to every command (V.25ter S3/S4 defaults).
pub const LINE_ENDING: &str = "\r\n";

/// Success terminator used when none is given.
pub const DEFAULT_TERMINATOR: &str = "OK";

/// A fully formatted command plus how to recognise its completion.
///
/// ```
/// use sim7600_at::{AtCommand, ErrorCategory};
/// use std::time::Duration;
///
/// let dial = AtCommand::new("ATD+15550100;")
///     .category(ErrorCategory::CallControl)
///     .timeout(Duration::from_secs(20));
/// assert_eq!(dial.expected(), "OK");
///
/// let data = AtCommand::new("ATD*99#").expect("CONNECT");
/// assert_eq!(data.expected(), "CONNECT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    text: String,
    expected: String,
    timeout: Option<Duration>,
    category: ErrorCategory,
}

impl AtCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expected: DEFAULT_TERMINATOR.to_string(),
            timeout: None,
            category: ErrorCategory::General,
        }
    }

    /// Override the success terminator, e.g. `CONNECT` for data calls.
    pub fn expect(mut self, terminator: impl Into<String>) -> Self {
        self.expected = terminator.into();
        self
    }

    /// Bound the whole command cycle. Without one the engine default applies.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Category reported if the device answers with an error terminator.
    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn error_category(&self) -> ErrorCategory {
        self.category
    }

    /// The bytes written to the port.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.text.len() + LINE_ENDING.len());
        line.extend_from_slice(self.text.as_bytes());
        line.extend_from_slice(LINE_ENDING.as_bytes());
        line
    }
}

impl From<&str> for AtCommand {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for AtCommand {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
