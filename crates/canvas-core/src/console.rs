//! Console panel rendering
//!
//! Turns the controller's log and error lists into display lines: logs in
//! timestamp order, then errors in the order they arrived.

use canvas_sandbox::{ConsoleEntry, ConsoleMethod, ErrorEntry};
use std::fmt::Write as _;

/// Text shown when there is nothing to display
pub const EMPTY_CONSOLE_TEXT: &str = "No console output yet...";

/// One rendered console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub level: ConsoleMethod,
    pub text: String,
    /// `line L` or `line L:C` for errors that carry a position
    pub location: Option<String>,
}

impl ConsoleLine {
    fn from_log(entry: &ConsoleEntry) -> Self {
        Self {
            level: entry.method,
            text: entry.args.join(" "),
            location: None,
        }
    }

    fn from_error(entry: &ErrorEntry) -> Self {
        let location = if entry.line > 0 {
            if entry.col > 0 {
                Some(format!("line {}:{}", entry.line, entry.col))
            } else {
                Some(format!("line {}", entry.line))
            }
        } else {
            None
        };

        Self {
            level: ConsoleMethod::Error,
            text: entry.message.clone(),
            location,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.level {
            ConsoleMethod::Error => "✖",
            ConsoleMethod::Warn => "⚠",
            ConsoleMethod::Info => "ℹ",
            ConsoleMethod::Log => "›",
        }
    }
}

/// Snapshot of the console panel
#[derive(Debug, Clone, Default)]
pub struct ConsoleView {
    lines: Vec<ConsoleLine>,
    errors: usize,
}

impl ConsoleView {
    pub fn new(logs: &[ConsoleEntry], errors: &[ErrorEntry]) -> Self {
        let mut sorted: Vec<&ConsoleEntry> = logs.iter().collect();
        sorted.sort_by_key(|entry| entry.timestamp);

        let mut lines: Vec<ConsoleLine> = sorted.into_iter().map(ConsoleLine::from_log).collect();
        lines.extend(errors.iter().map(ConsoleLine::from_error));

        Self {
            lines,
            errors: errors.len(),
        }
    }

    pub fn lines(&self) -> &[ConsoleLine] {
        &self.lines
    }

    pub fn total(&self) -> usize {
        self.lines.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Header badge, e.g. `2 errors`
    pub fn error_badge(&self) -> Option<String> {
        match self.errors {
            0 => None,
            1 => Some("1 error".to_string()),
            n => Some(format!("{} errors", n)),
        }
    }

    pub fn render_plain(&self) -> String {
        if self.is_empty() {
            return EMPTY_CONSOLE_TEXT.to_string();
        }

        let mut out = String::new();
        for line in &self.lines {
            let _ = write!(out, "{} {}", line.icon(), line.text);
            if let Some(location) = &line.location {
                let _ = write!(out, " ({})", location);
            }
            out.push('\n');
        }
        out
    }
}
