//! Configure-log classification
//!
//! The tool's console output is consumed line by line, in arrival order.
//! Errors are single-line and emitted immediately; warnings come in small
//! blocks whose introducer line declares how many follow-up lines belong
//! to the same diagnostic. Correctly capturing those trailing lines is
//! what makes "jump to location" work on the IDE side, so the buffering
//! here must be exact.

use regex::Regex;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Source location extracted from an error line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// One categorized piece of tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<FileLocation>,
}

impl Diagnostic {
    fn error(message: impl Into<String>, location: Option<FileLocation>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location,
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }
}

struct WarningPattern {
    /// Lines after the introducer that belong to the same diagnostic.
    extra_lines: usize,
    regex: Regex,
}

/// Line-oriented classifier for the tool's configure output.
pub struct OutputClassifier {
    error_file_loc: Regex,
    error_option: Regex,
    warnings: Vec<WarningPattern>,
    remaining: usize,
    pending: Vec<String>,
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self {
            error_file_loc: Regex::new(r"(^.*meson\.build):(\d+):(\d+): ERROR").unwrap(),
            error_option: Regex::new(r#"ERROR: Value "(\w+)" "#).unwrap(),
            warnings: vec![
                WarningPattern {
                    extra_lines: 2,
                    regex: Regex::new(r"WARNING: Unknown options:").unwrap(),
                },
                WarningPattern {
                    extra_lines: 1,
                    regex: Regex::new(
                        r"WARNING: Project specifies a minimum meson_version|WARNING: Deprecated features used:",
                    )
                    .unwrap(),
                },
                WarningPattern {
                    extra_lines: 0,
                    regex: Regex::new(r"WARNING: ").unwrap(),
                },
            ],
            remaining: 0,
            pending: Vec::new(),
        }
    }

    /// Classify one line. `None` means the line is unclassified (or was
    /// absorbed into a pending warning block).
    pub fn push_line(&mut self, line: &str) -> Option<Diagnostic> {
        if self.remaining > 0 {
            return self.buffer_line(line);
        }
        if self.error_option.is_match(line) {
            return Some(Diagnostic::error(line, None));
        }
        if let Some(caps) = self.error_file_loc.captures(line) {
            let location = FileLocation {
                file: PathBuf::from(&caps[1]),
                line: caps[2].parse().unwrap_or(0),
                column: caps[3].parse().unwrap_or(0),
            };
            return Some(Diagnostic::error(line, Some(location)));
        }
        for pattern in &self.warnings {
            if pattern.regex.is_match(line) {
                self.remaining = pattern.extra_lines + 1;
                return self.buffer_line(line);
            }
        }
        None
    }

    /// Classify a whole captured chunk, line by line.
    pub fn push_chunk(&mut self, data: &str) -> Vec<Diagnostic> {
        data.lines().filter_map(|line| self.push_line(line)).collect()
    }

    fn buffer_line(&mut self, line: &str) -> Option<Diagnostic> {
        self.remaining -= 1;
        self.pending.push(line.to_owned());
        if self.remaining == 0 {
            let message = self.pending.join("\n");
            self.pending.clear();
            return Some(Diagnostic::warning(message));
        }
        None
    }
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_located_error_is_single_line() {
        let mut classifier = OutputClassifier::new();
        let diag = classifier
            .push_line("/proj/meson.build:12:4: ERROR: Unknown function bad()")
            .unwrap();
        assert_eq!(diag.severity, Severity::Error);
        let location = diag.location.unwrap();
        assert_eq!(location.file, PathBuf::from("/proj/meson.build"));
        assert_eq!(location.line, 12);
        assert_eq!(location.column, 4);
    }

    #[test]
    fn test_option_value_error() {
        let mut classifier = OutputClassifier::new();
        let diag = classifier
            .push_line(r#"ERROR: Value "maybe" for combo option is not one of the choices."#)
            .unwrap();
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.location.is_none());
    }

    #[test]
    fn test_three_line_warning_block() {
        let mut classifier = OutputClassifier::new();
        assert!(classifier.push_line("WARNING: Unknown options:").is_none());
        assert!(classifier.push_line("  foo").is_none());
        let diag = classifier.push_line("  bar").unwrap();
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.message, "WARNING: Unknown options:\n  foo\n  bar");
        // the next line is back to normal classification
        assert!(classifier.push_line("The Meson build system").is_none());
    }

    #[test]
    fn test_two_line_warning_block() {
        let mut classifier = OutputClassifier::new();
        assert!(classifier.push_line("WARNING: Deprecated features used:").is_none());
        let diag = classifier.push_line(" * 0.50.0: {'dict arg'}").unwrap();
        assert_eq!(diag.message, "WARNING: Deprecated features used:\n * 0.50.0: {'dict arg'}");
    }

    #[test]
    fn test_plain_warning_is_single_line() {
        let mut classifier = OutputClassifier::new();
        let diag = classifier.push_line("WARNING: Broken python installation").unwrap();
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.message, "WARNING: Broken python installation");
    }

    #[test]
    fn test_unmatched_lines_pass_through() {
        let mut classifier = OutputClassifier::new();
        assert!(classifier.push_line("The Meson build system").is_none());
        assert!(classifier.push_line("Build type: native build").is_none());
    }

    #[test]
    fn test_push_chunk_preserves_line_order() {
        let mut classifier = OutputClassifier::new();
        let diags = classifier.push_chunk(
            "WARNING: Unknown options:\n  foo\n  bar\nProject name: demo\n",
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "WARNING: Unknown options:\n  foo\n  bar");
    }
}
