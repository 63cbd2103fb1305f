//! Generator-log progress extraction
//!
//! The generator prefixes each build step with `[N/M]`. Step changes are
//! translated into a percentage so the IDE can drive a progress bar.

use regex::Regex;

/// Extracts build progress from generator output lines.
pub struct NinjaProgressParser {
    step: Regex,
    last_percent: Option<u32>,
}

impl NinjaProgressParser {
    pub fn new() -> Self {
        Self {
            step: Regex::new(r"^\[(\d+)/(\d+)\]").unwrap(),
            last_percent: None,
        }
    }

    /// Returns a percentage when the line advances the build to a new step.
    pub fn push_line(&mut self, line: &str) -> Option<u32> {
        let caps = self.step.captures(line)?;
        let done: u64 = caps[1].parse().ok()?;
        let total: u64 = caps[2].parse().ok()?;
        if total == 0 {
            return None;
        }
        let percent = (done * 100 / total) as u32;
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }
}

impl Default for NinjaProgressParser {
    fn default() -> Self {
        Self::new()
    }
}
