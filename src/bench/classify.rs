//! Response classification against the gatekeeper's outcome markers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::process::TargetProcess;
use crate::error::{HarnessError, Result};

pub const ALLOWED_MARKER: &str = "Request allowed";
pub const DENIED_MARKER: &str = "Rate limit exceeded";

/// Terminal result of one `check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Allowed,
    Denied,
}

/// Result of inspecting a single output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Outcome(Outcome),
    /// Banner, echo or diagnostic output
    Skip,
}

/// Matches output lines against outcome markers, skipping unrelated
/// lines up to a fixed bound
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    allowed_marker: String,
    denied_marker: String,
    max_skipped_lines: usize,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ResponseClassifier {
    pub fn new(max_skipped_lines: usize) -> Self {
        Self {
            allowed_marker: ALLOWED_MARKER.to_string(),
            denied_marker: DENIED_MARKER.to_string(),
            max_skipped_lines,
        }
    }

    pub fn with_markers(
        mut self,
        allowed: impl Into<String>,
        denied: impl Into<String>,
    ) -> Self {
        self.allowed_marker = allowed.into();
        self.denied_marker = denied.into();
        self
    }

    pub fn max_skipped_lines(&self) -> usize {
        self.max_skipped_lines
    }

    pub fn classify(&self, line: &str) -> Classification {
        if line.contains(&self.allowed_marker) {
            Classification::Outcome(Outcome::Allowed)
        } else if line.contains(&self.denied_marker) {
            Classification::Outcome(Outcome::Denied)
        } else {
            Classification::Skip
        }
    }

    /// Read lines until one carries an outcome marker.
    ///
    /// Each read waits at most `timeout`. Fails with `ProtocolMismatch` once
    /// more than `max_skipped_lines` unrelated lines have gone by, and with
    /// `StreamClosed` if the target's stdout ends first.
    pub async fn read_outcome(
        &self,
        target: &mut TargetProcess,
        timeout: Duration,
    ) -> Result<Outcome> {
        let mut skipped = 0usize;
        loop {
            let line = target
                .read_line(timeout)
                .await?
                .ok_or(HarnessError::StreamClosed)?;

            match self.classify(&line) {
                Classification::Outcome(outcome) => return Ok(outcome),
                Classification::Skip => {
                    if skipped == self.max_skipped_lines {
                        return Err(HarnessError::ProtocolMismatch { skipped });
                    }
                    skipped += 1;
                    tracing::trace!("Skipping: {}", line);
                }
            }
        }
    }
}

/// Running counts of classified responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub allowed: u64,
    pub denied: u64,
    pub unrecognized: u64,
}

impl OutcomeTally {
    pub fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Outcome(outcome) => self.record_outcome(outcome),
            Classification::Skip => self.unrecognized += 1,
        }
    }

    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Allowed => self.allowed += 1,
            Outcome::Denied => self.denied += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.allowed + self.denied + self.unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_markers() {
        let classifier = ResponseClassifier::default();
        assert_eq!(
            classifier.classify("[12:00:01] Request allowed for user_3"),
            Classification::Outcome(Outcome::Allowed)
        );
        assert_eq!(
            classifier.classify("Rate limit exceeded for user_3. Try again later."),
            Classification::Outcome(Outcome::Denied)
        );
        assert_eq!(
            classifier.classify("Gatekeeper initialised with 10 requests / 60s"),
            Classification::Skip
        );
        assert_eq!(classifier.classify(""), Classification::Skip);
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        let classifier = ResponseClassifier::default();
        assert_eq!(classifier.classify("request allowed"), Classification::Skip);
    }

    #[test]
    fn test_custom_markers() {
        let classifier = ResponseClassifier::new(8).with_markers("OK", "THROTTLED");
        assert_eq!(
            classifier.classify("THROTTLED user_1"),
            Classification::Outcome(Outcome::Denied)
        );
        assert_eq!(classifier.classify("Request allowed"), Classification::Skip);
    }

    #[test]
    fn test_tally() {
        let classifier = ResponseClassifier::default();
        let mut tally = OutcomeTally::default();
        for line in [
            "Request allowed",
            "Request allowed",
            "Rate limit exceeded",
            "garbage",
        ] {
            tally.record(classifier.classify(line));
        }

        assert_eq!(tally.allowed, 2);
        assert_eq!(tally.denied, 1);
        assert_eq!(tally.unrecognized, 1);
        assert_eq!(tally.total(), 4);
    }
}
