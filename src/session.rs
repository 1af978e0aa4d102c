//! Detection session state and the failure escalation policy.

use std::time::Instant;

/// Consecutive inference failures that end a session.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 6;

/// Mutable state owned by the detection loop for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionSession {
    pub running: bool,
    pub consecutive_failures: u32,
    pub last_frame_at: Option<Instant>,
}

impl DetectionSession {
    /// A fresh, running session.
    pub fn started() -> Self {
        Self {
            running: true,
            ..Self::default()
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }
}

/// How a failed inference call is classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Below threshold: keep going, show nothing.
    Transient,
    /// Threshold reached: stop the session and surface the error.
    Fatal,
}

/// Counter transitions for consecutive inference failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailurePolicy {
    threshold: u32,
}

impl FailurePolicy {
    /// `threshold` is clamped to at least 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn on_failure(&self, count: u32) -> (u32, FailureVerdict) {
        let next = count.saturating_add(1);
        let verdict = if next >= self.threshold {
            FailureVerdict::Fatal
        } else {
            FailureVerdict::Transient
        };
        (next, verdict)
    }

    pub fn on_success(&self) -> u32 {
        0
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}
