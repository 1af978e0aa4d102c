//! Detection loop.
//!
//! One call to `DetectionLoop::run_cycle` is one capture → send → receive →
//! render pass. The cycle body never schedules itself; it returns a
//! `CycleOutcome` whose `schedule()` tells the runtime when to run the next
//! one. A new request is therefore only ever issued after the previous one
//! resolved.
//!
//! Failure handling:
//! - below the threshold a failed or malformed response is absorbed silently
//!   and the last rendered overlay stays as it is
//! - on reaching the threshold the session stops and the error is surfaced

use std::time::Instant;

use crate::client::InferenceClient;
use crate::frame::FrameSource;
use crate::metrics::{compute_metrics, frame_rate, Metrics};
use crate::overlay::{render, OverlaySurface, StyleTable};
use crate::readiness::BackendState;
use crate::schedule::{Schedule, StopSignal};
use crate::session::{DetectionSession, FailurePolicy, FailureVerdict};

/// Result of one detection cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Predictions received and rendered.
    Rendered { predictions: usize },
    /// The source had no valid frame yet; nothing was sent.
    NoFrame,
    /// Request failed, still below the threshold.
    TransientFailure { consecutive: u32, message: String },
    /// Threshold reached; the session is stopped.
    Fatal { message: String },
    /// Not running, backend not ready, or stop requested.
    Halted,
}

impl CycleOutcome {
    pub fn schedule(&self) -> Schedule {
        match self {
            CycleOutcome::Rendered { .. }
            | CycleOutcome::NoFrame
            | CycleOutcome::TransientFailure { .. } => Schedule::NextFrame,
            CycleOutcome::Fatal { .. } => Schedule::Idle,
            CycleOutcome::Halted => Schedule::Idle,
        }
    }
}

pub struct DetectionLoop {
    session: DetectionSession,
    metrics: Metrics,
    policy: FailurePolicy,
    styles: StyleTable,
    stop: StopSignal,
    cycles: u64,
}

impl DetectionLoop {
    pub fn new(policy: FailurePolicy, styles: StyleTable, stop: StopSignal) -> Self {
        Self {
            session: DetectionSession::default(),
            metrics: Metrics::default(),
            policy,
            styles,
            stop,
            cycles: 0,
        }
    }

    pub fn session(&self) -> &DetectionSession {
        &self.session
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    /// Completed network round trips since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_running(&self) -> bool {
        self.session.running
    }

    /// Begin a fresh session. Metrics from a previous session are dropped.
    pub fn start(&mut self) {
        self.session = DetectionSession::started();
        self.metrics = Metrics::default();
        log::info!(
            "detection loop started (failure threshold {})",
            self.policy.threshold()
        );
    }

    pub fn stop(&mut self) {
        if self.session.running {
            log::info!("detection loop stopped");
        }
        self.session.stop();
    }

    /// Stop and forget the session, including its failure counter.
    pub fn reset(&mut self) {
        self.session = DetectionSession::default();
    }

    pub fn run_cycle<S, C, O>(
        &mut self,
        backend: &BackendState,
        source: &mut S,
        client: &C,
        surface: &mut O,
        now: Instant,
    ) -> CycleOutcome
    where
        S: FrameSource + ?Sized,
        C: InferenceClient + ?Sized,
        O: OverlaySurface + ?Sized,
    {
        if self.stop.is_raised() {
            self.stop();
            return CycleOutcome::Halted;
        }
        if !self.session.running || !backend.is_ready() {
            return CycleOutcome::Halted;
        }

        let frame = match source.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => return CycleOutcome::NoFrame,
            Err(err) => {
                log::debug!("frame source {} not ready: {:#}", source.name(), err);
                return CycleOutcome::NoFrame;
            }
        };

        let previous = self.session.last_frame_at;
        let prior_fps = self.metrics.fps;
        if let Some(fps) = frame_rate(previous, now) {
            self.metrics.fps = fps;
        }
        self.session.last_frame_at = Some(now);

        let result = client.detect(&frame);
        self.cycles += 1;

        // Stopped while the request was in flight: drop its result.
        if self.stop.is_raised() || !self.session.running {
            self.stop();
            return CycleOutcome::Halted;
        }

        match result {
            Ok(predictions) => {
                self.session.consecutive_failures = self.policy.on_success();
                self.metrics = compute_metrics(&predictions, previous, now, prior_fps);
                render(surface, &predictions, frame.dimensions(), &self.styles);
                CycleOutcome::Rendered {
                    predictions: predictions.len(),
                }
            }
            Err(err) => {
                let (count, verdict) = self.policy.on_failure(self.session.consecutive_failures);
                self.session.consecutive_failures = count;
                let message = format!("{:#}", err);
                match verdict {
                    FailureVerdict::Transient => {
                        log::debug!(
                            "transient detection failure {}/{}: {}",
                            count,
                            self.policy.threshold(),
                            message
                        );
                        CycleOutcome::TransientFailure {
                            consecutive: count,
                            message,
                        }
                    }
                    FailureVerdict::Fatal => {
                        self.session.stop();
                        let message = format!(
                            "detection failed {} times in a row: {}",
                            count, message
                        );
                        log::error!("{}", message);
                        CycleOutcome::Fatal { message }
                    }
                }
            }
        }
    }
}
