//! Live inference runtime.
//!
//! `LiveInference` owns the readiness monitor, the detection loop, the frame
//! source, the inference client and the overlay surface. `step` performs one
//! unit of work for the current state and returns a `Schedule`; `run` turns
//! those instructions into waits:
//!
//! - `NextFrame` waits for the next refresh tick of the `FramePacer`
//! - `After(d)` waits `d` (readiness polling), waking early for controls
//! - `Idle` waits for a control (retry / force start / stop)
//! - `Stop` returns
//!
//! Controls arrive over an mpsc channel and are applied at the start of the
//! next step, never in the middle of a cycle.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::client::InferenceClient;
use crate::detection_loop::{CycleOutcome, DetectionLoop};
use crate::frame::FrameSource;
use crate::metrics::Metrics;
use crate::overlay::OverlaySurface;
use crate::readiness::{BackendState, ReadinessMonitor, ReadyReason};
use crate::schedule::{FramePacer, Schedule, StopSignal};
use crate::session::DetectionSession;

/// How long an idle runtime waits before re-checking the stop signal.
const IDLE_WAIT: Duration = Duration::from_millis(200);

/// User-facing recovery and lifecycle actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Reset and restart readiness polling from zero.
    Retry,
    /// Skip readiness/error state and start detecting immediately.
    ForceStart,
    Stop,
}

/// Cloneable sender for `Control`s.
#[derive(Clone, Debug)]
pub struct ControlHandle {
    tx: Sender<Control>,
}

impl ControlHandle {
    pub fn send(&self, control: Control) -> Result<()> {
        self.tx
            .send(control)
            .map_err(|_| anyhow!("live runtime is no longer running"))
    }
}

/// Read-only snapshot for status displays.
#[derive(Debug)]
pub struct LiveStatus<'a> {
    pub backend: &'a BackendState,
    pub ready_reason: Option<ReadyReason>,
    pub session: &'a DetectionSession,
    pub metrics: &'a Metrics,
    pub last_outcome: Option<&'a CycleOutcome>,
}

pub struct LiveInference<S, C, O> {
    monitor: ReadinessMonitor,
    detection: DetectionLoop,
    source: S,
    client: C,
    surface: O,
    controls: Receiver<Control>,
    stop: StopSignal,
    pacer: FramePacer,
    last_outcome: Option<CycleOutcome>,
}

impl<S, C, O> LiveInference<S, C, O>
where
    S: FrameSource,
    C: InferenceClient,
    O: OverlaySurface,
{
    pub fn new(
        monitor: ReadinessMonitor,
        detection: DetectionLoop,
        source: S,
        client: C,
        surface: O,
        stop: StopSignal,
        pacer: FramePacer,
    ) -> (Self, ControlHandle) {
        let (tx, controls) = mpsc::channel();
        let runtime = Self {
            monitor,
            detection,
            source,
            client,
            surface,
            controls,
            stop,
            pacer,
            last_outcome: None,
        };
        (runtime, ControlHandle { tx })
    }

    pub fn monitor(&self) -> &ReadinessMonitor {
        &self.monitor
    }

    pub fn detection(&self) -> &DetectionLoop {
        &self.detection
    }

    pub fn surface(&self) -> &O {
        &self.surface
    }

    pub fn status(&self) -> LiveStatus<'_> {
        LiveStatus {
            backend: self.monitor.state(),
            ready_reason: self.monitor.ready_reason(),
            session: self.detection.session(),
            metrics: self.detection.metrics(),
            last_outcome: self.last_outcome.as_ref(),
        }
    }

    pub fn apply_control(&mut self, control: Control) {
        match control {
            Control::Retry => {
                self.detection.reset();
                self.last_outcome = None;
                self.monitor.retry();
            }
            Control::ForceStart => {
                self.detection.reset();
                self.last_outcome = None;
                self.monitor.force_start();
            }
            Control::Stop => self.stop.raise(),
        }
    }

    /// Perform one unit of work at `now`.
    pub fn step(&mut self, now: Instant) -> Schedule {
        while let Ok(control) = self.controls.try_recv() {
            self.apply_control(control);
        }
        if self.stop.is_raised() {
            self.detection.stop();
            return Schedule::Stop;
        }

        self.monitor.poll_watchdog(now);

        if self.monitor.state().is_ready() {
            if !self.detection.is_running() {
                self.detection.start();
            }
            let outcome = self.detection.run_cycle(
                self.monitor.state(),
                &mut self.source,
                &self.client,
                &mut self.surface,
                now,
            );
            if let CycleOutcome::Fatal { message } = &outcome {
                self.monitor.fail(message.clone());
            }
            let schedule = outcome.schedule();
            self.last_outcome = Some(outcome);
            return schedule;
        }

        if self.monitor.state().is_terminal() {
            return Schedule::Idle;
        }

        if self.monitor.probe_due(now) {
            let ticket = self.monitor.check_readiness(now);
            // The request may not outlive the watchdog.
            let deadline = self.monitor.watchdog_deadline();
            let budget = deadline.map(|deadline| deadline.saturating_duration_since(now));
            let started = Instant::now();
            let result = self.client.health(budget);
            let elapsed = started.elapsed();
            let mut answered_at = now + elapsed;
            if let (Err(_), Some(deadline), Some(budget)) = (&result, deadline, budget) {
                if elapsed >= budget {
                    answered_at = answered_at.max(deadline);
                }
            }
            return self.monitor.on_health(ticket, result, answered_at);
        }
        self.monitor.next_wakeup(now)
    }

    /// Drive steps until stopped. `observe` sees the runtime after every step.
    pub fn run(&mut self, mut observe: impl FnMut(&Self)) -> Result<()> {
        if let Err(err) = self.source.connect() {
            log::warn!(
                "frame source {} not connected yet: {:#}",
                self.source.name(),
                err
            );
        }
        loop {
            let schedule = self.step(Instant::now());
            observe(self);
            match schedule {
                Schedule::NextFrame => {
                    let tick = self.pacer.next_tick(Instant::now());
                    sleep_until(tick);
                    self.pacer.tick(tick);
                }
                Schedule::After(delay) => self.wait_for_control(delay),
                Schedule::Idle => self.wait_for_control(IDLE_WAIT),
                Schedule::Stop => break,
            }
        }
        log::info!(
            "live inference stopped after {} detection round trips",
            self.detection.cycles()
        );
        Ok(())
    }

    fn wait_for_control(&mut self, timeout: Duration) {
        match self.controls.recv_timeout(timeout) {
            Ok(control) => self.apply_control(control),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(timeout),
        }
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        std::thread::sleep(deadline - now);
    }
}
