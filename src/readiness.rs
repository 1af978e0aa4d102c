//! Backend readiness monitor.
//!
//! Explicit state machine over `BackendState`. The monitor never performs I/O
//! and never sleeps; the runtime asks it whether a probe is due, runs the
//! health request, and feeds the outcome back:
//!
//! ```text
//! Connecting --model_loaded--> Ready(ModelLoaded)
//! Connecting --not loaded----> ModelLoading --2000ms--> Connecting ...
//! Connecting --request error-> Error(message)        (polling stops)
//! any non-terminal --30s-----> Ready(WatchdogExpired)
//! any --force_start----------> Ready(ForcedStart)
//! any --retry----------------> Connecting             (fresh watchdog)
//! ```
//!
//! The watchdog deadline is set by the first probe of a readiness cycle and is
//! not extended by the follow-up polls.

use anyhow::Result;
use std::fmt;
use std::time::{Duration, Instant};

use crate::detect::HealthStatus;
use crate::schedule::Schedule;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendState {
    Connecting,
    ModelLoading,
    Ready,
    Error(String),
}

impl BackendState {
    pub fn is_ready(&self) -> bool {
        matches!(self, BackendState::Ready)
    }

    /// Ready and Error end polling; everything else is still waiting.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BackendState::Ready | BackendState::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            BackendState::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendState::Connecting => write!(f, "connecting"),
            BackendState::ModelLoading => write!(f, "model loading"),
            BackendState::Ready => write!(f, "ready"),
            BackendState::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Why the monitor reached `Ready`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyReason {
    ModelLoaded,
    /// Policy override after the watchdog expired; readiness is unconfirmed.
    WatchdogExpired,
    ForcedStart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub watchdog_timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
        }
    }
}

/// Identifies one health probe. Results for an outdated ticket are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeTicket(u64);

#[derive(Debug)]
pub struct ReadinessMonitor {
    policy: ReadinessPolicy,
    state: BackendState,
    ready_reason: Option<ReadyReason>,
    generation: u64,
    watchdog_deadline: Option<Instant>,
    next_poll_at: Option<Instant>,
    probe_pending: bool,
}

impl ReadinessMonitor {
    pub fn new(policy: ReadinessPolicy) -> Self {
        Self {
            policy,
            state: BackendState::Connecting,
            ready_reason: None,
            generation: 0,
            watchdog_deadline: None,
            next_poll_at: None,
            probe_pending: true,
        }
    }

    pub fn state(&self) -> &BackendState {
        &self.state
    }

    pub fn ready_reason(&self) -> Option<ReadyReason> {
        self.ready_reason
    }

    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog_deadline
    }

    pub fn next_poll_at(&self) -> Option<Instant> {
        self.next_poll_at
    }

    /// Start a health probe: move to `Connecting` and arm the watchdog if
    /// this is the first probe of the cycle.
    pub fn check_readiness(&mut self, now: Instant) -> ProbeTicket {
        self.state = BackendState::Connecting;
        self.ready_reason = None;
        if self.watchdog_deadline.is_none() {
            self.watchdog_deadline = Some(now + self.policy.watchdog_timeout);
        }
        self.probe_pending = false;
        self.next_poll_at = None;
        ProbeTicket(self.generation)
    }

    /// Apply the outcome of the probe identified by `ticket`.
    pub fn on_health(
        &mut self,
        ticket: ProbeTicket,
        result: Result<HealthStatus>,
        now: Instant,
    ) -> Schedule {
        if ticket.0 != self.generation || self.state.is_terminal() {
            log::debug!("ignoring outdated health result ({})", self.state);
            return self.next_wakeup(now);
        }
        if self.poll_watchdog(now) {
            return Schedule::NextFrame;
        }
        match result {
            Ok(status) if status.model_loaded => {
                log::info!("backend ready: model loaded");
                self.become_ready(ReadyReason::ModelLoaded);
                Schedule::NextFrame
            }
            Ok(_) => {
                log::info!(
                    "backend up, model still loading; polling again in {}ms",
                    self.policy.poll_interval.as_millis()
                );
                self.state = BackendState::ModelLoading;
                self.next_poll_at = Some(now + self.policy.poll_interval);
                Schedule::After(self.policy.poll_interval)
            }
            Err(err) => {
                let message = format!("{:#}", err);
                log::error!("backend connection failed: {}", message);
                self.fail(message);
                Schedule::Idle
            }
        }
    }

    /// Fire the watchdog if its deadline has passed. Returns true when it fired.
    pub fn poll_watchdog(&mut self, now: Instant) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        match self.watchdog_deadline {
            Some(deadline) if now >= deadline => {
                log::warn!(
                    "backend not confirmed ready after {}s; starting detection anyway",
                    self.policy.watchdog_timeout.as_secs()
                );
                self.become_ready(ReadyReason::WatchdogExpired);
                true
            }
            _ => false,
        }
    }

    /// True when a health probe should be issued at `now`.
    pub fn probe_due(&self, now: Instant) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.probe_pending || self.next_poll_at.is_some_and(|at| now >= at)
    }

    /// When the monitor next needs attention.
    pub fn next_wakeup(&self, now: Instant) -> Schedule {
        match self.state {
            BackendState::Ready => Schedule::NextFrame,
            BackendState::Error(_) => Schedule::Idle,
            _ if self.probe_pending => Schedule::After(Duration::ZERO),
            _ => {
                let due = [self.next_poll_at, self.watchdog_deadline]
                    .into_iter()
                    .flatten()
                    .min();
                match due {
                    Some(at) => Schedule::After(at.saturating_duration_since(now)),
                    None => Schedule::Idle,
                }
            }
        }
    }

    /// User override: proceed to `Ready` without confirmation.
    pub fn force_start(&mut self) {
        self.generation += 1;
        log::warn!("force start: skipping backend readiness");
        self.become_ready(ReadyReason::ForcedStart);
    }

    /// User retry: restart readiness polling from scratch.
    pub fn retry(&mut self) {
        self.generation += 1;
        log::info!("retrying backend connection");
        self.state = BackendState::Connecting;
        self.ready_reason = None;
        self.cancel_timers();
        self.probe_pending = true;
    }

    /// Enter `Error` with `message`; polling stops until `retry`/`force_start`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = BackendState::Error(message.into());
        self.ready_reason = None;
        self.cancel_timers();
        self.probe_pending = false;
    }

    fn become_ready(&mut self, reason: ReadyReason) {
        self.state = BackendState::Ready;
        self.ready_reason = Some(reason);
        self.cancel_timers();
        self.probe_pending = false;
    }

    fn cancel_timers(&mut self) {
        self.watchdog_deadline = None;
        self.next_poll_at = None;
    }
}

impl Default for ReadinessMonitor {
    fn default() -> Self {
        Self::new(ReadinessPolicy::default())
    }
}
