//! Scheduling instructions and display-refresh pacing.
//!
//! Steps of the live runtime never sleep themselves; they return a
//! `Schedule` and the runtime decides how to wait. `FramePacer` turns
//! `Schedule::NextFrame` into "the next refresh tick", so the detection loop
//! runs at most once per display refresh. `StopSignal` is the cancellation
//! flag every continuation checks before doing more work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// What the runtime should do before the next step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Run again at the next display-refresh opportunity.
    NextFrame,
    /// Run again after a fixed delay.
    After(Duration),
    /// Nothing to do until a control arrives.
    Idle,
    /// Shut down.
    Stop,
}

/// Shared stop flag. Raising it never interrupts an in-flight request; the
/// next check simply discards whatever that request returned.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Fixed-rate refresh clock.
#[derive(Clone, Debug)]
pub struct FramePacer {
    interval: Duration,
    last_tick: Option<Instant>,
}

impl FramePacer {
    pub fn new(refresh_hz: u32) -> Self {
        let hz = refresh_hz.max(1) as f64;
        Self {
            interval: Duration::from_secs_f64(1.0 / hz),
            last_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant of the next refresh tick at or after `now`.
    pub fn next_tick(&self, now: Instant) -> Instant {
        match self.last_tick {
            Some(last) => {
                let due = last + self.interval;
                if due > now {
                    due
                } else {
                    now
                }
            }
            None => now,
        }
    }

    /// Mark a tick as consumed at `at`.
    pub fn tick(&mut self, at: Instant) {
        self.last_tick = Some(at);
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_HZ)
    }
}
