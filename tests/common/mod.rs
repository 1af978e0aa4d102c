#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use live_detect::ingest::{SyntheticConfig, SyntheticSource};
use live_detect::{BoundingBox, Frame, HealthStatus, InferenceClient, Prediction, StopSignal};

pub const LOADED: HealthStatus = HealthStatus { model_loaded: true };
pub const LOADING: HealthStatus = HealthStatus {
    model_loaded: false,
};

/// Backend double answering from queues. An empty health queue repeats
/// `default_health`; an empty detect queue fails.
pub struct ScriptedBackend {
    health: RefCell<VecDeque<Result<HealthStatus>>>,
    default_health: HealthStatus,
    detect: RefCell<VecDeque<Result<Vec<Prediction>>>>,
    raise_on_detect: Option<StopSignal>,
    health_latency: Option<Duration>,
    pub health_timeouts: RefCell<Vec<Option<Duration>>>,
    pub health_calls: Cell<u32>,
    pub detect_calls: Cell<u32>,
}

impl ScriptedBackend {
    pub fn new(default_health: HealthStatus) -> Self {
        Self {
            health: RefCell::new(VecDeque::new()),
            default_health,
            detect: RefCell::new(VecDeque::new()),
            raise_on_detect: None,
            health_latency: None,
            health_timeouts: RefCell::new(Vec::new()),
            health_calls: Cell::new(0),
            detect_calls: Cell::new(0),
        }
    }

    pub fn push_health(&self, result: Result<HealthStatus>) {
        self.health.borrow_mut().push_back(result);
    }

    pub fn push_detect(&self, result: Result<Vec<Prediction>>) {
        self.detect.borrow_mut().push_back(result);
    }

    pub fn push_failures(&self, count: usize) {
        for i in 0..count {
            self.push_detect(Err(anyhow!("detection request failed: timeout #{}", i + 1)));
        }
    }

    /// Raise `stop` while a detect request is "in flight".
    pub fn raising_on_detect(mut self, stop: StopSignal) -> Self {
        self.raise_on_detect = Some(stop);
        self
    }

    /// Health answers take `latency`; a shorter request timeout cuts them
    /// off with a transport error once it runs out.
    pub fn with_health_latency(mut self, latency: Duration) -> Self {
        self.health_latency = Some(latency);
        self
    }
}

impl InferenceClient for ScriptedBackend {
    fn health(&self, timeout: Option<Duration>) -> Result<HealthStatus> {
        self.health_calls.set(self.health_calls.get() + 1);
        self.health_timeouts.borrow_mut().push(timeout);
        if let Some(latency) = self.health_latency {
            match timeout {
                Some(timeout) if timeout < latency => {
                    std::thread::sleep(timeout);
                    return Err(anyhow!("health check failed: backend unreachable (timed out)"));
                }
                _ => std::thread::sleep(latency),
            }
        }
        self.health
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(self.default_health))
    }

    fn detect(&self, _frame: &Frame) -> Result<Vec<Prediction>> {
        self.detect_calls.set(self.detect_calls.get() + 1);
        if let Some(stop) = &self.raise_on_detect {
            stop.raise();
        }
        self.detect
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted detect response")))
    }
}

pub fn small_source(warmup_frames: u32) -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig {
        name: "stub://test".to_string(),
        width: 64,
        height: 48,
        warmup_frames,
        ..SyntheticConfig::default()
    })
}

pub fn pred(class: &str, score: f32, x: f32, y: f32, w: f32, h: f32) -> Prediction {
    Prediction::new(class, score, BoundingBox::new(x, y, w, h))
}

pub fn book_and_laptop() -> Vec<Prediction> {
    vec![
        pred("book", 0.9, 10.0, 30.0, 20.0, 10.0),
        pred("laptop", 0.756, 30.0, 5.0, 25.0, 20.0),
    ]
}
