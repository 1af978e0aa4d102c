//! Live detection client
//!
//! Streams camera frames to a remote object-detection backend and renders the
//! returned bounding boxes as an overlay, tolerating a backend that is slow to
//! load its model or drops requests now and then.
//!
//! # Architecture
//!
//! The runtime is a single-threaded task loop. Nothing in the core sleeps or
//! schedules itself; every step returns a `Schedule` and `runtime::LiveInference`
//! decides how to wait for the next one.
//!
//! 1. **Readiness**: poll the health endpoint every 2 s until the model is
//!    loaded. A 30 s watchdog starts detection anyway.
//! 2. **Detection**: capture → send → receive → render, one request in flight.
//!    Six consecutive failures stop the session and surface the error.
//! 3. **Recovery**: `retry` restarts readiness polling, `force` skips it.
//!
//! # Module Structure
//!
//! - `frame`, `ingest`: JPEG frames and the sources producing them
//! - `detect`, `client`: prediction types and the HTTP inference client
//! - `readiness`, `session`, `detection_loop`: the live-inference state machines
//! - `overlay`, `metrics`: what gets drawn and measured per cycle
//! - `schedule`, `runtime`: pacing, stop signal and the task loop
//! - `config`, `ui`: configuration layering and terminal status

pub mod client;
pub mod config;
pub mod detect;
pub mod detection_loop;
pub mod frame;
pub mod ingest;
pub mod metrics;
pub mod overlay;
pub mod readiness;
pub mod runtime;
pub mod schedule;
pub mod session;
pub mod ui;

pub use client::{HttpClientConfig, HttpInferenceClient, InferenceClient};
pub use config::{CameraSettings, DetectionSettings, LiveDetectConfig, OverlaySettings};
pub use detect::{BoundingBox, HealthStatus, Prediction};
pub use detection_loop::{CycleOutcome, DetectionLoop};
pub use frame::{Frame, FrameDimensions, FrameSource};
pub use ingest::{open_source, FileSource, SnapshotSource, SyntheticSource};
pub use metrics::Metrics;
pub use overlay::{
    render, ClassStyle, DrawCommand, DrawList, OverlaySurface, RasterOverlay, StyleTable,
};
pub use readiness::{BackendState, ProbeTicket, ReadinessMonitor, ReadinessPolicy, ReadyReason};
pub use runtime::{Control, ControlHandle, LiveInference, LiveStatus};
pub use schedule::{FramePacer, Schedule, StopSignal};
pub use session::{DetectionSession, FailurePolicy, FailureVerdict};
