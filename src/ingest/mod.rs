//! Frame ingestion sources.
//!
//! This module provides the sources the detection loop can pull frames from:
//! - HTTP camera snapshots / MJPEG streams (`http://`, `https://`)
//! - Local JPEG files or directories of JPEGs, replayed in a loop
//! - Synthetic test pattern (`stub://`)
//!
//! All sources hand out JPEG-encoded `Frame`s at a fixed encode quality.
//! A source that is still warming up returns `Ok(None)` from `capture`.

pub mod file;
pub mod snapshot;
pub mod synthetic;

use anyhow::Result;

use crate::config::CameraSettings;
use crate::frame::FrameSource;

pub use file::{FileConfig, FileSource};
pub use snapshot::{SnapshotConfig, SnapshotSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Open the source named by `settings.url`, dispatching on its scheme.
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    let url = settings.url.trim();
    let source: Box<dyn FrameSource> = if url.starts_with("stub://") {
        Box::new(SyntheticSource::new(SyntheticConfig {
            name: url.to_string(),
            width: settings.width,
            height: settings.height,
            jpeg_quality: settings.jpeg_quality,
            warmup_frames: settings.warmup_frames,
        }))
    } else if url.starts_with("http://") || url.starts_with("https://") {
        Box::new(SnapshotSource::new(SnapshotConfig {
            url: url.to_string(),
            jpeg_quality: settings.jpeg_quality,
            timeout: settings.timeout,
        })?)
    } else {
        Box::new(FileSource::new(FileConfig {
            path: url.to_string(),
            jpeg_quality: settings.jpeg_quality,
        })?)
    };
    log::info!("frame source: {}", source.name());
    Ok(source)
}
