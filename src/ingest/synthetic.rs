//! Synthetic frame source (`stub://`).
//!
//! Produces a moving test pattern so the whole pipeline can run without a
//! camera. The first `warmup_frames` captures return `None`, the same way a
//! real capture device reports "not ready" while it opens.

use anyhow::Result;
use rand::Rng;

use crate::frame::{Frame, FrameSource, DEFAULT_JPEG_QUALITY, REQUESTED_HEIGHT, REQUESTED_WIDTH};

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    /// Number of initial captures that report "not ready".
    pub warmup_frames: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: REQUESTED_WIDTH,
            height: REQUESTED_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            warmup_frames: 0,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    capture_calls: u64,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            capture_calls: 0,
            frame_count: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    /// Gradient background with a bright square sweeping left to right.
    fn generate_pixels(&self) -> Vec<u8> {
        let (w, h) = (self.config.width as usize, self.config.height as usize);
        let mut pixels = vec![0u8; w * h * 3];
        let side = (w.min(h) / 4).max(1);
        let travel = w.saturating_sub(side).max(1) as u64;
        let x0 = ((self.frame_count * 8) % travel) as usize;
        let y0 = (h - side.min(h)) / 2;
        let mut rng = rand::thread_rng();

        for y in 0..h {
            for x in 0..w {
                let idx = (y * w + x) * 3;
                let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
                if inside {
                    pixels[idx] = 240;
                    pixels[idx + 1] = 220;
                    pixels[idx + 2] = 40;
                } else {
                    let noise: u8 = rng.gen_range(0..8);
                    pixels[idx] = ((x * 255) / w.max(1)) as u8 / 2 + noise;
                    pixels[idx + 1] = ((y * 255) / h.max(1)) as u8 / 2 + noise;
                    pixels[idx + 2] = 64 + noise;
                }
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {}", self.config.name);
        Ok(())
    }

    fn capture(&mut self) -> Result<Option<Frame>> {
        self.capture_calls += 1;
        if self.capture_calls <= self.config.warmup_frames as u64 {
            return Ok(None);
        }
        let pixels = self.generate_pixels();
        self.frame_count += 1;
        let frame = Frame::encode_rgb(
            &pixels,
            self.config.width,
            self.config.height,
            self.config.jpeg_quality,
        )?;
        Ok(Some(frame))
    }
}
