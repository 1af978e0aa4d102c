//! Encoded frame container and the frame source seam.
//!
//! - `Frame`: one JPEG snapshot plus the native pixel dimensions it was taken at.
//! - `FrameSource`: anything that can hand out "the current frame" on demand.
//!
//! Sources live in `ingest`. The detection loop only ever calls
//! `FrameSource::capture` and never looks at pixels itself.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GenericImageView};

/// Default JPEG quality for re-encoded and synthetic frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Requested capture width.
pub const REQUESTED_WIDTH: u32 = 640;

/// Requested capture height.
pub const REQUESTED_HEIGHT: u32 = 480;

/// Native pixel dimensions of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One still image sampled from the live source, already JPEG-encoded.
#[derive(Clone, Debug)]
pub struct Frame {
    jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap an encoded JPEG. Empty payloads and zero-sized frames are rejected.
    pub fn from_jpeg(jpeg: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if jpeg.is_empty() {
            return Err(anyhow!("frame payload is empty"));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("frame has zero dimensions ({}x{})", width, height));
        }
        Ok(Self {
            jpeg,
            width,
            height,
        })
    }

    /// Encode raw RGB8 pixels at the given JPEG quality.
    pub fn encode_rgb(pixels: &[u8], width: u32, height: u32, quality: u8) -> Result<Self> {
        let jpeg = encode_jpeg(pixels, width, height, quality)?;
        Self::from_jpeg(jpeg, width, height)
    }

    /// Decode an arbitrary image payload and re-encode it as JPEG at `quality`.
    pub fn reencode(bytes: &[u8], quality: u8) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("decode frame")?;
        let (width, height) = image.dimensions();
        let rgb = image.into_rgb8();
        Self::encode_rgb(rgb.as_raw(), width, height, quality)
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.width, self.height)
    }
}

/// Something that can capture the current frame of a live stream.
///
/// `Ok(None)` means the device is not producing valid frames yet (still
/// opening, warming up). Callers reschedule without treating it as a failure.
pub trait FrameSource {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Capture the current frame.
    fn capture(&mut self) -> Result<Option<Frame>>;

    /// Optional connect hook, called once before the first capture.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capture(&mut self) -> Result<Option<Frame>> {
        (**self).capture()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }
}

/// Encode RGB8 pixels into a JPEG byte buffer.
pub fn encode_jpeg(pixels: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(anyhow!(
            "rgb buffer has {} bytes, expected {} for {}x{}",
            pixels.len(),
            expected,
            width,
            height
        ));
    }
    let mut out = Vec::with_capacity(expected / 8);
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(pixels, width, height, ExtendedColorType::Rgb8)
        .context("encode jpeg")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_frame_keeps_dimensions() {
        let pixels = vec![128u8; 32 * 16 * 3];
        let frame = Frame::encode_rgb(&pixels, 32, 16, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(frame.dimensions(), FrameDimensions::new(32, 16));
        assert_eq!(&frame.jpeg()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn reencode_reads_back_dimensions() {
        let pixels = vec![10u8; 8 * 4 * 3];
        let jpeg = encode_jpeg(&pixels, 8, 4, 90).unwrap();
        let frame = Frame::reencode(&jpeg, 50).unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(encode_jpeg(&[0u8; 10], 4, 4, 80).is_err());
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(Frame::from_jpeg(Vec::new(), 640, 480).is_err());
        assert!(Frame::from_jpeg(vec![1, 2, 3], 0, 480).is_err());
    }
}
