//! HTTP camera source.
//!
//! `SnapshotSource` pulls frames from a network camera over HTTP(S):
//! - single-JPEG snapshot endpoints (one GET per capture)
//! - MJPEG `multipart/x-mixed-replace` streams (frames split on SOI/EOI markers)
//!
//! Every frame is decoded and re-encoded at the configured JPEG quality so the
//! inference backend always sees the same encoding regardless of the camera.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;

use url::Url;

use crate::frame::{Frame, FrameSource, DEFAULT_JPEG_QUALITY};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for an HTTP camera source.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Snapshot or MJPEG stream URL.
    pub url: String,
    pub jpeg_quality: u8,
    pub timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:81/stream".to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            timeout: Duration::from_secs(5),
        }
    }
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

pub struct SnapshotSource {
    config: SnapshotConfig,
    agent: ureq::Agent,
    stream: Option<HttpStream>,
}

impl SnapshotSource {
    pub fn new(config: SnapshotConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse camera url")?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported camera scheme '{}'; expected http(s)",
                url.scheme()
            ));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.timeout)
            .timeout_read(config.timeout)
            .build();
        Ok(Self {
            config,
            agent,
            stream: None,
        })
    }

    fn open(&mut self) -> Result<()> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .with_context(|| format!("connect to camera {}", self.config.url))?;
        let content_type = response.header("Content-Type").unwrap_or("").to_lowercase();
        if content_type.contains("multipart") {
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(response.into_reader())));
        } else {
            self.stream = Some(HttpStream::SingleJpeg);
        }
        Ok(())
    }

    fn fetch_single_jpeg(&self) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .with_context(|| format!("fetch jpeg snapshot from {}", self.config.url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_JPEG_BYTES as u64)
            .read_to_end(&mut bytes)
            .context("read jpeg snapshot")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty jpeg snapshot"));
        }
        Ok(bytes)
    }
}

impl FrameSource for SnapshotSource {
    fn name(&self) -> &str {
        &self.config.url
    }

    fn connect(&mut self) -> Result<()> {
        self.open()
    }

    fn capture(&mut self) -> Result<Option<Frame>> {
        if self.stream.is_none() {
            self.open()?;
        }
        let bytes = if let Some(HttpStream::Mjpeg(stream)) = self.stream.as_mut() {
            match stream.read_next_jpeg() {
                Ok(bytes) => bytes,
                Err(err) => {
                    // Stream dropped; reopen on the next capture.
                    self.stream = None;
                    return Err(err);
                }
            }
        } else {
            self.fetch_single_jpeg()?
        };
        Frame::reencode(&bytes, self.config.jpeg_quality).map(Some)
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send + Sync>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send + Sync>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let drain_len = self.buffer.len() - 2;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

/// Locate the first complete JPEG (SOI `FFD8` .. EOI `FFD9`) in `buffer`.
pub(crate) fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_jpeg_between_multipart_headers() {
        let mut buf = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        let offset = buf.len();
        buf.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        buf.extend_from_slice(b"\r\n--frame");
        assert_eq!(find_jpeg_bounds(&buf), Some((offset, offset + 7)));
    }

    #[test]
    fn incomplete_jpeg_is_not_returned() {
        assert_eq!(find_jpeg_bounds(&[0xFF, 0xD8, 1, 2, 3]), None);
        assert_eq!(find_jpeg_bounds(b"no markers here"), None);
    }

    #[test]
    fn rejects_non_http_scheme() {
        let config = SnapshotConfig {
            url: "rtsp://camera/stream".to_string(),
            ..SnapshotConfig::default()
        };
        assert!(SnapshotSource::new(config).is_err());
    }

    #[test]
    fn mjpeg_stream_yields_consecutive_frames() {
        let mut body = Vec::new();
        for payload in [[1u8, 2], [3u8, 4]] {
            body.extend_from_slice(b"--b\r\n\r\n");
            body.extend_from_slice(&[0xFF, 0xD8]);
            body.extend_from_slice(&payload);
            body.extend_from_slice(&[0xFF, 0xD9]);
        }
        let mut stream = MjpegStream::new(Box::new(std::io::Cursor::new(body)));
        assert_eq!(stream.read_next_jpeg().unwrap(), vec![0xFF, 0xD8, 1, 2, 0xFF, 0xD9]);
        assert_eq!(stream.read_next_jpeg().unwrap(), vec![0xFF, 0xD8, 3, 4, 0xFF, 0xD9]);
        assert!(stream.read_next_jpeg().is_err());
    }
}
