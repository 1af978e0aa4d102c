//! Local file frame source.
//!
//! `FileSource` replays still images from disk as if they were a live camera:
//! - a single image file is returned on every capture
//! - a directory is scanned for `*.jpg` / `*.jpeg` and replayed in name order, looping
//!
//! Remote URLs are rejected; use `SnapshotSource` for network cameras.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, FrameSource, DEFAULT_JPEG_QUALITY};

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file or directory path.
    pub path: String,
    pub jpeg_quality: u8,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

pub struct FileSource {
    config: FileConfig,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        let files = list_images(Path::new(&config.path))?;
        if files.is_empty() {
            return Err(anyhow!("no jpeg images found at {}", config.path));
        }
        Ok(Self {
            config,
            files,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for FileSource {
    fn name(&self) -> &str {
        &self.config.path
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "FileSource: replaying {} image(s) from {}",
            self.files.len(),
            self.config.path
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<Option<Frame>> {
        let path = &self.files[self.cursor % self.files.len()];
        self.cursor = (self.cursor + 1) % self.files.len();
        let bytes =
            std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        let frame = Frame::reencode(&bytes, self.config.jpeg_quality)
            .with_context(|| format!("decode image {}", path.display()))?;
        Ok(Some(frame))
    }
}

fn list_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(anyhow!("image path {} does not exist", path.display()));
    }
    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(path).with_context(|| format!("list images in {}", path.display()))?
    {
        let entry_path = entry?.path();
        let is_jpeg = entry_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
            .unwrap_or(false);
        if is_jpeg && entry_path.is_file() {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
