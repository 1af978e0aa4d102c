use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::client::{endpoint_urls, HttpClientConfig};
use crate::frame::{DEFAULT_JPEG_QUALITY, REQUESTED_HEIGHT, REQUESTED_WIDTH};
use crate::overlay::{parse_hex_colour, ClassStyle, StyleTable};
use crate::readiness::{ReadinessPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_WATCHDOG_TIMEOUT};
use crate::schedule::DEFAULT_REFRESH_HZ;
use crate::session::DEFAULT_FAILURE_THRESHOLD;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_CAMERA_URL: &str = "stub://camera";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CAMERA_TIMEOUT_MS: u64 = 5_000;
const MAX_REFRESH_HZ: u32 = 240;
/// Largest accepted camera width or height (8K UHD width).
pub const MAX_CAMERA_DIMENSION: u32 = 7_680;

#[derive(Debug, Deserialize, Default)]
struct LiveDetectConfigFile {
    backend_url: Option<String>,
    request_timeout_ms: Option<u64>,
    camera: Option<CameraConfigFile>,
    readiness: Option<ReadinessConfigFile>,
    detection: Option<DetectionConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    jpeg_quality: Option<u8>,
    warmup_frames: Option<u32>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ReadinessConfigFile {
    poll_interval_ms: Option<u64>,
    watchdog_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    failure_threshold: Option<u32>,
    refresh_hz: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    output_path: Option<PathBuf>,
    default_colour: Option<String>,
    colours: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct LiveDetectConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub camera: CameraSettings,
    pub readiness: ReadinessPolicy,
    pub detection: DetectionSettings,
    pub overlay: OverlaySettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub warmup_frames: u32,
    pub timeout: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_CAMERA_URL.to_string(),
            width: REQUESTED_WIDTH,
            height: REQUESTED_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            warmup_frames: 0,
            timeout: Duration::from_millis(DEFAULT_CAMERA_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub failure_threshold: u32,
    pub refresh_hz: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            refresh_hz: DEFAULT_REFRESH_HZ,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverlaySettings {
    pub output_path: Option<PathBuf>,
    pub default_colour: Option<[u8; 3]>,
    pub colours: BTreeMap<String, [u8; 3]>,
}

impl OverlaySettings {
    /// Built-in styles with the configured colours layered on top.
    pub fn style_table(&self) -> StyleTable {
        let mut table = match self.default_colour {
            Some(colour) => {
                let builtin = StyleTable::default();
                let mut table = StyleTable::new(ClassStyle::solid(colour));
                for class in ["book", "laptop"] {
                    table.insert(class, *builtin.style_for(class));
                }
                table
            }
            None => StyleTable::default(),
        };
        for (class, colour) in &self.colours {
            table.insert(class.clone(), ClassStyle::solid(*colour));
        }
        table
    }
}

impl LiveDetectConfig {
    /// Load from `LIVE_DETECT_CONFIG` (JSON, or TOML for `*.toml`), then apply
    /// `LIVE_DETECT_*` environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LIVE_DETECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LiveDetectConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let camera_file = file.camera.unwrap_or_default();
        let readiness_file = file.readiness.unwrap_or_default();
        let detection_file = file.detection.unwrap_or_default();
        let overlay_file = file.overlay.unwrap_or_default();

        let camera = CameraSettings {
            url: camera_file.url.unwrap_or(defaults.camera.url),
            width: camera_file.width.unwrap_or(defaults.camera.width),
            height: camera_file.height.unwrap_or(defaults.camera.height),
            jpeg_quality: camera_file
                .jpeg_quality
                .unwrap_or(defaults.camera.jpeg_quality),
            warmup_frames: camera_file
                .warmup_frames
                .unwrap_or(defaults.camera.warmup_frames),
            timeout: camera_file
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.camera.timeout),
        };
        let readiness = ReadinessPolicy {
            poll_interval: readiness_file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            watchdog_timeout: readiness_file
                .watchdog_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_WATCHDOG_TIMEOUT),
        };
        let detection = DetectionSettings {
            failure_threshold: detection_file
                .failure_threshold
                .unwrap_or(defaults.detection.failure_threshold),
            refresh_hz: detection_file
                .refresh_hz
                .unwrap_or(defaults.detection.refresh_hz),
        };
        let mut colours = BTreeMap::new();
        for (class, value) in overlay_file.colours.unwrap_or_default() {
            let colour = parse_hex_colour(&value)
                .with_context(|| format!("overlay colour for class '{}'", class))?;
            colours.insert(class, colour);
        }
        let overlay = OverlaySettings {
            output_path: overlay_file.output_path,
            default_colour: overlay_file
                .default_colour
                .as_deref()
                .map(parse_hex_colour)
                .transpose()
                .context("overlay default colour")?,
            colours,
        };

        Ok(Self {
            backend_url: file.backend_url.unwrap_or(defaults.backend_url),
            request_timeout: file
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            camera,
            readiness,
            detection,
            overlay,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_string("LIVE_DETECT_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(url) = env_string("LIVE_DETECT_CAMERA_URL") {
            self.camera.url = url;
        }
        if let Some(threshold) = env_parse::<u32>("LIVE_DETECT_FAILURE_THRESHOLD")? {
            self.detection.failure_threshold = threshold;
        }
        if let Some(hz) = env_parse::<u32>("LIVE_DETECT_REFRESH_HZ")? {
            self.detection.refresh_hz = hz;
        }
        if let Some(ms) = env_parse::<u64>("LIVE_DETECT_POLL_MS")? {
            self.readiness.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("LIVE_DETECT_WATCHDOG_MS")? {
            self.readiness.watchdog_timeout = Duration::from_millis(ms);
        }
        if let Some(path) = env_string("LIVE_DETECT_OVERLAY_PATH") {
            self.overlay.output_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        endpoint_urls(&self.backend_url)?;
        if self.camera.url.trim().is_empty() {
            return Err(anyhow!("camera url must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera size must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.camera.width > MAX_CAMERA_DIMENSION || self.camera.height > MAX_CAMERA_DIMENSION {
            return Err(anyhow!(
                "camera size {}x{} exceeds the {}px limit",
                self.camera.width,
                self.camera.height,
                MAX_CAMERA_DIMENSION
            ));
        }
        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }
        if self.detection.failure_threshold == 0 {
            return Err(anyhow!("failure_threshold must be at least 1"));
        }
        if !(1..=MAX_REFRESH_HZ).contains(&self.detection.refresh_hz) {
            return Err(anyhow!(
                "refresh_hz must be between 1 and {}",
                MAX_REFRESH_HZ
            ));
        }
        if self.readiness.poll_interval.is_zero() || self.readiness.watchdog_timeout.is_zero() {
            return Err(anyhow!("readiness intervals must be greater than zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn http_client(&self) -> HttpClientConfig {
        HttpClientConfig {
            backend_url: self.backend_url.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl Default for LiveDetectConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            camera: CameraSettings::default(),
            readiness: ReadinessPolicy::default(),
            detection: DetectionSettings::default(),
            overlay: OverlaySettings::default(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<LiveDetectConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer, got '{}'", key, value)),
        None => Ok(None),
    }
}
