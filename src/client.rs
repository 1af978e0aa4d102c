//! Inference backend client.
//!
//! `InferenceClient` is the seam the readiness monitor and the detection loop
//! talk through. `HttpInferenceClient` is the real implementation:
//! - `GET <backend>/` for health
//! - `POST <backend>/detect` with a multipart body holding one JPEG field `file`
//!
//! Every failure (transport, non-success status, malformed body) comes back as
//! an `anyhow::Error` whose message is fit to show to the user.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

use crate::detect::{parse_error_detail, parse_health, parse_predictions, HealthStatus, Prediction};
use crate::frame::Frame;

/// Multipart field name the backend reads the image from.
pub const IMAGE_FIELD: &str = "file";

const IMAGE_FILENAME: &str = "frame.jpg";
const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

pub trait InferenceClient {
    /// Query the health endpoint. `timeout`, when given, bounds this request
    /// instead of the client's default request timeout.
    fn health(&self, timeout: Option<Duration>) -> Result<HealthStatus>;

    /// Submit one frame and return its predictions.
    fn detect(&self, frame: &Frame) -> Result<Vec<Prediction>>;
}

impl<C: InferenceClient + ?Sized> InferenceClient for &C {
    fn health(&self, timeout: Option<Duration>) -> Result<HealthStatus> {
        (**self).health(timeout)
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<Prediction>> {
        (**self).detect(frame)
    }
}

impl<C: InferenceClient + ?Sized> InferenceClient for Box<C> {
    fn health(&self, timeout: Option<Duration>) -> Result<HealthStatus> {
        (**self).health(timeout)
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<Prediction>> {
        (**self).detect(frame)
    }
}

#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
}

pub struct HttpInferenceClient {
    agent: ureq::Agent,
    health_url: Url,
    detect_url: Url,
}

impl HttpInferenceClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let (health_url, detect_url) = endpoint_urls(&config.backend_url)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout)
            .build();
        Ok(Self {
            agent,
            health_url,
            detect_url,
        })
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }

    pub fn detect_url(&self) -> &Url {
        &self.detect_url
    }
}

impl InferenceClient for HttpInferenceClient {
    fn health(&self, timeout: Option<Duration>) -> Result<HealthStatus> {
        let mut request = self.agent.get(self.health_url.as_str());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let body = read_body(request.call(), "health check")?;
        parse_health(&body)
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<Prediction>> {
        let boundary = new_boundary();
        let body = multipart_body(
            &boundary,
            IMAGE_FIELD,
            IMAGE_FILENAME,
            IMAGE_CONTENT_TYPE,
            frame.jpeg(),
        );
        let request = self.agent.post(self.detect_url.as_str()).set(
            "Content-Type",
            &format!("multipart/form-data; boundary={}", boundary),
        );
        let body = read_body(request.send_bytes(&body), "detection request")?;
        parse_predictions(&body)
    }
}

/// Derive `(health, detect)` endpoint URLs from the backend base URL.
pub fn endpoint_urls(backend_url: &str) -> Result<(Url, Url)> {
    let mut base = Url::parse(backend_url.trim())
        .with_context(|| format!("invalid backend url '{}'", backend_url))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(anyhow!(
            "unsupported backend scheme '{}'; expected http(s)",
            base.scheme()
        ));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let detect = base.join("detect").context("build detect url")?;
    Ok((base, detect))
}

fn read_body(result: Result<ureq::Response, ureq::Error>, what: &str) -> Result<String> {
    match result {
        Ok(response) => response
            .into_string()
            .with_context(|| format!("{} response unreadable", what)),
        Err(ureq::Error::Status(code, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(match parse_error_detail(&body) {
                Some(detail) => anyhow!("{} failed with HTTP {}: {}", what, code, detail),
                None => anyhow!("{} failed with HTTP {}", what, code),
            })
        }
        Err(ureq::Error::Transport(transport)) => {
            Err(anyhow!("{} failed: backend unreachable ({})", what, transport))
        }
    }
}

fn new_boundary() -> String {
    format!("----live-detect-{:016x}", rand::random::<u64>())
}

/// Build a `multipart/form-data` body with a single file part.
pub fn multipart_body(
    boundary: &str,
    field: &str,
    filename: &str,
    content_type: &str,
    payload: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
