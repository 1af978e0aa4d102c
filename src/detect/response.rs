//! Wire format of the detection backend.
//!
//! Health: `{ "model_loaded": bool }`.
//! Detect: `{ "predictions": [{ "bbox": [x, y, w, h], "class": str, "score": num }] }`.
//! Errors: optional `{ "detail": str }` next to a non-success status.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::prediction::{BoundingBox, Prediction};

/// Backend readiness as reported by the health endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    /// A missing field reads as "not loaded yet".
    #[serde(default)]
    pub model_loaded: bool,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    predictions: Vec<WirePrediction>,
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    bbox: Vec<f64>,
    class: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

pub fn parse_health(body: &str) -> Result<HealthStatus> {
    serde_json::from_str(body).context("invalid health response")
}

/// Parse and validate a detect response body.
///
/// A missing `predictions` array, a bbox that is not four finite numbers,
/// or a score outside `[0, 1]` makes the whole response malformed.
pub fn parse_predictions(body: &str) -> Result<Vec<Prediction>> {
    let response: DetectResponse =
        serde_json::from_str(body).context("invalid detect response")?;
    response
        .predictions
        .into_iter()
        .enumerate()
        .map(|(idx, wire)| {
            wire.into_prediction()
                .with_context(|| format!("malformed prediction #{}", idx))
        })
        .collect()
}

/// Pull `detail` out of an error body, if there is one.
pub fn parse_error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.detail)
        .map(|detail| detail.trim().to_string())
        .filter(|detail| !detail.is_empty())
}

impl WirePrediction {
    fn into_prediction(self) -> Result<Prediction> {
        let [x, y, w, h] = <[f64; 4]>::try_from(self.bbox.as_slice())
            .map_err(|_| anyhow!("bbox must have 4 values, got {}", self.bbox.len()))?;
        if ![x, y, w, h].iter().all(|v| v.is_finite()) {
            return Err(anyhow!("bbox values must be finite"));
        }
        if !(0.0..=1.0).contains(&self.score) {
            return Err(anyhow!("score {} outside [0, 1]", self.score));
        }
        Ok(Prediction::new(
            self.class,
            self.score as f32,
            BoundingBox::new(x as f32, y as f32, w as f32, h as f32),
        ))
    }
}
