//! Frame-rate and per-class count tracking.
//!
//! Nothing accumulates across cycles: `class_counts` is rebuilt from the
//! latest prediction set, and `fps` is derived from the last two frame
//! timestamps only.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Instant;

use crate::detect::Prediction;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub fps: u32,
    pub class_counts: BTreeMap<String, usize>,
}

impl Metrics {
    /// `"fps=10 book=2 laptop=1"`.
    pub fn summary(&self) -> String {
        let mut out = format!("fps={}", self.fps);
        for (class, count) in &self.class_counts {
            let _ = write!(out, " {}={}", class, count);
        }
        out
    }

    pub fn count(&self, class: &str) -> usize {
        self.class_counts.get(class).copied().unwrap_or(0)
    }
}

/// `round(1000 / elapsed_ms)`, or `None` without a usable previous timestamp.
pub fn frame_rate(previous: Option<Instant>, now: Instant) -> Option<u32> {
    let elapsed_ms = now.checked_duration_since(previous?)?.as_secs_f64() * 1000.0;
    if elapsed_ms <= 0.0 {
        return None;
    }
    Some((1000.0 / elapsed_ms).round() as u32)
}

pub fn count_classes(predictions: &[Prediction]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for prediction in predictions {
        *counts.entry(prediction.class_label.clone()).or_insert(0) += 1;
    }
    counts
}

/// Metrics for one cycle. `prior_fps` is kept when no rate can be computed.
pub fn compute_metrics(
    predictions: &[Prediction],
    previous: Option<Instant>,
    now: Instant,
    prior_fps: u32,
) -> Metrics {
    Metrics {
        fps: frame_rate(previous, now).unwrap_or(prior_fps),
        class_counts: count_classes(predictions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use std::time::Duration;

    fn pred(class: &str, score: f32) -> Prediction {
        Prediction::new(class, score, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn fps_from_hundred_ms_gap() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(frame_rate(Some(t0), t1), Some(10));
    }

    #[test]
    fn fps_rounds_to_nearest() {
        let t0 = Instant::now();
        assert_eq!(frame_rate(Some(t0), t0 + Duration::from_millis(30)), Some(33));
        assert_eq!(frame_rate(Some(t0), t0 + Duration::from_millis(16)), Some(63));
    }

    #[test]
    fn fps_kept_without_previous_timestamp() {
        let now = Instant::now();
        assert_eq!(frame_rate(None, now), None);
        assert_eq!(frame_rate(Some(now), now), None);
        assert_eq!(compute_metrics(&[], None, now, 12).fps, 12);
    }

    #[test]
    fn counts_per_class() {
        let preds = vec![pred("book", 0.9), pred("book", 0.4), pred("laptop", 0.8)];
        let metrics = compute_metrics(&preds, None, Instant::now(), 0);
        assert_eq!(metrics.count("book"), 2);
        assert_eq!(metrics.count("laptop"), 1);
        assert_eq!(metrics.class_counts.len(), 2);
        assert_eq!(metrics.summary(), "fps=0 book=2 laptop=1");
    }

    #[test]
    fn counts_do_not_accumulate() {
        let now = Instant::now();
        let first = compute_metrics(&[pred("book", 0.9)], None, now, 0);
        assert_eq!(first.count("book"), 1);
        let second = compute_metrics(&[pred("laptop", 0.9)], None, now, first.fps);
        assert_eq!(second.count("book"), 0);
        assert_eq!(second.count("laptop"), 1);
    }
}
