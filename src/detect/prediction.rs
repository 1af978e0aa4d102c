/// Axis-aligned box in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// One detected object instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub bbox: BoundingBox,
    pub class_label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Prediction {
    pub fn new(class_label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            bbox,
            class_label: class_label.into(),
            confidence,
        }
    }

    /// Confidence as a whole percentage, rounded to nearest.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round().max(0.0) as u32
    }

    /// Label text drawn next to the box, e.g. `"book 90%"`.
    pub fn label(&self) -> String {
        format!("{} {}%", self.class_label, self.confidence_percent())
    }
}
