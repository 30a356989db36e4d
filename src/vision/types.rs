use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Top class probability, rounded to two decimals.
    pub confidence: f32,
}

/// One detected region. `x`/`y` are the box centre and `width`/`height` its
/// size, all in pixels of the uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutput {
    pub detections: Vec<Detection>,
    /// Base64 JPEG of the image with the detections drawn; empty when unavailable.
    pub annotated_image: String,
}

impl Detection {
    pub fn corners(&self) -> (f32, f32, f32, f32) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        (
            self.x - half_w,
            self.y - half_h,
            self.x + half_w,
            self.y + half_h,
        )
    }
}

pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
