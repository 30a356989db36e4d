use super::{Detection, DetectionOutput, annotate, onnx::OnnxSession, round2};
use crate::{Error, Result, config::DetectorConfig};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, imageops};
use ndarray::Array4;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);
const MAX_DETECTIONS: usize = 300;

static NAME_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).expect("name entry pattern is valid")
});

pub trait Detector: Send + Sync {
    fn detect(&self, image_path: &Path) -> Result<DetectionOutput>;
}

/// YOLOv8-style detector exported to ONNX. The model emits one
/// `[1, 4 + classes, anchors]` tensor of centre/size boxes and class scores.
pub struct OnnxDetector {
    session: OnnxSession,
    labels: Vec<String>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

/// Maps letterboxed model coordinates back onto the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub width: u32,
    pub height: u32,
}

/// A box in source-image corner coordinates before labels are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub score: f32,
}

impl OnnxDetector {
    pub fn load(config: &DetectorConfig) -> Result<Self> {
        let session = OnnxSession::load(Path::new(&config.path), "Detector")?;

        let labels = if config.labels.is_empty() {
            match session.metadata("names")? {
                Some(names) => parse_names_metadata(&names),
                None => {
                    warn!("Detector model carries no class names; using class indices");
                    Vec::new()
                }
            }
        } else {
            config.labels.clone()
        };

        info!(
            "Detector ready: {} classes, {}x{} input, confidence >= {}",
            labels.len(),
            config.input_size,
            config.input_size,
            config.confidence_threshold
        );

        Ok(Self {
            session,
            labels,
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        })
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionOutput> {
        let image = image::open(image_path)?;
        let (input, letterbox) = preprocess(&image, self.input_size);

        let (shape, data) = self.session.run(input)?;
        debug!("Detector output shape: {:?}", shape);

        let candidates = decode_predictions(&data, &shape, self.confidence_threshold, &letterbox)?;
        let kept = non_max_suppression(candidates, self.iou_threshold);

        let detections = to_detections(kept, &self.labels);

        info!("Total detections: {}", detections.len());

        let annotated_image = annotate::render_base64(&image, &detections)?;
        Ok(DetectionOutput {
            detections,
            annotated_image,
        })
    }
}

/// Letterboxes the image into a `size`x`size` square (aspect preserved,
/// grey padding, centred) and lays it out as a `[1, 3, size, size]` tensor.
pub fn preprocess(image: &DynamicImage, size: u32) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = image
        .resize_exact(new_w, new_h, imageops::FilterType::Triangle)
        .to_rgb8();
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let mut canvas = RgbImage::from_pixel(size, size, LETTERBOX_FILL);
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let side = size as usize;
    let mut tensor = Array4::zeros((1, 3, side, side));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            width,
            height,
        },
    )
}

/// Turns the raw `[1, 4 + classes, anchors]` output into boxes on the source
/// image whose best class score reaches `threshold`.
pub fn decode_predictions(
    data: &[f32],
    shape: &[usize],
    threshold: f32,
    letterbox: &Letterbox,
) -> Result<Vec<RawBox>> {
    let (rows, anchors) = match shape {
        [1, rows, anchors] if *rows > 4 => (*rows, *anchors),
        _ => {
            return Err(Error::model(format!(
                "unexpected detector output shape {:?}",
                shape
            )));
        }
    };
    if data.len() != rows * anchors {
        return Err(Error::model(format!(
            "detector output has {} values, shape {:?} needs {}",
            data.len(),
            shape,
            rows * anchors
        )));
    }

    let at = |row: usize, anchor: usize| data[row * anchors + anchor];
    let max_x = letterbox.width as f32;
    let max_y = letterbox.height as f32;

    let mut boxes = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..rows)
            .map(|row| (row - 4, at(row, anchor)))
            .fold((0, f32::MIN), |best, candidate| {
                if candidate.1 > best.1 { candidate } else { best }
            });
        if score.is_nan() || score < threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let unmap_x = |v: f32| ((v - letterbox.pad_x) / letterbox.scale).clamp(0.0, max_x);
        let unmap_y = |v: f32| ((v - letterbox.pad_y) / letterbox.scale).clamp(0.0, max_y);

        let raw = RawBox {
            x1: unmap_x(cx - w / 2.0),
            y1: unmap_y(cy - h / 2.0),
            x2: unmap_x(cx + w / 2.0),
            y2: unmap_y(cy + h / 2.0),
            class_id,
            score,
        };
        if raw.x2 > raw.x1 && raw.y2 > raw.y1 {
            boxes.push(raw);
        }
    }

    Ok(boxes)
}

/// Converts surviving corner boxes into numbered center/size detections.
/// Classes without a name are reported as `class_{id}`.
pub fn to_detections(boxes: Vec<RawBox>, labels: &[String]) -> Vec<Detection> {
    boxes
        .into_iter()
        .enumerate()
        .map(|(id, raw)| Detection {
            id,
            x: (raw.x1 + raw.x2) / 2.0,
            y: (raw.y1 + raw.y2) / 2.0,
            width: raw.x2 - raw.x1,
            height: raw.y2 - raw.y1,
            label: labels
                .get(raw.class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", raw.class_id)),
            confidence: round2(raw.score),
        })
        .collect()
}

/// Greedy per-class suppression, highest score first.
pub fn non_max_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<RawBox> = Vec::new();
    for candidate in boxes {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
            if kept.len() == MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}

fn iou(a: &RawBox, b: &RawBox) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    let union = (a.x2 - a.x1) * (a.y2 - a.y1) + (b.x2 - b.x1) * (b.y2 - b.y1) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Parses the Ultralytics `names` metadata, e.g. `{0: 'acne', 1: 'papule'}`.
pub fn parse_names_metadata(raw: &str) -> Vec<String> {
    let mut entries: Vec<(usize, String)> = NAME_ENTRY
        .captures_iter(raw)
        .filter_map(|caps| {
            let index = caps.get(1)?.as_str().parse().ok()?;
            Some((index, caps.get(2)?.as_str().to_string()))
        })
        .collect();
    entries.sort_by_key(|(index, _)| *index);

    let len = entries.last().map(|(index, _)| index + 1).unwrap_or(0);
    let mut names: Vec<String> = (0..len).map(|i| format!("class_{}", i)).collect();
    for (index, name) in entries {
        names[index] = name;
    }
    names
}
