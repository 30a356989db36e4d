use super::{ClassLabels, ClassificationResult, onnx::OnnxSession, round2};
use crate::{
    Error, Result,
    config::{ClassifierConfig, TensorLayout},
};
use image::{DynamicImage, imageops::FilterType};
use ndarray::Array4;
use std::path::Path;
use tracing::{debug, info};

pub trait Classifier: Send + Sync {
    fn classify(&self, image_path: &Path) -> Result<ClassificationResult>;
}

/// Fixed-input image classifier exported to ONNX.
pub struct OnnxClassifier {
    session: OnnxSession,
    labels: ClassLabels,
    input_size: u32,
    layout: TensorLayout,
}

impl OnnxClassifier {
    /// Loads the model and checks that its output width matches the label
    /// set; a mismatch means the deployment is broken.
    pub fn load(config: &ClassifierConfig, labels: ClassLabels) -> Result<Self> {
        let session = OnnxSession::load(Path::new(&config.path), "Classifier")?;
        let classifier = Self {
            session,
            labels,
            input_size: config.input_size,
            layout: config.layout,
        };

        let size = classifier.input_size as usize;
        let probe = match classifier.layout {
            TensorLayout::Nhwc => Array4::<f32>::zeros((1, size, size, 3)),
            TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, size, size)),
        };
        let scores = classifier.scores(probe)?;
        if scores.len() != classifier.labels.len() {
            return Err(Error::config(format!(
                "Classifier produces {} scores but {} class labels were loaded",
                scores.len(),
                classifier.labels.len()
            )));
        }

        info!(
            "Classifier ready: {} classes, {}x{} input",
            classifier.labels.len(),
            classifier.input_size,
            classifier.input_size
        );
        Ok(classifier)
    }

    fn scores(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let (shape, data) = self.session.run(input)?;
        debug!("Classifier output shape: {:?}", shape);
        Ok(data)
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image_path: &Path) -> Result<ClassificationResult> {
        let image = image::open(image_path)?;
        let input = preprocess(&image, self.input_size, self.layout);
        let scores = self.scores(input)?;
        let result = select_top(&scores, &self.labels)?;

        info!(
            "Prediction: {} (confidence: {:.2})",
            result.label, result.confidence
        );
        Ok(result)
    }
}

/// Resizes to `size`x`size`, scales pixels to [0, 1] and adds a batch axis.
pub fn preprocess(image: &DynamicImage, size: u32, layout: TensorLayout) -> Array4<f32> {
    let rgb = image.resize_exact(size, size, FilterType::Nearest).to_rgb8();
    let side = size as usize;

    let mut tensor = match layout {
        TensorLayout::Nhwc => Array4::zeros((1, side, side, 3)),
        TensorLayout::Nchw => Array4::zeros((1, 3, side, side)),
    };

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    tensor
}

/// Arg-max over the score vector; the first maximum wins on ties.
pub fn select_top(scores: &[f32], labels: &ClassLabels) -> Result<ClassificationResult> {
    if scores.is_empty() {
        return Err(Error::model("classifier returned an empty output"));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(Error::model("classifier output contains non-finite values"));
    }

    let mut best = 0;
    for (index, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = index;
        }
    }

    let label = labels.resolve(best)?;
    Ok(ClassificationResult {
        label: label.to_string(),
        confidence: round2(scores[best]),
    })
}
