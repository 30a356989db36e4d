mod upload;

pub use upload::UploadedImage;

use crate::{
    Error, Result,
    advice::{AdviceGenerator, AdviceResponse, parse_advice},
    storage::TempFileStore,
    vision::{Classifier, Detection, DetectionOutput, Detector},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Combined result for one uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub condition: String,
    pub confidence: f32,
    pub detections: Vec<Detection>,
    pub advice: AdviceResponse,
    pub annotated_image: String,
}

/// Everything a request needs, built once at startup and shared read-only.
#[derive(Clone)]
pub struct ServiceContext {
    classifier: Arc<dyn Classifier>,
    detector: Arc<dyn Detector>,
    advisor: AdviceGenerator,
    temp_store: TempFileStore,
}

impl ServiceContext {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        detector: Arc<dyn Detector>,
        advisor: AdviceGenerator,
        temp_store: TempFileStore,
    ) -> Self {
        Self {
            classifier,
            detector,
            advisor,
            temp_store,
        }
    }

    pub fn temp_store(&self) -> &TempFileStore {
        &self.temp_store
    }

    /// Runs detection and classification on the upload, asks for advice on the
    /// predicted condition and repairs it into the fixed schema.
    ///
    /// Detection and advice degrade to empty results; a classification failure
    /// fails the request. The temporary copy is removed on every path.
    pub async fn predict(&self, upload: UploadedImage) -> Result<InferenceResponse> {
        let temp = self
            .temp_store
            .acquire(upload.bytes(), upload.extension())
            .await?;
        info!("Processing upload as {}", temp.path().display());

        let detect_path = temp.path().to_path_buf();
        let classify_path = temp.path().to_path_buf();
        let detector = Arc::clone(&self.detector);
        let classifier = Arc::clone(&self.classifier);

        let (detection, classification) = tokio::join!(
            tokio::task::spawn_blocking(move || detector.detect(&detect_path)),
            tokio::task::spawn_blocking(move || classifier.classify(&classify_path)),
        );

        let detection = match detection {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Detection failed, continuing without detections: {}", e);
                DetectionOutput::default()
            }
            Err(e) => {
                warn!("Detection task aborted, continuing without detections: {}", e);
                DetectionOutput::default()
            }
        };

        let classification = classification
            .map_err(|e| Error::internal(format!("Classification task aborted: {}", e)))??;

        let advice = match self.advisor.generate_advice(&classification.label).await {
            Some(raw) => parse_advice(&raw),
            None => AdviceResponse::unavailable(),
        };

        temp.release();

        info!(
            "Prediction complete: {} ({:.2}), {} detections",
            classification.label,
            classification.confidence,
            detection.detections.len()
        );

        Ok(InferenceResponse {
            condition: classification.label,
            confidence: classification.confidence,
            detections: detection.detections,
            advice,
            annotated_image: detection.annotated_image,
        })
    }

    /// Free-text skincare chat; always yields a reply.
    pub async fn chat(&self, message: &str) -> String {
        self.advisor.chat(message).await
    }
}
