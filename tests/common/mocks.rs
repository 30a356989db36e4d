use async_trait::async_trait;
use skinx_server::{
    Error, Result,
    llm::{ChatCompletionRequest, ChatCompletionResponse, LlmClient},
    vision::{
        ClassLabels, ClassificationResult, Classifier, Detection, DetectionOutput, Detector,
        annotate, select_top,
    },
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock LLM client for testing
#[derive(Debug)]
pub struct MockLlmClient {
    pub responses: Arc<Mutex<Vec<ChatCompletionResponse>>>,
    pub requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
    pub error: Option<String>,
    pub delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            error: None,
            delay: None,
        }
    }

    pub fn with_responses(self, responses: Vec<ChatCompletionResponse>) -> Self {
        *self.responses.lock().unwrap() = responses;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn get_requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(ref error) = self.error {
            return Err(Error::llm(error.clone()));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::llm("No more mock responses available"));
        }

        Ok(responses.remove(0))
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A model call as the mock saw it: the path and whether the file existed.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenPath {
    pub path: PathBuf,
    pub existed: bool,
}

/// Mock classifier that turns a fixed score vector into a result
#[derive(Debug)]
pub struct MockClassifier {
    pub scores: Vec<f32>,
    pub labels: ClassLabels,
    pub error: Option<String>,
    pub seen: Arc<Mutex<Vec<SeenPath>>>,
}

impl MockClassifier {
    pub fn new(scores: Vec<f32>, labels: &[&str]) -> Self {
        Self {
            scores,
            labels: ClassLabels::new(labels.iter().map(|l| l.to_string()).collect()),
            error: None,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn seen(&self) -> Vec<SeenPath> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for MockClassifier {
    fn classify(&self, image_path: &Path) -> Result<ClassificationResult> {
        self.seen.lock().unwrap().push(SeenPath {
            path: image_path.to_path_buf(),
            existed: image_path.exists(),
        });

        if let Some(ref error) = self.error {
            return Err(Error::model(error.clone()));
        }

        select_top(&self.scores, &self.labels)
    }
}

/// Mock detector that reports fixed detections and renders them for real
#[derive(Debug)]
pub struct MockDetector {
    pub detections: Vec<Detection>,
    pub error: Option<String>,
    pub panic: bool,
    pub seen: Arc<Mutex<Vec<SeenPath>>>,
}

impl MockDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            error: None,
            panic: false,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn seen(&self) -> Vec<SeenPath> {
        self.seen.lock().unwrap().clone()
    }
}

impl Detector for MockDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionOutput> {
        self.seen.lock().unwrap().push(SeenPath {
            path: image_path.to_path_buf(),
            existed: image_path.exists(),
        });

        if self.panic {
            panic!("detector crashed");
        }
        if let Some(ref error) = self.error {
            return Err(Error::model(error.clone()));
        }

        let image = image::open(image_path)?;
        Ok(DetectionOutput {
            detections: self.detections.clone(),
            annotated_image: annotate::render_base64(&image, &self.detections)?,
        })
    }
}
