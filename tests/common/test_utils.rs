use super::mocks::{MockClassifier, MockDetector, MockLlmClient};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use skinx_server::{
    advice::{AdviceGenerator, expected_keys},
    llm::{ChatCompletionResponse, ChatMessage, Choice, Usage},
    pipeline::ServiceContext,
    storage::TempFileStore,
    vision::Detection,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const LABELS: [&str; 3] = ["acne", "eczema", "psoriasis"];

/// Encode a small solid-colour image
pub fn image_bytes(format: ImageFormat, color: [u8; 3]) -> Vec<u8> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb(color)))
        .write_to(&mut Cursor::new(&mut buffer), format)
        .unwrap();
    buffer
}

pub fn png_bytes() -> Vec<u8> {
    image_bytes(ImageFormat::Png, [200, 150, 120])
}

/// Create a chat completion carrying a single assistant message
pub fn text_response(content: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "chatcmpl-test".to_string(),
        model: "gemini-1.5-pro".to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(content),
            finish_reason: Some("Stop".to_string()),
        }],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 20,
            total_tokens: 30,
        }),
    }
}

/// Advice JSON covering every expected key
pub fn full_advice_json() -> Value {
    let sections: Vec<_> = expected_keys()
        .map(|key| json!({"key": key, "title": key.to_uppercase(), "content": format!("About {}", key)}))
        .collect();
    json!({ "sections": sections })
}

pub fn sample_detection() -> Detection {
    Detection {
        id: 0,
        x: 32.0,
        y: 24.0,
        width: 20.0,
        height: 16.0,
        label: "papule".to_string(),
        confidence: 0.91,
    }
}

pub struct TestContext {
    pub context: ServiceContext,
    pub classifier: Arc<MockClassifier>,
    pub detector: Arc<MockDetector>,
    pub llm: Arc<MockLlmClient>,
}

pub fn build_context(
    temp_dir: &Path,
    classifier: MockClassifier,
    detector: MockDetector,
    llm: MockLlmClient,
) -> TestContext {
    let classifier = Arc::new(classifier);
    let detector = Arc::new(detector);
    let llm = Arc::new(llm);

    let context = ServiceContext::new(
        classifier.clone(),
        detector.clone(),
        AdviceGenerator::new(llm.clone(), Duration::from_secs(5)),
        TempFileStore::new(temp_dir),
    );

    TestContext {
        context,
        classifier,
        detector,
        llm,
    }
}

/// Context whose mocks all succeed: eczema at 0.7, one detection, full advice
pub fn happy_context(temp_dir: &Path) -> TestContext {
    build_context(
        temp_dir,
        MockClassifier::new(vec![0.1, 0.7, 0.2], &LABELS),
        MockDetector::new(vec![sample_detection()]),
        MockLlmClient::new().with_responses(vec![text_response(
            &full_advice_json().to_string(),
        )]),
    )
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
