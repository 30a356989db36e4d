use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Upper bound on a single generation call, after which the fallback is used.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_true")]
    pub cors_allow_any_origin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_path")]
    pub path: String,
    /// One sub-directory per class; sorted names give the class index order.
    #[serde(default = "default_labels_dir")]
    pub labels_dir: String,
    #[serde(default = "default_classifier_input_size")]
    pub input_size: u32,
    #[serde(default)]
    pub layout: TensorLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_path")]
    pub path: String,
    #[serde(default = "default_detector_input_size")]
    pub input_size: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// Overrides the class names embedded in the model metadata.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// Batch, height, width, channels (Keras exports).
    #[default]
    Nhwc,
    /// Batch, channels, height, width (PyTorch exports).
    Nchw,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogsConfig::default(),
            max_upload_bytes: default_max_upload_bytes(),
            cors_allow_any_origin: true,
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            path: default_classifier_path(),
            labels_dir: default_labels_dir(),
            input_size: default_classifier_input_size(),
            layout: TensorLayout::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            path: default_detector_path(),
            input_size: default_detector_input_size(),
            confidence_threshold: default_confidence_threshold(),
            iou_threshold: default_iou_threshold(),
            labels: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_classifier_path() -> String {
    "models/classifier.onnx".to_string()
}

fn default_labels_dir() -> String {
    "dataset/train".to_string()
}

fn default_classifier_input_size() -> u32 {
    224
}

fn default_detector_path() -> String {
    "models/detector.onnx".to_string()
}

fn default_detector_input_size() -> u32 {
    640
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    0.7
}

fn default_temp_dir() -> String {
    "temp_uploads".to_string()
}
