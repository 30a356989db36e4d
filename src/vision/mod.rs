pub mod annotate;
mod classifier;
mod detector;
mod labels;
mod onnx;
mod types;

pub use classifier::{Classifier, OnnxClassifier, preprocess as preprocess_for_classifier, select_top};
pub use detector::{
    Detector, Letterbox, OnnxDetector, RawBox, decode_predictions, non_max_suppression,
    parse_names_metadata, preprocess as preprocess_for_detector, to_detections,
};
pub use labels::ClassLabels;
pub use types::*;
