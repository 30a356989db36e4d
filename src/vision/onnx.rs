//! ONNX Runtime session plumbing shared by the classifier and the detector.

use crate::{Error, Result};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

pub(crate) struct OnnxSession {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxSession {
    pub(crate) fn load(path: &Path, what: &str) -> Result<Self> {
        if !path.exists() {
            return Err(Error::config(format!(
                "{} model not found: {}",
                what,
                path.display()
            )));
        }

        info!("Loading {} model from {}", what, path.display());

        let session = Session::builder()
            .map_err(|e| Error::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::model(format!("Failed to set optimization level: {e}")))?
            .commit_from_file(path)
            .map_err(|e| {
                Error::model(format!(
                    "Failed to load {} model from {}: {e}",
                    what,
                    path.display()
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| Error::model(format!("{} model declares no inputs", what)))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| Error::model(format!("{} model declares no outputs", what)))?;

        debug!(
            "{} model loaded - input: {}, output: {}",
            what, input_name, output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Custom metadata property stored in the model file, if present.
    pub(crate) fn metadata(&self, key: &str) -> Result<Option<String>> {
        let session = self
            .session
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        let metadata = session
            .metadata()
            .map_err(|e| Error::model(format!("Failed to read model metadata: {e}")))?;
        metadata
            .custom(key)
            .map_err(|e| Error::model(format!("Failed to read metadata '{}': {e}", key)))
    }

    /// Runs the model on one input tensor and returns the first output as
    /// `(shape, flat row-major data)`.
    pub(crate) fn run(&self, input: Array4<f32>) -> Result<(Vec<usize>, Vec<f32>)> {
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| Error::model(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| Error::model(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            Error::model(format!("Output '{}' not found", self.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::model(format!("Failed to extract output: {e}")))?;

        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((shape, data.to_vec()))
    }
}
