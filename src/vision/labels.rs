use crate::{Error, Result};
use std::path::Path;
use tracing::info;

/// Class names in model index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Reads one class per sub-directory of `dir`, sorted by name, matching
    /// the order used when the classifier was trained from that directory.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::config(format!(
                "Class label directory not found: {}",
                dir.display()
            )));
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        if names.is_empty() {
            return Err(Error::config(format!(
                "No class directories found in {}",
                dir.display()
            )));
        }

        info!("Loaded {} class labels: {:?}", names.len(), names);
        Ok(Self { names })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Like [`get`](Self::get) but an unknown index is a deployment error.
    pub fn resolve(&self, index: usize) -> Result<&str> {
        self.get(index).ok_or(Error::LabelMismatch {
            index,
            len: self.names.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
