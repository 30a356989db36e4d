use crate::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::ImageFormat;

/// Raw bytes of an uploaded image that are known to decode.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl UploadedImage {
    /// Sniffs the format from the magic bytes and decodes the image once to
    /// make sure no model ever sees an undecodable file.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::invalid_input("Image data is empty"));
        }

        let format = image::guess_format(&bytes)
            .map_err(|_| Error::invalid_input("Unsupported image format"))?;
        image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| Error::invalid_input(format!("Invalid image: {}", e)))?;

        Ok(Self { bytes, format })
    }

    /// Accepts plain base64 or a data URL (`data:image/png;base64,...`).
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let payload = match encoded.find("base64,") {
            Some(index) => &encoded[index + "base64,".len()..],
            None => encoded,
        };
        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if payload.is_empty() {
            return Err(Error::invalid_input("Image data is empty"));
        }

        let bytes = STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| Error::invalid_input(format!("Invalid base64 image: {}", e)))?;
        Self::from_bytes(bytes)
    }

    /// [`UploadedImage::from_bytes`] on the blocking pool, so a large upload
    /// is never decoded on an async worker.
    pub async fn decode(bytes: Vec<u8>) -> Result<Self> {
        Self::off_thread(move || Self::from_bytes(bytes)).await
    }

    /// [`UploadedImage::from_base64`] on the blocking pool.
    pub async fn decode_base64(encoded: String) -> Result<Self> {
        Self::off_thread(move || Self::from_base64(&encoded)).await
    }

    async fn off_thread<F>(validate: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Self> + Send + 'static,
    {
        tokio::task::spawn_blocking(validate)
            .await
            .map_err(|e| Error::internal(format!("Upload validation task aborted: {}", e)))?
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}
