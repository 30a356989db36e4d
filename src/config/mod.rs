mod types;

pub use types::*;

use crate::{Error, Result};
use std::env;
use tracing::debug;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub async fn load() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

    debug!("Loading configuration from: {}", config_path);

    let mut config = match tokio::fs::read_to_string(&config_path).await {
        Ok(config_str) => parse(&config_str)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No configuration file at {}, using defaults", config_path);
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    validate(&config)?;

    Ok(config)
}

pub fn parse(config_str: &str) -> Result<Config> {
    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(config_str)?)
}

/// Applies `GEMINI_API_KEY`, `HOST` and `PORT` on top of the file values.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        config.llm.api_key = key;
    }
    if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
        config.server.host = host;
    }
    if let Some(port) = lookup("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("Invalid PORT value: '{}'", port)))?;
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<()> {
    if config.llm.api_key.trim().is_empty() {
        return Err(Error::config(format!(
            "No API key for the text generation service; set {} or llm.api_key",
            API_KEY_ENV
        )));
    }
    if config.server.port == 0 {
        return Err(Error::config("server.port must be non-zero"));
    }
    if config.llm.timeout_secs == 0 {
        return Err(Error::config("llm.timeout_secs must be positive"));
    }
    if config.models.classifier.input_size == 0 || config.models.detector.input_size == 0 {
        return Err(Error::config("model input sizes must be positive"));
    }
    let detector = &config.models.detector;
    for (name, value) in [
        ("confidence_threshold", detector.confidence_threshold),
        ("iou_threshold", detector.iou_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::config(format!(
                "models.detector.{} must be within [0, 1], got {}",
                name, value
            )));
        }
    }
    Ok(())
}
