pub mod advice;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod vision;

pub use error::{Error, Result};
