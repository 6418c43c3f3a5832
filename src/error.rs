//! Error types
//!
//! Engine failures are recovered per attempt; pipeline errors end a run and are
//! reported to the caller as a failed extraction.

use thiserror::Error;

/// A single recognition call failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Recognition engine unavailable: {0}")]
    Unavailable(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("Failed to encode image for recognition: {0}")]
    Encode(String),
}

/// Errors that end a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("All {attempts} recognition strategies failed: {last_error}")]
    Exhausted { attempts: usize, last_error: String },

    #[error("No acceptable words found in image")]
    NoWords,

    #[error("Extraction cancelled")]
    Cancelled,
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}
