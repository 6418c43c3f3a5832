//! VocabLens - vocabulary word extraction from photographed text
//!
//! Reads a photo of a word list or textbook page, runs it through several OCR
//! strategies and returns the English vocabulary words it found, one per line
//! of text, in reading order.

pub mod analysis;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod vision;

pub use config::AppConfig;
pub use error::{ConfigError, EngineError, PipelineError};
pub use pipeline::{
    extract_from_image, extract_text, ExtractOptions, ExtractionReport, PipelineCoordinator,
};
