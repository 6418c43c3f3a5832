//! Vision/OCR Layer
//!
//! Prepares images and drives the recognition engine.
//! Supports multiple engine backends:
//! - Tesseract via `leptess` (`tesseract` feature)
//! - Scripted replay of captured engine output

pub mod ocr;
pub mod ocr_preprocess;
pub mod orchestrator;
pub mod rotation;
pub mod scripted;
#[cfg(feature = "tesseract")]
pub mod tesseract;

pub use ocr::{EngineOutput, RecognitionEngine, RecognitionOptions, SegmentationMode};
pub use ocr_preprocess::ImagePreprocessor;
pub use orchestrator::{RecognitionOrchestrator, RecognitionResult, RecognitionStrategy};
pub use rotation::RotationNormalizer;
pub use scripted::{EngineScript, ScriptedEngine, ScriptedResponse};
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;
