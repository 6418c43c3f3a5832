//! Recognition engine interface
//!
//! The OCR engine is an external collaborator. Backends implement
//! [`RecognitionEngine`] and return their raw text/word/line structures as an
//! [`EngineOutput`]; all scoring and filtering happens in the pipeline.

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Characters allowed during the recognition strategies
pub const STRATEGY_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz'-.";

/// Characters allowed during rotation probes
pub const LETTERS_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Clamp a confidence or score into 0-100 (NaN becomes 0)
pub fn clamp_score(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Bounding box in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Whether the center of `other` lies inside this box
    pub fn contains_center_of(&self, other: &BBox) -> bool {
        let cx = (other.x0 + other.x1) / 2;
        let cy = (other.y0 + other.y1) / 2;
        cx >= self.x0 && cx <= self.x1 && cy >= self.y0 && cy <= self.y1
    }
}

/// A recognized word
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrWord {
    pub text: String,
    /// Engine confidence (0 - 100)
    pub confidence: f32,
    pub bbox: Option<BBox>,
}

/// A recognized text line
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrLine {
    pub text: String,
    pub bbox: Option<BBox>,
    pub words: Vec<OcrWord>,
}

/// A recognized paragraph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrParagraph {
    pub lines: Vec<OcrLine>,
}

/// Raw output of one engine call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOutput {
    pub text: String,
    /// Mean engine confidence (0 - 100)
    pub confidence: f32,
    pub words: Vec<OcrWord>,
    pub lines: Vec<OcrLine>,
    pub paragraphs: Vec<OcrParagraph>,
}

impl EngineOutput {
    /// Clamp every confidence into 0-100
    pub fn normalized(mut self) -> Self {
        fn clamp_words(words: &mut [OcrWord]) {
            for word in words {
                word.confidence = clamp_score(word.confidence);
            }
        }
        fn clamp_lines(lines: &mut [OcrLine]) {
            for line in lines {
                clamp_words(&mut line.words);
            }
        }

        self.confidence = clamp_score(self.confidence);
        clamp_words(&mut self.words);
        clamp_lines(&mut self.lines);
        for paragraph in &mut self.paragraphs {
            clamp_lines(&mut paragraph.lines);
        }
        self
    }
}

/// Assumed text layout for an engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Treat the image as a single word
    SingleWord,
    /// Treat the image as a single text line
    SingleLine,
    /// A single uniform block of text
    DenseBlock,
    /// Fully automatic page segmentation
    SparseAuto,
    /// Find as much text as possible in no particular order
    MixedSparse,
}

impl SegmentationMode {
    /// Tesseract page segmentation mode number
    pub fn psm(self) -> u32 {
        match self {
            SegmentationMode::SingleWord => 8,
            SegmentationMode::SingleLine => 7,
            SegmentationMode::DenseBlock => 6,
            SegmentationMode::SparseAuto => 3,
            SegmentationMode::MixedSparse => 11,
        }
    }
}

/// Recognizer model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Neural (LSTM) recognizer only
    #[default]
    LstmOnly,
    /// Whatever the engine considers its default
    EngineDefault,
}

/// Options for one engine call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    pub segmentation: SegmentationMode,
    pub engine_mode: EngineMode,
    /// Restrict recognition to these characters
    pub char_whitelist: Option<String>,
    pub preserve_interword_spaces: Option<bool>,
    /// Use the engine's built-in document dictionary
    pub enable_doc_dict: Option<bool>,
}

impl RecognitionOptions {
    pub fn new(segmentation: SegmentationMode) -> Self {
        Self {
            segmentation,
            engine_mode: EngineMode::LstmOnly,
            char_whitelist: None,
            preserve_interword_spaces: None,
            enable_doc_dict: None,
        }
    }

    pub fn with_whitelist(mut self, whitelist: &str) -> Self {
        self.char_whitelist = Some(whitelist.to_string());
        self
    }
}

/// Intra-call progress reporter (0.0 - 1.0)
pub type EngineProgress<'a> = dyn Fn(f32) + Send + Sync + 'a;

/// External OCR capability
///
/// Implementations may cache internally but must not assume concurrent calls;
/// the pipeline issues one call at a time and awaits it.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Recognize text in an RGBA image
    async fn recognize(
        &self,
        image: &RgbaImage,
        language: &str,
        options: &RecognitionOptions,
        progress: Option<&EngineProgress<'_>>,
    ) -> Result<EngineOutput, EngineError>;
}
