//! Orientation detection
//!
//! Probes the four right-angle rotations of a downscaled copy with a quick
//! single-word recognition and keeps the one that reads best.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::analysis::words::is_valid_word_pattern;
use crate::config::RotationWeights;
use crate::error::PipelineError;
use crate::pipeline::progress::{ProgressStatus, RunContext};
use crate::vision::ocr::{
    EngineOutput, RecognitionEngine, RecognitionOptions, SegmentationMode, LETTERS_WHITELIST,
};

/// Candidate clockwise rotations, in probe order
pub const ANGLES: [u16; 4] = [0, 90, 180, 270];

/// Progress added per probed angle
const PROGRESS_PER_ANGLE: f32 = 4.0;

/// Rotate clockwise by a right angle
///
/// 90 and 270 swap width and height. Any other angle returns the image as is.
pub fn rotate(image: RgbaImage, angle: u16) -> RgbaImage {
    match angle {
        0 => image,
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        other => {
            warn!("Ignoring unsupported rotation of {} degrees", other);
            image
        }
    }
}

/// How well a probe read: confidence, valid words and amount of text
pub fn rotation_score(weights: &RotationWeights, output: &EngineOutput) -> f32 {
    let valid_words = output
        .words
        .iter()
        .filter(|word| {
            word.confidence > weights.min_word_confidence && is_valid_word_pattern(&word.text)
        })
        .count();

    let text_length = output
        .text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .count()
        .min(weights.text_length_cap);

    output.confidence * weights.confidence
        + valid_words as f32 * weights.valid_word
        + text_length as f32 * weights.text_length
}

/// Angle with the highest score; the earliest wins ties, 0 when empty
pub fn select_best_angle(scores: &[(u16, f32)]) -> u16 {
    scores
        .iter()
        .fold(None::<(u16, f32)>, |best, &(angle, score)| match best {
            Some((_, best_score)) if score <= best_score => best,
            _ => Some((angle, score)),
        })
        .map(|(angle, _)| angle)
        .unwrap_or(0)
}

/// Detects and undoes 90/180/270 degree rotation
#[derive(Debug, Clone, Default)]
pub struct RotationNormalizer {
    weights: RotationWeights,
}

impl RotationNormalizer {
    pub fn new(weights: RotationWeights) -> Self {
        Self { weights }
    }

    fn probe_image(&self, image: &RgbaImage) -> RgbaImage {
        let (width, height) = image.dimensions();
        let longer = width.max(height);
        let target = self.weights.probe_dimension.min(longer);
        if longer == 0 || target == longer {
            return image.clone();
        }

        let scale = target as f32 / longer as f32;
        let probe_width = ((width as f32 * scale).round() as u32).max(1);
        let probe_height = ((height as f32 * scale).round() as u32).max(1);
        imageops::resize(image, probe_width, probe_height, FilterType::Triangle)
    }

    /// Clockwise angle that makes the text upright
    ///
    /// A failed probe scores 0. If every probe fails the image is assumed
    /// upright.
    pub async fn detect_angle(
        &self,
        engine: &dyn RecognitionEngine,
        image: &RgbaImage,
        language: &str,
        ctx: &RunContext,
    ) -> Result<u16, PipelineError> {
        let probe = self.probe_image(image);
        let options =
            RecognitionOptions::new(SegmentationMode::SingleWord).with_whitelist(LETTERS_WHITELIST);

        ctx.progress.report(ProgressStatus::RotationDetection, 0.0);

        let mut scores = Vec::with_capacity(ANGLES.len());
        for (i, &angle) in ANGLES.iter().enumerate() {
            ctx.checkpoint()?;

            let rotated = rotate(probe.clone(), angle);
            let score = match engine.recognize(&rotated, language, &options, None).await {
                Ok(output) => rotation_score(&self.weights, &output.normalized()),
                Err(err) => {
                    debug!("Rotation probe at {} degrees failed: {}", angle, err);
                    0.0
                }
            };
            debug!("Rotation {} degrees scored {:.1}", angle, score);
            scores.push((angle, score));

            ctx.progress.report(
                ProgressStatus::RotationDetection,
                PROGRESS_PER_ANGLE * (i + 1) as f32,
            );
        }

        Ok(select_best_angle(&scores))
    }

    /// Rotate the full-resolution image upright
    ///
    /// Returns the corrected image and the applied clockwise angle.
    pub async fn normalize(
        &self,
        engine: &dyn RecognitionEngine,
        image: RgbaImage,
        language: &str,
        ctx: &RunContext,
    ) -> Result<(RgbaImage, u16), PipelineError> {
        let angle = self.detect_angle(engine, &image, language, ctx).await?;
        if angle != 0 {
            info!("Correcting image rotation by {} degrees", angle);
        }
        Ok((rotate(image, angle), angle))
    }
}
