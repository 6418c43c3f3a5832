//! Extraction pipeline
//!
//! Sequences the stages of one extraction run:
//! decode, rotation, preprocessing, multi-strategy recognition, word
//! extraction. Any failure is reported as an unsuccessful [`ExtractionReport`]
//! rather than an error.

pub mod progress;

use image::RgbaImage;
use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::extraction::{extract_words, WordCandidate};
use crate::analysis::words::QualityFilter;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::vision::ocr::{clamp_score, RecognitionEngine};
use crate::vision::ocr_preprocess::ImagePreprocessor;
use crate::vision::orchestrator::{RecognitionOrchestrator, RecognitionResult, RecognitionStrategy};
use crate::vision::rotation::RotationNormalizer;

pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter, ProgressStatus, RunContext};

/// Per-call options
#[derive(Clone, Default)]
pub struct ExtractOptions {
    /// Collect every attempt and the step log in the report
    pub debug: bool,
    pub on_progress: Option<ProgressCallback>,
    pub cancel: CancellationToken,
}

/// Diagnostics attached to a report in debug mode
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugInfo {
    pub all_results: Vec<RecognitionResult>,
    pub selected_strategy: Option<String>,
    pub raw_text: String,
    /// Clockwise rotation applied before recognition
    pub rotation: u16,
    pub processing_steps: Vec<String>,
}

/// Outcome of one extraction
///
/// Exactly one of `success` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub success: bool,
    /// Raw text of the selected recognition attempt
    pub text: String,
    pub words: Vec<WordCandidate>,
    /// Confidence of the selected attempt (0 - 100)
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}

impl ExtractionReport {
    fn failure(error: &PipelineError, debug_info: Option<DebugInfo>) -> Self {
        Self {
            success: false,
            text: String::new(),
            words: Vec::new(),
            confidence: 0.0,
            error: Some(error.to_string()),
            debug_info,
        }
    }
}

/// Successful run, before it is turned into a report
struct Extraction {
    best: RecognitionResult,
    words: Vec<WordCandidate>,
    rotation: u16,
}

/// Decode image bytes into RGBA, rejecting empty images
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    check_dimensions(&image)?;
    Ok(image)
}

fn check_dimensions(image: &RgbaImage) -> Result<(), PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::Decode(format!(
            "Image dimensions must be non-zero (got {}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

/// Runs extraction with one configuration
#[derive(Debug, Clone)]
pub struct PipelineCoordinator {
    config: AppConfig,
    rotation: RotationNormalizer,
    preprocessor: ImagePreprocessor,
    orchestrator: RecognitionOrchestrator,
    filter: QualityFilter,
}

impl Default for PipelineCoordinator {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl PipelineCoordinator {
    pub fn new(config: AppConfig) -> Self {
        let orchestrator = RecognitionOrchestrator::new(&config.scoring);
        Self::build(config, orchestrator)
    }

    /// Use a custom strategy list instead of the default five
    pub fn with_strategies(config: AppConfig, strategies: Vec<RecognitionStrategy>) -> Self {
        let orchestrator = RecognitionOrchestrator::with_strategies(&config.scoring, strategies);
        Self::build(config, orchestrator)
    }

    fn build(config: AppConfig, orchestrator: RecognitionOrchestrator) -> Self {
        Self {
            rotation: RotationNormalizer::new(config.scoring.rotation.clone()),
            preprocessor: ImagePreprocessor::new(config.preprocess, config.filters.clone()),
            filter: QualityFilter::new(config.quality.clone()),
            orchestrator,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Extract vocabulary words from encoded image bytes
    pub async fn extract_text(
        &self,
        engine: &dyn RecognitionEngine,
        bytes: &[u8],
        options: &ExtractOptions,
    ) -> ExtractionReport {
        match decode_image(bytes) {
            Ok(image) => self.extract_from_image(engine, image, options).await,
            Err(err) => {
                warn!("Could not decode {} bytes: {}", bytes.len(), err);
                ExtractionReport::failure(&err, None)
            }
        }
    }

    /// Extract vocabulary words from an already decoded image
    pub async fn extract_from_image(
        &self,
        engine: &dyn RecognitionEngine,
        image: RgbaImage,
        options: &ExtractOptions,
    ) -> ExtractionReport {
        let ctx = RunContext {
            progress: ProgressReporter::new(options.on_progress.clone()),
            cancel: options.cancel.clone(),
            debug: options.debug || self.config.pipeline.debug,
        };

        let run_id = Uuid::new_v4();
        let span = info_span!("extract", run_id = %run_id);
        let mut attempts = Vec::new();
        let outcome = self
            .run(engine, image, &ctx, &mut attempts)
            .instrument(span)
            .await;

        match outcome {
            Ok(extraction) => {
                let debug_info = ctx.debug.then(|| DebugInfo {
                    all_results: attempts,
                    selected_strategy: Some(extraction.best.strategy.clone()),
                    raw_text: extraction.best.text.clone(),
                    rotation: extraction.rotation,
                    processing_steps: extraction.best.processing_steps.clone(),
                });
                ExtractionReport {
                    success: true,
                    text: extraction.best.text,
                    words: extraction.words,
                    confidence: clamp_score(extraction.best.confidence),
                    error: None,
                    debug_info,
                }
            }
            Err(err) => {
                warn!("Extraction {} failed: {}", run_id, err);
                let debug_info = ctx.debug.then(|| DebugInfo {
                    all_results: attempts,
                    ..Default::default()
                });
                ExtractionReport::failure(&err, debug_info)
            }
        }
    }

    async fn run(
        &self,
        engine: &dyn RecognitionEngine,
        image: RgbaImage,
        ctx: &RunContext,
        attempts: &mut Vec<RecognitionResult>,
    ) -> Result<Extraction, PipelineError> {
        let start = Instant::now();
        check_dimensions(&image)?;
        let language = self.config.engine.language.as_str();
        info!(
            "Extracting words from {}x{} image with {}",
            image.width(),
            image.height(),
            engine.name()
        );

        ctx.checkpoint()?;
        let (image, rotation) = if self.config.preprocess.auto_rotate {
            self.rotation.normalize(engine, image, language, ctx).await?
        } else {
            (image, 0)
        };

        ctx.checkpoint()?;
        ctx.progress.report(ProgressStatus::Preprocessing, 18.0);
        let image = self.preprocessor.preprocess(image);

        *attempts = self.orchestrator.run(engine, &image, language, ctx).await?;

        if attempts.iter().all(|result| result.is_error()) {
            let last_error = attempts
                .last()
                .and_then(|result| result.error.clone())
                .unwrap_or_else(|| "no strategies configured".to_string());
            return Err(PipelineError::Exhausted {
                attempts: attempts.len(),
                last_error,
            });
        }

        let best = self
            .orchestrator
            .select_best(attempts)
            .ok_or(PipelineError::Exhausted {
                attempts: 0,
                last_error: "no strategies configured".to_string(),
            })?;

        ctx.checkpoint()?;
        ctx.progress.report(ProgressStatus::PostProcessing, 90.0);
        let words = extract_words(&best, &self.filter);

        if words.is_empty() && self.config.pipeline.require_words {
            return Err(PipelineError::NoWords);
        }

        ctx.progress.report(ProgressStatus::Done, 100.0);
        info!(
            "Extracted {} words with {} in {:?} ({} attempts)",
            words.len(),
            best.strategy,
            start.elapsed(),
            attempts.len()
        );

        Ok(Extraction {
            best,
            words,
            rotation,
        })
    }
}

/// Extract words with the default configuration
pub async fn extract_text(
    engine: &dyn RecognitionEngine,
    bytes: &[u8],
    options: &ExtractOptions,
) -> ExtractionReport {
    PipelineCoordinator::default()
        .extract_text(engine, bytes, options)
        .await
}

/// Extract words from a decoded image with the default configuration
pub async fn extract_from_image(
    engine: &dyn RecognitionEngine,
    image: RgbaImage,
    options: &ExtractOptions,
) -> ExtractionReport {
    PipelineCoordinator::default()
        .extract_from_image(engine, image, options)
        .await
}
