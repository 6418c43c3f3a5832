//! Multi-strategy recognition
//!
//! Runs the preprocessed image through several segmentation strategies,
//! scores each attempt and picks the most usable one. Every strategy is in
//! effect a differently configured retry, so no other retrying happens.

use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::words::is_valid_word_pattern;
use crate::config::{EarlyExitRules, QualityWeights, ScoringConfig, SelectionWeights};
use crate::error::PipelineError;
use crate::pipeline::progress::{ProgressStatus, RunContext};
use crate::vision::ocr::{
    clamp_score, EngineOutput, EngineProgress, OcrLine, OcrParagraph, OcrWord, RecognitionEngine,
    RecognitionOptions, SegmentationMode, STRATEGY_WHITELIST,
};

/// Progress range covered by the strategy loop
pub const PROGRESS_START: f32 = 20.0;
pub const PROGRESS_SPAN: f32 = 70.0;

/// A named engine configuration
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionStrategy {
    pub name: String,
    pub description: String,
    pub options: RecognitionOptions,
}

impl RecognitionStrategy {
    /// Strategy layered over the baseline: LSTM only, word characters whitelist
    pub fn new(name: &str, description: &str, segmentation: SegmentationMode) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            options: RecognitionOptions::new(segmentation).with_whitelist(STRATEGY_WHITELIST),
        }
    }

    fn interword_spaces(mut self, preserve: bool) -> Self {
        self.options.preserve_interword_spaces = Some(preserve);
        self
    }

    fn doc_dict(mut self, enable: bool) -> Self {
        self.options.enable_doc_dict = Some(enable);
        self
    }
}

/// Strategies in the order they are tried (most successful first)
pub fn default_strategies() -> Vec<RecognitionStrategy> {
    vec![
        RecognitionStrategy::new(
            "single_word_high_quality",
            "High quality single word",
            SegmentationMode::SingleWord,
        )
        .interword_spaces(false)
        .doc_dict(true),
        RecognitionStrategy::new(
            "text_line_optimized",
            "Single text line",
            SegmentationMode::SingleLine,
        )
        .interword_spaces(true)
        .doc_dict(true),
        RecognitionStrategy::new(
            "text_block_dense",
            "Dense text block",
            SegmentationMode::DenseBlock,
        )
        .interword_spaces(true)
        .doc_dict(true),
        RecognitionStrategy::new(
            "sparse_text_auto",
            "Automatic page segmentation",
            SegmentationMode::SparseAuto,
        )
        .interword_spaces(true)
        .doc_dict(false),
        RecognitionStrategy::new(
            "mixed_content",
            "Sparse mixed content",
            SegmentationMode::MixedSparse,
        )
        .interword_spaces(true),
    ]
}

/// Outcome of one strategy attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    pub strategy: String,
    pub description: String,
    pub text: String,
    /// Engine confidence (0 - 100)
    pub confidence: f32,
    /// Pipeline quality score (0 - 100)
    pub quality_score: f32,
    pub words: Vec<OcrWord>,
    pub lines: Vec<OcrLine>,
    pub paragraphs: Vec<OcrParagraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub processing_steps: Vec<String>,
}

impl RecognitionResult {
    /// Result with no recognized content
    pub fn empty(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            description: String::new(),
            text: String::new(),
            confidence: 0.0,
            quality_score: 0.0,
            words: Vec::new(),
            lines: Vec::new(),
            paragraphs: Vec::new(),
            error: None,
            processing_steps: Vec::new(),
        }
    }

    fn from_output(strategy: &RecognitionStrategy, output: EngineOutput, quality_score: f32) -> Self {
        Self {
            strategy: strategy.name.clone(),
            description: strategy.description.clone(),
            text: output.text,
            confidence: clamp_score(output.confidence),
            quality_score: clamp_score(quality_score),
            words: output.words,
            lines: output.lines,
            paragraphs: output.paragraphs,
            error: None,
            processing_steps: Vec::new(),
        }
    }

    fn failed(strategy: &RecognitionStrategy, error: String) -> Self {
        Self {
            description: strategy.description.clone(),
            error: Some(error),
            ..Self::empty(&strategy.name)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs strategies against the engine and selects the best attempt
#[derive(Debug, Clone)]
pub struct RecognitionOrchestrator {
    strategies: Vec<RecognitionStrategy>,
    quality: QualityWeights,
    early_exit: EarlyExitRules,
    selection: SelectionWeights,
}

impl RecognitionOrchestrator {
    pub fn new(scoring: &ScoringConfig) -> Self {
        Self::with_strategies(scoring, default_strategies())
    }

    pub fn with_strategies(scoring: &ScoringConfig, strategies: Vec<RecognitionStrategy>) -> Self {
        Self {
            strategies,
            quality: scoring.quality.clone(),
            early_exit: scoring.early_exit.clone(),
            selection: scoring.selection.clone(),
        }
    }

    pub fn strategies(&self) -> &[RecognitionStrategy] {
        &self.strategies
    }

    /// Composite usability score of one engine output (0 - 100)
    pub fn quality_score(&self, output: &EngineOutput) -> f32 {
        let w = &self.quality;
        let word_count = output.words.len();
        let text_length = output.text.trim().chars().count() as f32;

        let mut score = output.confidence * w.confidence
            + (word_count as f32 * w.word_count).min(w.word_count_cap)
            + (text_length * w.text_length).min(w.text_length_cap);

        if word_count > 0 {
            let valid = output
                .words
                .iter()
                .filter(|word| is_valid_word_pattern(&word.text))
                .count();
            score += valid as f32 / word_count as f32 * w.valid_ratio;

            let confidence_sum: f32 = output.words.iter().map(|word| word.confidence).sum();
            score += confidence_sum / word_count as f32 * w.avg_word_confidence;
        }

        clamp_score(score)
    }

    fn should_stop(&self, attempts: usize, quality: f32, confidence: f32) -> Option<&'static str> {
        let rules = &self.early_exit;
        if quality > rules.excellent_quality && confidence > rules.excellent_confidence {
            return Some("Early exit: High quality result achieved");
        }
        if attempts >= rules.good_min_attempts
            && quality > rules.good_quality
            && confidence > rules.good_confidence
        {
            return Some("Early exit: Good result after multiple attempts");
        }
        None
    }

    /// Try strategies in order until one is good enough
    ///
    /// Engine failures are recorded as zero-score entries and the loop moves
    /// on. Only cancellation ends the loop with an error.
    pub async fn run(
        &self,
        engine: &dyn RecognitionEngine,
        image: &RgbaImage,
        language: &str,
        ctx: &RunContext,
    ) -> Result<Vec<RecognitionResult>, PipelineError> {
        let total = self.strategies.len().max(1) as f32;
        let span = PROGRESS_SPAN / total;
        let mut results = Vec::with_capacity(self.strategies.len());

        for (i, strategy) in self.strategies.iter().enumerate() {
            ctx.checkpoint()?;

            let base = PROGRESS_START + i as f32 * span;
            let status = ProgressStatus::Recognizing {
                strategy: strategy.name.clone(),
            };
            ctx.progress.report(status.clone(), base);

            let on_engine_progress = |fraction: f32| {
                ctx.progress
                    .report(status.clone(), base + fraction.clamp(0.0, 1.0) * span);
            };

            debug!("Trying strategy {} ({:?})", strategy.name, strategy.options.segmentation);
            let outcome = engine
                .recognize(
                    image,
                    language,
                    &strategy.options,
                    Some(&on_engine_progress as &EngineProgress<'_>),
                )
                .await;

            match outcome {
                Ok(output) => {
                    let output = output.normalized();
                    let quality = self.quality_score(&output);
                    let word_count = output.words.len();
                    let text_length = output.text.chars().count();
                    let mut result = RecognitionResult::from_output(strategy, output, quality);

                    debug!(
                        "Strategy {}: confidence {:.1}, quality {:.1}, {} words",
                        strategy.name, result.confidence, result.quality_score, word_count
                    );

                    if ctx.debug {
                        result.processing_steps = vec![
                            format!("Strategy: {} ({})", strategy.name, strategy.description),
                            format!("Confidence: {:.1}%", result.confidence),
                            format!("Quality Score: {:.1}", result.quality_score),
                            format!("Words Found: {}", word_count),
                            format!("Text Length: {}", text_length),
                        ];
                    }

                    let stop = self.should_stop(i + 1, result.quality_score, result.confidence);
                    if let (Some(reason), true) = (stop, ctx.debug) {
                        result.processing_steps.push(reason.to_string());
                    }
                    results.push(result);

                    if let Some(reason) = stop {
                        info!("{} after {} of {} strategies", reason, i + 1, self.strategies.len());
                        break;
                    }
                }
                Err(err) => {
                    warn!("Strategy {} failed: {}", strategy.name, err);
                    let mut result = RecognitionResult::failed(strategy, err.to_string());
                    if ctx.debug {
                        result.processing_steps = vec![
                            format!("Strategy: {} ({})", strategy.name, strategy.description),
                            format!("Error: {}", err),
                        ];
                    }
                    results.push(result);
                }
            }
        }

        Ok(results)
    }

    fn selection_score(&self, result: &RecognitionResult) -> f32 {
        result.quality_score * self.selection.quality + result.confidence * self.selection.confidence
    }

    /// Best non-error attempt; the first ties win
    ///
    /// When every attempt failed the first one is returned with a zero quality
    /// score so callers can still inspect it. `None` only for an empty list.
    pub fn select_best(&self, results: &[RecognitionResult]) -> Option<RecognitionResult> {
        let first = results.first()?;

        let best = results
            .iter()
            .filter(|result| !result.is_error())
            .fold(None::<&RecognitionResult>, |best, current| match best {
                Some(best) if self.selection_score(current) <= self.selection_score(best) => {
                    Some(best)
                }
                _ => Some(current),
            });

        Some(match best {
            Some(best) => best.clone(),
            None => RecognitionResult {
                quality_score: 0.0,
                ..first.clone()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ocr::BBox;
    use crate::vision::scripted::{ScriptedEngine, ScriptedResponse};
    use image::Rgba;

    fn words(texts: &[&str], confidence: f32) -> Vec<OcrWord> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| OcrWord {
                text: text.to_string(),
                confidence,
                bbox: Some(BBox::new(0, i as i32 * 20, 60, i as i32 * 20 + 15)),
            })
            .collect()
    }

    /// Five valid words, 30+ characters of text
    fn output(confidence: f32, word_confidence: f32) -> EngineOutput {
        let texts = ["apple", "banana", "cherry", "grape", "lemon"];
        EngineOutput {
            text: "apple\nbanana\ncherry\ngrape\nlemon".to_string(),
            confidence,
            words: words(&texts, word_confidence),
            ..Default::default()
        }
    }

    fn image() -> RgbaImage {
        RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]))
    }

    fn result(strategy: &str, quality: f32, confidence: f32) -> RecognitionResult {
        RecognitionResult {
            quality_score: quality,
            confidence,
            ..RecognitionResult::empty(strategy)
        }
    }

    #[test]
    fn test_default_strategies() {
        let strategies = default_strategies();
        assert!(strategies.len() >= 5);
        assert_eq!(strategies[0].name, "single_word_high_quality");
        assert_eq!(strategies[0].options.segmentation, SegmentationMode::SingleWord);
        assert_eq!(strategies[4].options.segmentation, SegmentationMode::MixedSparse);
        assert!(strategies
            .iter()
            .all(|s| s.options.char_whitelist.as_deref() == Some(STRATEGY_WHITELIST)));
    }

    #[test]
    fn test_quality_score_formula() {
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());
        let output = EngineOutput {
            text: "HELLO WORLD".to_string(),
            confidence: 80.0,
            words: vec![
                OcrWord {
                    text: "HELLO".to_string(),
                    confidence: 90.0,
                    bbox: None,
                },
                OcrWord {
                    text: "W0RLD".to_string(),
                    confidence: 70.0,
                    bbox: None,
                },
            ],
            ..Default::default()
        };

        // 32 + 8 + 5.5 + 7.5 + 8
        let score = orchestrator.quality_score(&output);
        assert!((score - 61.0).abs() < 0.01, "score was {}", score);
    }

    #[test]
    fn test_quality_score_clamped() {
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());
        let score = orchestrator.quality_score(&output(100.0, 100.0));
        assert_eq!(score, 100.0);
        assert_eq!(orchestrator.quality_score(&EngineOutput::default()), 0.0);
    }

    #[tokio::test]
    async fn test_early_exit_on_excellent_first_strategy() {
        let engine = ScriptedEngine::default().with_default(ScriptedResponse::Output(output(95.0, 95.0)));
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());

        let results = orchestrator
            .run(&engine, &image(), "eng", &RunContext::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].quality_score > 90.0);
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_early_exit_after_three_good_attempts() {
        // 30 + 20 + 15 + 15 + 2 = 82
        let engine = ScriptedEngine::default().with_default(ScriptedResponse::Output(output(75.0, 20.0)));
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());

        let results = orchestrator
            .run(&engine, &image(), "eng", &RunContext::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(engine.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_strategy_is_recorded_and_skipped() {
        let engine = ScriptedEngine::default()
            .with_mode(
                SegmentationMode::SingleWord,
                ScriptedResponse::Error("engine crashed".to_string()),
            )
            .with_default(ScriptedResponse::Output(output(40.0, 40.0)));
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());
        let ctx = RunContext {
            debug: true,
            ..Default::default()
        };

        let results = orchestrator.run(&engine, &image(), "eng", &ctx).await.unwrap();

        assert_eq!(results.len(), 5);
        assert!(results[0].is_error());
        assert_eq!(results[0].quality_score, 0.0);
        assert!(results[0].processing_steps.iter().any(|s| s.contains("engine crashed")));
        assert!(results[1..].iter().all(|r| !r.is_error()));
        assert!(results[1].processing_steps[0].starts_with("Strategy: text_line_optimized"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_strategy() {
        let engine = ScriptedEngine::default().with_default(ScriptedResponse::Output(output(95.0, 95.0)));
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());
        let ctx = RunContext::default();
        ctx.cancel.cancel();

        let outcome = orchestrator.run(&engine, &image(), "eng", &ctx).await;

        assert!(matches!(outcome, Err(PipelineError::Cancelled)));
        assert_eq!(engine.call_count(), 0);
    }

    #[test]
    fn test_select_best_weighted() {
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());
        let results = vec![
            // 0.6*80 + 0.4*50 = 68
            result("a", 80.0, 50.0),
            // 0.6*60 + 0.4*90 = 72
            result("b", 60.0, 90.0),
            RecognitionResult {
                error: Some("boom".to_string()),
                ..result("c", 100.0, 100.0)
            },
        ];

        let best = orchestrator.select_best(&results).unwrap();
        assert_eq!(best.strategy, "b");
    }

    #[test]
    fn test_select_best_first_wins_tie() {
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());
        let results = vec![result("first", 70.0, 70.0), result("second", 70.0, 70.0)];

        assert_eq!(orchestrator.select_best(&results).unwrap().strategy, "first");
    }

    #[test]
    fn test_select_best_all_errors_degrades() {
        let orchestrator = RecognitionOrchestrator::new(&ScoringConfig::default());
        let results = vec![
            RecognitionResult {
                error: Some("one".to_string()),
                ..result("a", 0.0, 0.0)
            },
            RecognitionResult {
                error: Some("two".to_string()),
                ..result("b", 0.0, 0.0)
            },
        ];

        let best = orchestrator.select_best(&results).unwrap();
        assert_eq!(best.strategy, "a");
        assert_eq!(best.quality_score, 0.0);
        assert!(best.is_error());
        assert!(orchestrator.select_best(&[]).is_none());
    }
}
