//! Application Configuration
//!
//! Pipeline settings and scoring weights stored in TOML format.
//! Scoring weights were tuned empirically; the defaults here are the reference values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recognition engine settings
    pub engine: EngineSettings,
    /// Which preprocessing stages run
    pub preprocess: PreprocessConfig,
    /// Numeric parameters of the preprocessing filters
    pub filters: FilterParams,
    /// Rotation, quality, early-exit and selection weights
    pub scoring: ScoringConfig,
    /// Final acceptance thresholds for word candidates
    pub quality: QualityThresholds,
    /// Pipeline behaviour
    pub pipeline: PipelineSettings,
}

/// Recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Engine language code (only English is supported by the word filters)
    pub language: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
        }
    }
}

/// Preprocessing stage toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Gamma/contrast/brightness enhancement
    pub enhance: bool,
    /// Fit the longer edge into the OCR-friendly range
    pub resize: bool,
    /// Unsharp masking
    pub sharpen: bool,
    /// Adaptive thresholding to black/white
    pub binarize: bool,
    /// Gaussian blur before enhancement
    pub denoise: bool,
    /// Detect and correct 90/180/270 degree rotation
    pub auto_rotate: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enhance: true,
            resize: true,
            sharpen: true,
            binarize: true,
            denoise: true,
            auto_rotate: true,
        }
    }
}

/// Numeric parameters of the preprocessing filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Images with a longer edge above this are scaled down
    pub max_dimension: u32,
    /// Images with a longer edge below this are scaled up
    pub min_dimension: u32,
    /// Gaussian blur radius for denoising
    pub denoise_radius: f32,
    /// Gamma correction exponent
    pub gamma: f32,
    /// Contrast factor around mid-gray
    pub contrast: f32,
    /// Brightness offset
    pub brightness: f32,
    /// Side length of the adaptive threshold block (odd)
    pub threshold_block_size: u32,
    /// Constant subtracted from the local mean
    pub threshold_c: f32,
    /// Unsharp mask strength
    pub sharpen_amount: f32,
    /// Unsharp mask blur radius
    pub sharpen_radius: f32,
    /// Minimum difference for a channel to be sharpened
    pub sharpen_threshold: f32,
    /// Share of the histogram-equalized value in the final blend (0.0 - 1.0)
    pub equalize_blend: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            min_dimension: 400,
            denoise_radius: 1.0,
            gamma: 0.8,
            contrast: 1.4,
            brightness: 10.0,
            threshold_block_size: 15,
            threshold_c: 8.0,
            sharpen_amount: 1.5,
            sharpen_radius: 1.5,
            sharpen_threshold: 0.0,
            equalize_blend: 0.3,
        }
    }
}

/// All scoring weights used to rank rotations and recognition attempts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rotation: RotationWeights,
    pub quality: QualityWeights,
    pub early_exit: EarlyExitRules,
    pub selection: SelectionWeights,
}

/// Rotation probe score: `confidence*w + valid_words*w + min(len, cap)*w`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationWeights {
    pub confidence: f32,
    pub valid_word: f32,
    pub text_length: f32,
    pub text_length_cap: usize,
    /// Per-word confidence a token needs to count as a valid word
    pub min_word_confidence: f32,
    /// Longer edge of the downscaled probe image
    pub probe_dimension: u32,
}

impl Default for RotationWeights {
    fn default() -> Self {
        Self {
            confidence: 0.4,
            valid_word: 15.0,
            text_length: 2.0,
            text_length_cap: 20,
            min_word_confidence: 30.0,
            probe_dimension: 400,
        }
    }
}

/// Quality score of a recognition attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub confidence: f32,
    pub word_count: f32,
    pub word_count_cap: f32,
    pub text_length: f32,
    pub text_length_cap: f32,
    pub valid_ratio: f32,
    pub avg_word_confidence: f32,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            confidence: 0.4,
            word_count: 4.0,
            word_count_cap: 20.0,
            text_length: 0.5,
            text_length_cap: 15.0,
            valid_ratio: 15.0,
            avg_word_confidence: 0.1,
        }
    }
}

/// When the orchestrator stops trying further strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyExitRules {
    /// Stop immediately when quality and confidence both exceed these
    pub excellent_quality: f32,
    pub excellent_confidence: f32,
    /// Stop after `good_min_attempts` when both exceed these
    pub good_quality: f32,
    pub good_confidence: f32,
    pub good_min_attempts: usize,
}

impl Default for EarlyExitRules {
    fn default() -> Self {
        Self {
            excellent_quality: 90.0,
            excellent_confidence: 80.0,
            good_quality: 70.0,
            good_confidence: 70.0,
            good_min_attempts: 3,
        }
    }
}

/// Final ranking of attempts: `quality*w + confidence*w`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionWeights {
    pub quality: f32,
    pub confidence: f32,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            quality: 0.6,
            confidence: 0.4,
        }
    }
}

/// Confidence thresholds of the final word gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Absolute minimum engine confidence
    pub min_confidence: f32,
    /// Words up to this length are "short"
    pub short_word_length: usize,
    /// Minimum confidence for short words
    pub short_word_confidence: f32,
    /// Minimum confidence for words that don't look like common English
    pub uncommon_word_confidence: f32,
    /// Confidence assigned to words parsed from line text without word boxes
    pub text_parse_confidence: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 40.0,
            short_word_length: 2,
            short_word_confidence: 70.0,
            uncommon_word_confidence: 65.0,
            text_parse_confidence: 75.0,
        }
    }
}

/// Pipeline behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Collect per-strategy results and step logs
    pub debug: bool,
    /// Treat an empty word list as a failed extraction
    pub require_words: bool,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the configuration directory
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let proj_dirs = directories::ProjectDirs::from("com", "vocablens", "VocabLens")
        .ok_or(ConfigError::NoConfigDir)?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
