//! VocabLens - vocabulary extraction from photographed text
//!
//! Reads an image, runs the multi-strategy OCR pipeline and prints the
//! vocabulary words it found.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vocab_lens::config::{self, AppConfig};
use vocab_lens::pipeline::{ExtractOptions, PipelineCoordinator, ProgressEvent};
use vocab_lens::vision::{RecognitionEngine, ScriptedEngine};

/// VocabLens - vocabulary word extraction
#[derive(Parser, Debug)]
#[command(name = "vocab-lens")]
#[command(about = "Extract English vocabulary words from a photo of a word list")]
struct Args {
    /// Image to read (PNG, JPEG, ...)
    image: PathBuf,

    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay a captured engine output (JSON) instead of running OCR
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Include every recognition attempt in the output
    #[arg(long)]
    debug: bool,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Skip rotation detection
    #[arg(long)]
    no_rotate: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => load_or_create_config(),
    };
    if args.no_rotate {
        config.preprocess.auto_rotate = false;
    }

    let engine = create_engine(&args, &config)?;
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("Failed to read image {:?}", args.image))?;

    let options = ExtractOptions {
        debug: args.debug,
        on_progress: Some(Arc::new(|event: &ProgressEvent| {
            tracing::debug!("{} {:.0}%", event.status, event.percent);
        })),
        ..Default::default()
    };

    info!("Reading {:?} with the {} engine", args.image, engine.name());
    let coordinator = PipelineCoordinator::new(config);
    let report = coordinator
        .extract_text(engine.as_ref(), &bytes, &options)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.success {
        for candidate in &report.words {
            println!("{}\t{:.1}", candidate.word, candidate.confidence);
        }
        info!(
            "{} words (confidence {:.1})",
            report.words.len(),
            report.confidence
        );
    }

    if let Some(error) = &report.error {
        bail!("Extraction failed: {}", error);
    }
    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config() -> AppConfig {
    if let Ok(config_dir) = config::config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => warn!("Ignoring {:?}: {}", config_path, e),
            }
        } else if let Err(e) = config::save_config(&AppConfig::default(), &config_path) {
            warn!("Could not write default configuration: {}", e);
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn create_engine(args: &Args, config: &AppConfig) -> Result<Box<dyn RecognitionEngine>> {
    if let Some(path) = &args.replay {
        return Ok(Box::new(load_replay(path)?));
    }
    tesseract_engine(config)
}

fn load_replay(path: &Path) -> Result<ScriptedEngine> {
    ScriptedEngine::from_json_file(path)
        .with_context(|| format!("Failed to load replay file {:?}", path))
}

#[cfg(feature = "tesseract")]
fn tesseract_engine(config: &AppConfig) -> Result<Box<dyn RecognitionEngine>> {
    let engine = vocab_lens::vision::TesseractEngine::new(None, &config.engine.language)?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_engine(_config: &AppConfig) -> Result<Box<dyn RecognitionEngine>> {
    bail!("No OCR engine available: build with --features tesseract or pass --replay")
}
