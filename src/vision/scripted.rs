//! Scripted recognition engine
//!
//! Replays canned engine outputs instead of running OCR. Used by the tests
//! and by the CLI `--replay` mode to re-run scoring and filtering against a
//! captured engine response.

use async_trait::async_trait;
use image::RgbaImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::EngineError;
use crate::vision::ocr::{
    EngineOutput, EngineProgress, RecognitionEngine, RecognitionOptions, SegmentationMode,
    LETTERS_WHITELIST,
};

/// What the engine answers with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedResponse {
    Output(EngineOutput),
    Error(String),
}

impl Default for ScriptedResponse {
    fn default() -> Self {
        ScriptedResponse::Output(EngineOutput::default())
    }
}

/// Responses keyed by call kind
///
/// Rotation probes (letters-only whitelist) answer from `probes` in call
/// order; strategy calls answer from `modes` by segmentation mode, falling
/// back to `default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineScript {
    pub default: ScriptedResponse,
    pub modes: HashMap<SegmentationMode, ScriptedResponse>,
    pub probes: Vec<ScriptedResponse>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptFile {
    Script(EngineScript),
    Output(EngineOutput),
}

/// One recorded engine call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub segmentation: SegmentationMode,
    pub language: String,
    pub width: u32,
    pub height: u32,
    pub probe: bool,
}

/// Engine that answers from an [`EngineScript`]
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    script: EngineScript,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedEngine {
    pub fn new(script: EngineScript) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Load a script from a JSON file
    ///
    /// Accepts either a full [`EngineScript`] or a bare [`EngineOutput`],
    /// which then answers every call.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let script = match serde_json::from_str::<ScriptFile>(&content)? {
            ScriptFile::Script(script) => script,
            ScriptFile::Output(output) => EngineScript {
                default: ScriptedResponse::Output(output),
                ..Default::default()
            },
        };
        Ok(Self::new(script))
    }

    pub fn with_default(mut self, response: ScriptedResponse) -> Self {
        self.script.default = response;
        self
    }

    pub fn with_mode(mut self, mode: SegmentationMode, response: ScriptedResponse) -> Self {
        self.script.modes.insert(mode, response);
        self
    }

    pub fn with_probe(mut self, response: ScriptedResponse) -> Self {
        self.script.probes.push(response);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn response_for(&self, options: &RecognitionOptions, probe_index: Option<usize>) -> ScriptedResponse {
        if let Some(index) = probe_index {
            if let Some(response) = self.script.probes.get(index) {
                return response.clone();
            }
        }
        self.script
            .modes
            .get(&options.segmentation)
            .unwrap_or(&self.script.default)
            .clone()
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(
        &self,
        image: &RgbaImage,
        language: &str,
        options: &RecognitionOptions,
        progress: Option<&EngineProgress<'_>>,
    ) -> Result<EngineOutput, EngineError> {
        let probe = options.char_whitelist.as_deref() == Some(LETTERS_WHITELIST);

        let probe_index = {
            let mut calls = self.calls.lock();
            let index = calls.iter().filter(|call| call.probe).count();
            calls.push(RecordedCall {
                segmentation: options.segmentation,
                language: language.to_string(),
                width: image.width(),
                height: image.height(),
                probe,
            });
            probe.then_some(index)
        };

        debug!(
            "Scripted call {:?} on {}x{} (probe: {})",
            options.segmentation,
            image.width(),
            image.height(),
            probe
        );

        if let Some(report) = progress {
            report(0.5);
        }

        let response = self.response_for(options, probe_index);

        if let Some(report) = progress {
            report(1.0);
        }

        match response {
            ScriptedResponse::Output(output) => Ok(output),
            ScriptedResponse::Error(message) => Err(EngineError::Recognition(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Write;

    fn output(text: &str) -> EngineOutput {
        EngineOutput {
            text: text.to_string(),
            confidence: 80.0,
            ..Default::default()
        }
    }

    fn image() -> RgbaImage {
        RgbaImage::from_pixel(30, 10, Rgba([0, 0, 0, 255]))
    }

    #[tokio::test]
    async fn test_mode_and_default_responses() {
        let engine = ScriptedEngine::default()
            .with_default(ScriptedResponse::Output(output("default")))
            .with_mode(SegmentationMode::SingleLine, ScriptedResponse::Output(output("line")));

        let line = engine
            .recognize(&image(), "eng", &RecognitionOptions::new(SegmentationMode::SingleLine), None)
            .await
            .unwrap();
        let block = engine
            .recognize(&image(), "eng", &RecognitionOptions::new(SegmentationMode::DenseBlock), None)
            .await
            .unwrap();

        assert_eq!(line.text, "line");
        assert_eq!(block.text, "default");
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn test_probes_answer_in_order() {
        let engine = ScriptedEngine::default()
            .with_probe(ScriptedResponse::Output(output("first")))
            .with_probe(ScriptedResponse::Error("bad probe".to_string()));
        let options =
            RecognitionOptions::new(SegmentationMode::SingleWord).with_whitelist(LETTERS_WHITELIST);

        let first = engine.recognize(&image(), "eng", &options, None).await;
        let second = engine.recognize(&image(), "eng", &options, None).await;
        let third = engine.recognize(&image(), "eng", &options, None).await;

        assert_eq!(first.unwrap().text, "first");
        assert_eq!(second, Err(EngineError::Recognition("bad probe".to_string())));
        // Out of probes: falls back to the default response
        assert_eq!(third.unwrap().text, "");
        assert!(engine.calls().iter().all(|call| call.probe));
    }

    #[tokio::test]
    async fn test_reports_progress() {
        let engine = ScriptedEngine::default();
        let seen = Mutex::new(Vec::new());
        let report = |fraction: f32| seen.lock().push(fraction);

        engine
            .recognize(
                &image(),
                "eng",
                &RecognitionOptions::new(SegmentationMode::SparseAuto),
                Some(&report as &EngineProgress<'_>),
            )
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![0.5, 1.0]);
    }

    #[test]
    fn test_load_script_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"default": {{"output": {{"text": "APPLE", "confidence": 91}}}},
                "modes": {{"single_word": {{"error": "timeout"}}}}}}"#
        )
        .unwrap();

        let engine = ScriptedEngine::from_json_file(file.path()).unwrap();
        assert_eq!(
            engine.script.default,
            ScriptedResponse::Output(EngineOutput {
                text: "APPLE".to_string(),
                confidence: 91.0,
                ..Default::default()
            })
        );
        assert_eq!(
            engine.script.modes.get(&SegmentationMode::SingleWord),
            Some(&ScriptedResponse::Error("timeout".to_string()))
        );
    }

    #[test]
    fn test_load_bare_output_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"text": "HELLO", "confidence": 70, "words": []}}"#).unwrap();

        let engine = ScriptedEngine::from_json_file(file.path()).unwrap();
        assert!(matches!(
            engine.script.default,
            ScriptedResponse::Output(ref output) if output.text == "HELLO"
        ));
    }
}
