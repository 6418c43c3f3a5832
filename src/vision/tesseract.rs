//! Tesseract backend
//!
//! Runs libtesseract through `leptess` on the blocking thread pool. A fresh
//! Tesseract instance is created per call since the handle cannot move between
//! threads.

use async_trait::async_trait;
use image::RgbaImage;
use leptess::{capi, LepTess, Variable};
use tracing::debug;

use crate::error::EngineError;
use crate::vision::ocr::{
    BBox, EngineMode, EngineOutput, EngineProgress, OcrLine, OcrWord, RecognitionEngine,
    RecognitionOptions,
};

/// Tesseract OCR engine
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine {
    /// Directory holding `*.traineddata`, system default when `None`
    data_path: Option<String>,
}

impl TesseractEngine {
    /// Create the engine, checking that `language` data is installed
    pub fn new(data_path: Option<String>, language: &str) -> Result<Self, EngineError> {
        LepTess::new(data_path.as_deref(), language).map_err(|e| {
            EngineError::Unavailable(format!(
                "Failed to initialize Tesseract with language '{}': {}",
                language, e
            ))
        })?;
        Ok(Self { data_path })
    }
}

fn set_variable(lt: &mut LepTess, variable: Variable, value: &str) {
    if let Err(e) = lt.set_variable(variable, value) {
        debug!("Tesseract rejected setting value {}: {}", value, e);
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Tesseract variables for one recognition call
fn engine_variables(options: &RecognitionOptions) -> Vec<(Variable, String)> {
    let mut variables = vec![(
        Variable::TesseditPagesegMode,
        options.segmentation.psm().to_string(),
    )];
    if options.engine_mode == EngineMode::LstmOnly {
        variables.push((Variable::TesseditOcrEngineMode, "1".to_string()));
    }
    if let Some(whitelist) = &options.char_whitelist {
        variables.push((Variable::TesseditCharWhitelist, whitelist.clone()));
    }
    if let Some(preserve) = options.preserve_interword_spaces {
        variables.push((Variable::PreserveInterwordSpaces, flag(preserve).to_string()));
    }
    if let Some(enable) = options.enable_doc_dict {
        variables.push((Variable::TesseditEnableDocDict, flag(enable).to_string()));
    }
    variables
}

/// Text and confidence of every component at one iterator level
fn read_components(lt: &mut LepTess, level: capi::TessPageIteratorLevel) -> Vec<(String, f32, BBox)> {
    let Some(boxes) = lt.get_component_boxes(level, true) else {
        return Vec::new();
    };

    let mut components = Vec::new();
    for component in &boxes {
        let geom = component.get_geometry();
        lt.set_rectangle(geom.x, geom.y, geom.w, geom.h);

        let text = lt.get_utf8_text().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            continue;
        }
        let confidence = lt.mean_text_conf() as f32;
        components.push((
            text,
            confidence,
            BBox::new(geom.x, geom.y, geom.x + geom.w, geom.y + geom.h),
        ));
    }
    components
}

fn recognize_blocking(
    data_path: Option<String>,
    image: RgbaImage,
    language: String,
    options: RecognitionOptions,
) -> Result<EngineOutput, EngineError> {
    let mut lt = LepTess::new(data_path.as_deref(), &language)
        .map_err(|e| EngineError::Unavailable(format!("Failed to initialize Tesseract: {}", e)))?;

    for (variable, value) in engine_variables(&options) {
        set_variable(&mut lt, variable, &value);
    }

    // leptess expects encoded image data
    let mut png = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    lt.set_image_from_mem(png.get_ref())
        .map_err(|e| EngineError::Recognition(format!("Failed to set image: {}", e)))?;

    let text = lt
        .get_utf8_text()
        .map_err(|e| EngineError::Recognition(e.to_string()))?;
    let confidence = lt.mean_text_conf() as f32;

    let words: Vec<OcrWord> = read_components(&mut lt, capi::TessPageIteratorLevel_RIL_WORD)
        .into_iter()
        .map(|(text, confidence, bbox)| OcrWord {
            text,
            confidence,
            bbox: Some(bbox),
        })
        .collect();

    // Word rectangles narrowed the recognition area
    lt.set_image_from_mem(png.get_ref())
        .map_err(|e| EngineError::Recognition(format!("Failed to set image: {}", e)))?;
    let lines = read_components(&mut lt, capi::TessPageIteratorLevel_RIL_TEXTLINE)
        .into_iter()
        .map(|(text, _, bbox)| OcrLine {
            text,
            bbox: Some(bbox),
            words: words
                .iter()
                .filter(|word| word.bbox.is_some_and(|b| bbox.contains_center_of(&b)))
                .cloned()
                .collect(),
        })
        .collect();

    Ok(EngineOutput {
        text,
        confidence,
        words,
        lines,
        paragraphs: Vec::new(),
    })
}

#[async_trait]
impl RecognitionEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        image: &RgbaImage,
        language: &str,
        options: &RecognitionOptions,
        progress: Option<&EngineProgress<'_>>,
    ) -> Result<EngineOutput, EngineError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EngineError::Recognition(format!(
                "Image dimensions must be non-zero (got {}x{})",
                width, height
            )));
        }

        if let Some(report) = progress {
            report(0.0);
        }

        let data_path = self.data_path.clone();
        let image = image.clone();
        let language = language.to_string();
        let options = options.clone();
        let output = tokio::task::spawn_blocking(move || {
            recognize_blocking(data_path, image, language, options)
        })
        .await
        .map_err(|e| EngineError::Recognition(format!("Tesseract task failed: {}", e)))??;

        debug!(
            "Tesseract read {} words in {} lines (confidence {:.1})",
            output.words.len(),
            output.lines.len(),
            output.confidence
        );

        if let Some(report) = progress {
            report(1.0);
        }
        Ok(output)
    }
}
