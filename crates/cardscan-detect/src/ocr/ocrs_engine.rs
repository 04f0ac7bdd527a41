// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `ocrs`-backed text recognizer.
//
// # Model Setup
//
// The engine needs two model files:
//
// - **Detection model** (`text-detection.rten`) locates text in the region.
// - **Recognition model** (`text-recognition.rten`) decodes the characters.
//
// Running `ocrs-cli` once downloads both into `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is where `OcrModelConfig::default` looks.
//
// `ocrs` has no per-language packs, so language-hinted strategies are reported
// as unsupported and the whitelist strategy does the work.

use std::path::{Path, PathBuf};

use cardscan_core::{OcrError, RecognitionStrategy};
use image::{DynamicImage, GrayImage};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use super::TextRecognizer;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to load the two models from.
#[derive(Debug, Clone)]
pub struct OcrModelConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrModelConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrModelConfig {
    /// Expects `dir` to contain `text-detection.rten` and `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<(), OcrError> {
        for (role, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(OcrError::Unavailable(format!(
                    "{role} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Text recognizer over a loaded `ocrs` engine. Load once, share across scans.
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrModelConfig) -> Result<Self, OcrError> {
        config.validate()?;

        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                OcrError::Unavailable(format!("failed to load model {}: {}", path.display(), err))
            })
        };

        info!("Loading OCR models");
        let detection_model = load(&config.detection_model_path)?;
        let recognition_model = load(&config.recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| OcrError::Unavailable(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine ready");
        Ok(Self { engine })
    }

    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self, OcrError> {
        Self::new(&OcrModelConfig::from_dir(dir))
    }

    fn read_text(&self, region: &GrayImage) -> Result<String, OcrError> {
        let rgb = DynamicImage::ImageLuma8(region.clone()).to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            OcrError::Engine(format!("failed to create image source ({width}x{height}): {err}"))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| OcrError::Engine(format!("OCR preprocessing failed: {err}")))?;
        self.engine
            .get_text(&input)
            .map_err(|err| OcrError::Engine(format!("OCR text recognition failed: {err}")))
    }
}

impl TextRecognizer for OcrsRecognizer {
    #[instrument(skip_all, fields(strategy = strategy.name(), width = region.width(), height = region.height()))]
    fn recognize(
        &self,
        region: &GrayImage,
        strategy: &RecognitionStrategy,
    ) -> Result<String, OcrError> {
        match strategy {
            RecognitionStrategy::DigitLanguage { language } => Err(OcrError::UnsupportedHint(
                format!("ocrs has no `{language}` language model"),
            )),
            RecognitionStrategy::Whitelist { whitelist, .. } => {
                let text = self.read_text(region)?;
                let kept = keep_whitelisted(&text, whitelist);
                debug!(raw_chars = text.chars().count(), kept_chars = kept.chars().count(), "OCR text filtered");
                Ok(kept)
            }
        }
    }
}

fn keep_whitelisted(text: &str, whitelist: &str) -> String {
    text.chars().filter(|c| whitelist.contains(*c)).collect()
}
