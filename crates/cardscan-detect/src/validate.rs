// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate validation — binarize the normalized card, crop the identifier box,
// and run the OCR strategy chain over it.

use cardscan_core::{
    CandidateError, CropBox, IdentifierString, OcrError, RecognitionStrategy, ScanConfig,
};
use image::imageops;
use image::{GrayImage, Luma, RgbImage};
use tracing::{debug, info, instrument, warn};

use crate::ocr::TextRecognizer;

/// Result of reading one candidate's identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub identifier: IdentifierString,
    pub confidence: f32,
    /// Whether the identifier passed the digit-count gate.
    pub passed: bool,
    /// Name of the strategy that produced the text.
    pub strategy: String,
}

/// Reads and scores the printed identifier on a normalized card.
#[derive(Debug, Clone)]
pub struct CandidateValidator {
    threshold: u8,
    region: CropBox,
    min_digits: usize,
    strategies: Vec<RecognitionStrategy>,
}

impl CandidateValidator {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            threshold: config.binarization_threshold,
            region: config.identifier_region,
            min_digits: config.min_identifier_digits,
            strategies: config.recognition_strategies.clone(),
        }
    }

    #[instrument(skip_all, fields(width = card.width(), height = card.height()))]
    pub fn validate(
        &self,
        card: &RgbImage,
        recognizer: &dyn TextRecognizer,
    ) -> Result<Validation, CandidateError> {
        let binary = binarize(&imageops::grayscale(card), self.threshold);
        let region = identifier_crop(&binary, &self.region)?;

        let (text, strategy) = self.recognize_with_fallback(&region, recognizer)?;
        let identifier = IdentifierString::from_ocr_text(&text);
        let confidence = identifier.confidence();
        let passed = identifier.passes_gate(self.min_digits);

        info!(
            strategy,
            digits = identifier.len(),
            confidence,
            passed,
            "Identifier read"
        );

        Ok(Validation {
            identifier,
            confidence,
            passed,
            strategy: strategy.to_string(),
        })
    }

    /// Try each strategy in order; the first to return text wins. If all fail,
    /// the last failure is returned. A timeout or an unavailable engine ends
    /// the chain, since the next strategy would hit the same engine.
    fn recognize_with_fallback(
        &self,
        region: &GrayImage,
        recognizer: &dyn TextRecognizer,
    ) -> Result<(String, &'static str), CandidateError> {
        let mut last_error = None;
        for strategy in &self.strategies {
            match recognizer.recognize(region, strategy) {
                Ok(text) => return Ok((text, strategy.name())),
                Err(err @ (OcrError::Timeout(_) | OcrError::Unavailable(_))) => {
                    warn!(strategy = strategy.name(), error = %err, "OCR engine unusable for this candidate");
                    return Err(CandidateError::Ocr(err));
                }
                Err(err) => {
                    debug!(strategy = strategy.name(), error = %err, "Recognition strategy failed");
                    last_error = Some(err);
                }
            }
        }

        let err = last_error
            .unwrap_or_else(|| OcrError::Unavailable("no recognition strategies configured".into()));
        warn!(error = %err, "Every recognition strategy failed");
        Err(CandidateError::Ocr(err))
    }
}

/// Fixed-threshold binarization: values above `threshold` become 255, the rest 0.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        *pixel = if pixel.0[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        };
    }
    out
}

/// Crop the identifier box, failing if it does not lie inside the card.
pub fn identifier_crop(card: &GrayImage, region: &CropBox) -> Result<GrayImage, CandidateError> {
    let (card_width, card_height) = card.dimensions();
    if !region.fits_within(card_width, card_height) {
        return Err(CandidateError::CropOutOfBounds {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            card_width,
            card_height,
        });
    }
    Ok(imageops::crop_imm(card, region.x, region.y, region.width, region.height).to_image())
}
