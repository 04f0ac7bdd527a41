// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner — the public entry point. One call runs the whole
// detect → normalize → verify → select pipeline on one photo.

use std::path::Path;
use std::sync::Arc;

use cardscan_core::{ScanConfig, ScanError, ScanId};
use image::RgbImage;
use tracing::{info, instrument};

use crate::candidates::CandidateExtractor;
use crate::geometry::GeometryNormalizer;
use crate::ocr::{DeadlineRecognizer, TextRecognizer};
use crate::preprocess::{decode_bytes, open_path, preprocess};
use crate::select::{SelectionOrchestrator, SelectionResult};
use crate::validate::CandidateValidator;

/// Locates and normalizes an ID card in photos.
///
/// Holds only immutable configuration and a shared recognizer, so one scanner
/// can serve any number of concurrent scans.
pub struct CardScanner {
    config: ScanConfig,
    extractor: CandidateExtractor,
    orchestrator: SelectionOrchestrator,
    recognizer: Arc<dyn TextRecognizer>,
}

impl CardScanner {
    /// Build a scanner. The recognizer is wrapped in a deadline when the
    /// config sets an OCR timeout.
    pub fn new(config: ScanConfig, recognizer: Arc<dyn TextRecognizer>) -> Result<Self, ScanError> {
        config.validate()?;

        let recognizer: Arc<dyn TextRecognizer> = match config.ocr_timeout() {
            Some(timeout) => Arc::new(DeadlineRecognizer::new(recognizer, timeout)),
            None => recognizer,
        };
        let orchestrator = SelectionOrchestrator::new(
            GeometryNormalizer::new(config.output_size),
            CandidateValidator::from_config(&config),
        );

        Ok(Self {
            extractor: CandidateExtractor::from_config(&config),
            orchestrator,
            recognizer,
            config,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan an encoded image (JPEG, PNG, ...).
    pub fn scan_bytes(&self, data: &[u8]) -> Result<SelectionResult, ScanError> {
        let raw = decode_bytes(data)?;
        self.scan_frame(ScanId::new(), &raw)
    }

    /// Scan an image file.
    pub fn scan_path(&self, path: impl AsRef<Path>) -> Result<SelectionResult, ScanError> {
        let raw = open_path(path)?;
        self.scan_frame(ScanId::new(), &raw)
    }

    /// Scan an already decoded frame.
    pub fn scan_image(&self, raw: &RgbImage) -> Result<SelectionResult, ScanError> {
        self.scan_frame(ScanId::new(), raw)
    }

    #[instrument(skip_all, fields(scan_id = %scan_id, width = raw.width(), height = raw.height()))]
    fn scan_frame(&self, scan_id: ScanId, raw: &RgbImage) -> Result<SelectionResult, ScanError> {
        let (quads, scale) = {
            let pre = preprocess(raw, &self.config)?;
            (self.extractor.extract(&pre.edges), pre.scale)
        };

        let result =
            self.orchestrator
                .select(scan_id, raw, scale, &quads, self.recognizer.as_ref())?;

        info!(
            verdict = ?result.verdict,
            was_validated = result.was_validated,
            evaluated = result.candidates.len(),
            "Scan complete"
        );
        Ok(result)
    }
}
