// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan configuration.
//
// The defaults are empirical: they were tuned against one card layout photographed
// at arm's length, and are exposed here so other layouts can override them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::types::{CardSize, CropBox, RecognitionStrategy};

/// Every tunable of the detect → normalize → verify → select pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Height of the downscaled frame used for edge and contour detection.
    pub working_height: u32,
    /// Size of the published normalized card (default 1000x630, ~1.58 aspect).
    pub output_size: CardSize,
    /// How many of the largest contours are considered.
    pub max_candidates: usize,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_fraction: f64,
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,
    /// Canny lower threshold = multiplier x median intensity.
    pub canny_lower_multiplier: f32,
    /// Canny upper threshold = multiplier x median intensity.
    pub canny_upper_multiplier: f32,
    /// Fixed intensity threshold used to binarize the card before OCR.
    pub binarization_threshold: u8,
    /// Where the identifier is printed on a normalized card.
    pub identifier_region: CropBox,
    /// Minimum recovered digits for a candidate to be accepted.
    pub min_identifier_digits: usize,
    /// Per-call OCR deadline in milliseconds. `None` waits indefinitely.
    pub ocr_timeout_ms: Option<u64>,
    /// OCR request modes, tried in order.
    pub recognition_strategies: Vec<RecognitionStrategy>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            working_height: 500,
            output_size: CardSize {
                width: 1000,
                height: 630,
            },
            max_candidates: 5,
            approx_epsilon_fraction: 0.02,
            blur_sigma: 1.1,
            canny_lower_multiplier: 0.66,
            canny_upper_multiplier: 1.33,
            binarization_threshold: 90,
            identifier_region: CropBox {
                x: 400,
                y: 480,
                width: 600,
                height: 80,
            },
            min_identifier_digits: 12,
            ocr_timeout_ms: Some(10_000),
            recognition_strategies: RecognitionStrategy::default_chain(),
        }
    }
}

impl ScanConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn ocr_timeout(&self) -> Option<Duration> {
        self.ocr_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ScanError::InvalidConfig(msg));

        if self.working_height == 0 {
            return invalid("working_height must be positive".into());
        }
        if self.output_size.width < 2 || self.output_size.height < 2 {
            return invalid(format!(
                "output_size {}x{} is too small",
                self.output_size.width, self.output_size.height
            ));
        }
        if self.max_candidates == 0 {
            return invalid("max_candidates must be at least 1".into());
        }
        if !(self.approx_epsilon_fraction > 0.0 && self.approx_epsilon_fraction < 1.0) {
            return invalid(format!(
                "approx_epsilon_fraction {} must lie in (0, 1)",
                self.approx_epsilon_fraction
            ));
        }
        if !(self.blur_sigma > 0.0) {
            return invalid(format!("blur_sigma {} must be positive", self.blur_sigma));
        }
        if self.canny_lower_multiplier < 0.0
            || self.canny_upper_multiplier < self.canny_lower_multiplier
        {
            return invalid(format!(
                "canny multipliers {} / {} must satisfy 0 <= lower <= upper",
                self.canny_lower_multiplier, self.canny_upper_multiplier
            ));
        }
        if !self
            .identifier_region
            .fits_within(self.output_size.width, self.output_size.height)
        {
            return invalid(format!(
                "identifier_region {:?} does not fit the {}x{} output card",
                self.identifier_region, self.output_size.width, self.output_size.height
            ));
        }
        if self.recognition_strategies.is_empty() {
            return invalid("at least one recognition strategy is required".into());
        }
        if self.ocr_timeout_ms == Some(0) {
            return invalid("ocr_timeout_ms must be positive when set".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::default();
        config.validate().unwrap();
        assert_eq!(config.output_size.width, 1000);
        assert_eq!(config.output_size.height, 630);
        assert!((config.output_size.aspect_ratio() - 1.587).abs() < 0.01);
        assert_eq!(config.ocr_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ScanConfig::from_json_str(r#"{ "max_candidates": 8, "ocr_timeout_ms": null }"#)
            .unwrap();
        assert_eq!(config.max_candidates, 8);
        assert_eq!(config.ocr_timeout(), None);
        assert_eq!(config.working_height, 500);
        assert_eq!(config.binarization_threshold, 90);
    }

    #[test]
    fn json_round_trip() {
        let mut config = ScanConfig::default();
        config.recognition_strategies.truncate(1);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ScanConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn rejects_crop_outside_output() {
        let mut config = ScanConfig::default();
        config.output_size = CardSize {
            width: 800,
            height: 500,
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn rejects_unusable_numbers() {
        let cases: [fn(&mut ScanConfig); 6] = [
            |c| c.working_height = 0,
            |c| c.max_candidates = 0,
            |c| c.approx_epsilon_fraction = 0.0,
            |c| c.blur_sigma = 0.0,
            |c| c.canny_upper_multiplier = 0.1,
            |c| c.recognition_strategies.clear(),
        ];
        for mutate in cases {
            let mut config = ScanConfig::default();
            mutate(&mut config);
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "working_height": 400 }}"#).unwrap();
        let config = ScanConfig::load(file.path()).unwrap();
        assert_eq!(config.working_height, 400);
    }

    #[test]
    fn load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ScanConfig::load(file.path()),
            Err(ScanError::Serialization(_))
        ));
    }
}
