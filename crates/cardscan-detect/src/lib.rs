// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan-detect — Locates an ID card in a photo and returns it upright.
//
// Pipeline: edge map (preprocess) → four-cornered contours (candidates) →
// perspective unwarp (geometry) → identifier OCR gate (validate) → first
// accepted or first normalized candidate (select). `CardScanner` ties it together.

pub mod candidates;
pub mod geometry;
pub mod ocr;
pub mod overlay;
pub mod preprocess;
pub mod scanner;
pub mod select;
pub mod validate;

#[cfg(test)]
mod test_support;

// Re-export the primary types so callers can use `cardscan_detect::CardScanner` etc.
pub use ocr::{DeadlineRecognizer, TextRecognizer, UnavailableRecognizer};
pub use overlay::render_overlay;
pub use scanner::CardScanner;
pub use select::SelectionResult;

#[cfg(feature = "ocr")]
pub use ocr::ocrs_engine::{OcrModelConfig, OcrsRecognizer};
