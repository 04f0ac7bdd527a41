// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for cardscan.
//
// Only `ScanError` ever reaches a caller. `CandidateError` and `OcrError` are
// recovered inside the selection loop and surface as candidate reports.

use std::time::Duration;

use thiserror::Error;

/// Fatal errors returned from a scan invocation.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Pipeline failures --
    #[error("image could not be decoded: {0}")]
    ImageLoad(String),

    #[error("no suitable quadrilateral found: {0}")]
    NoQuadrilateralFound(String),

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    // -- Persistence (CLI / config files) --
    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a single candidate quadrilateral was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandidateError {
    #[error("degenerate quadrilateral: {0}")]
    DegenerateGeometry(String),

    #[error("projective transform could not be solved")]
    Transform,

    #[error(
        "identifier region {x},{y} {width}x{height} lies outside the {card_width}x{card_height} card"
    )]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        card_width: u32,
        card_height: u32,
    },

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// Failure of one call into the OCR collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("OCR call timed out after {0:?}")]
    Timeout(Duration),

    #[error("recognition hint not supported: {0}")]
    UnsupportedHint(String),

    #[error("OCR failed: {0}")]
    Engine(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;
