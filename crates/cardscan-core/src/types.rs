// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the cardscan pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identifier::{DIGIT_WHITELIST, IdentifierString};

/// Unique identifier for one scan invocation (log correlation only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pixel-space coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// A quadrilateral whose corners are in canonical order.
///
/// Construct through the geometry normalizer's corner ordering so that the
/// sum/difference ordering invariant holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedQuad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl OrderedQuad {
    /// Corners as `[top_left, top_right, bottom_right, bottom_left]`.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Multiply every corner by `factor` (working frame → source frame).
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            top_left: self.top_left.scaled(factor),
            top_right: self.top_right.scaled(factor),
            bottom_right: self.bottom_right.scaled(factor),
            bottom_left: self.bottom_left.scaled(factor),
        }
    }

    /// Largest distance between corresponding corners of two quads.
    pub fn max_corner_distance(&self, other: &OrderedQuad) -> f32 {
        self.corners()
            .iter()
            .zip(other.corners().iter())
            .map(|(a, b)| a.distance(b))
            .fold(0.0, f32::max)
    }
}

/// Width and height of the published normalized card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSize {
    pub width: u32,
    pub height: u32,
}

impl CardSize {
    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Pixel rectangle on the normalized card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropBox {
    /// Whether the box lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|right| right <= width)
            && self.y.checked_add(self.height).is_some_and(|bottom| bottom <= height)
    }
}

/// One named OCR request mode. Strategies are tried in declared order until
/// one returns text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionStrategy {
    /// A language/model hint specialised for digits (e.g. `ara_number`).
    DigitLanguage { language: String },
    /// A general language hint restricted to an explicit character whitelist.
    Whitelist { language: String, whitelist: String },
}

impl RecognitionStrategy {
    /// Short label for logs and candidate reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DigitLanguage { .. } => "digit-language",
            Self::Whitelist { .. } => "whitelist",
        }
    }

    pub fn language(&self) -> &str {
        match self {
            Self::DigitLanguage { language } | Self::Whitelist { language, .. } => language,
        }
    }

    /// Default order: dedicated digit model first, whitelisted general model second.
    pub fn default_chain() -> Vec<Self> {
        vec![
            Self::DigitLanguage {
                language: "ara_number".into(),
            },
            Self::Whitelist {
                language: "ara+eng".into(),
                whitelist: DIGIT_WHITELIST.into(),
            },
        ]
    }
}

/// Which face of the card an image shows. Only affects output naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSide {
    Front,
    Back,
}

impl CardSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
        }
    }
}

impl std::fmt::Display for CardSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a successful selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanVerdict {
    /// A candidate passed the identifier gate.
    Accepted,
    /// No candidate passed; the first normalized candidate was used.
    Fallback,
}

/// What happened to one ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Accepted {
        digits: IdentifierString,
        confidence: f32,
        strategy: String,
    },
    GateFailed {
        digits: IdentifierString,
        confidence: f32,
        strategy: String,
    },
    GeometryFailed {
        reason: String,
    },
    OcrFailed {
        reason: String,
    },
}

/// Diagnostic record for one evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    /// Zero-based rank in area-descending order.
    pub rank: usize,
    /// Contour area in the working frame.
    pub area: f64,
    /// Ordered corners in source-image coordinates, when ordering succeeded.
    pub corners: Option<OrderedQuad>,
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
}

/// Serializable view of a scan result (everything except pixels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: ScanId,
    pub verdict: ScanVerdict,
    pub was_validated: bool,
    pub corners: OrderedQuad,
    pub card_size: CardSize,
    pub identifier: IdentifierString,
    pub confidence: f32,
    pub birth_date: Option<NaiveDate>,
    pub region_code: Option<String>,
    pub candidates: Vec<CandidateReport>,
}
