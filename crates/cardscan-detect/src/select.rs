// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate selection — walks the ranked quadrilaterals as an explicit state
// machine and settles on an accepted card, a geometric fallback, or nothing.

use cardscan_core::{
    CandidateOutcome, CandidateReport, CardSize, IdentifierString, OrderedQuad, ScanError, ScanId,
    ScanSummary, ScanVerdict,
};
use image::RgbImage;
use tracing::{debug, info, instrument, warn};

use crate::candidates::Quadrilateral;
use crate::geometry::{GeometryNormalizer, NormalizedCandidate, order_corners};
use crate::ocr::TextRecognizer;
use crate::validate::{CandidateValidator, Validation};

/// Outcome of a successful scan.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub scan_id: ScanId,
    pub verdict: ScanVerdict,
    /// Ordered corners in source-image pixels.
    pub quad: OrderedQuad,
    /// The normalized card at the published output size.
    pub card: RgbImage,
    /// Digits read from the chosen candidate. Empty if it never reached OCR.
    pub identifier: IdentifierString,
    pub confidence: f32,
    /// `true` only when the identifier gate passed.
    pub was_validated: bool,
    /// One report per evaluated candidate, in rank order.
    pub candidates: Vec<CandidateReport>,
}

impl SelectionResult {
    /// Serializable view without the pixels.
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            scan_id: self.scan_id,
            verdict: self.verdict,
            was_validated: self.was_validated,
            corners: self.quad,
            card_size: CardSize {
                width: self.card.width(),
                height: self.card.height(),
            },
            identifier: self.identifier.clone(),
            confidence: self.confidence,
            birth_date: self.identifier.birth_date(),
            region_code: self.identifier.region_code().map(str::to_string),
            candidates: self.candidates.clone(),
        }
    }
}

/// The first candidate that normalized, with whatever its OCR pass produced.
struct Retained {
    candidate: NormalizedCandidate,
    validation: Option<Validation>,
}

enum Terminal {
    Accepted {
        candidate: NormalizedCandidate,
        validation: Validation,
    },
    Fallback(Retained),
    Fatal(String),
}

enum SelectionState {
    Searching {
        next: usize,
        fallback: Option<Retained>,
    },
    Done(Terminal),
}

/// Evaluates candidates in rank order until one passes the identifier gate.
#[derive(Debug, Clone)]
pub struct SelectionOrchestrator {
    normalizer: GeometryNormalizer,
    validator: CandidateValidator,
}

impl SelectionOrchestrator {
    pub fn new(normalizer: GeometryNormalizer, validator: CandidateValidator) -> Self {
        Self {
            normalizer,
            validator,
        }
    }

    /// Run the selection loop over `quads` (area-descending, working-frame
    /// coordinates) against the full-resolution `source`.
    #[instrument(skip_all, fields(candidates = quads.len(), scale = scale))]
    pub fn select(
        &self,
        scan_id: ScanId,
        source: &RgbImage,
        scale: f32,
        quads: &[Quadrilateral],
        recognizer: &dyn TextRecognizer,
    ) -> Result<SelectionResult, ScanError> {
        let mut reports = Vec::with_capacity(quads.len());
        let mut state = SelectionState::Searching {
            next: 0,
            fallback: None,
        };

        let terminal = loop {
            match state {
                SelectionState::Done(terminal) => break terminal,
                SelectionState::Searching { next, fallback } => {
                    state = match quads.get(next) {
                        Some(quad) => {
                            self.evaluate(quad, next, fallback, source, scale, recognizer, &mut reports)
                        }
                        None => SelectionState::Done(match fallback {
                            Some(retained) => Terminal::Fallback(retained),
                            None => Terminal::Fatal(if quads.is_empty() {
                                "no four-cornered contour among the largest edges".into()
                            } else {
                                format!("all {} quadrilateral candidates were degenerate", quads.len())
                            }),
                        }),
                    };
                }
            }
        };

        match terminal {
            Terminal::Accepted {
                candidate,
                validation,
            } => {
                info!(
                    identifier = %validation.identifier,
                    confidence = validation.confidence,
                    "Candidate accepted"
                );
                Ok(SelectionResult {
                    scan_id,
                    verdict: ScanVerdict::Accepted,
                    quad: candidate.quad,
                    card: candidate.card,
                    identifier: validation.identifier,
                    confidence: validation.confidence,
                    was_validated: true,
                    candidates: reports,
                })
            }
            Terminal::Fallback(Retained {
                candidate,
                validation,
            }) => {
                let (identifier, confidence) = validation
                    .map(|v| (v.identifier, v.confidence))
                    .unwrap_or_default();
                warn!(
                    evaluated = reports.len(),
                    "No candidate passed validation, using geometric fallback"
                );
                Ok(SelectionResult {
                    scan_id,
                    verdict: ScanVerdict::Fallback,
                    quad: candidate.quad,
                    card: candidate.card,
                    identifier,
                    confidence,
                    was_validated: false,
                    candidates: reports,
                })
            }
            Terminal::Fatal(reason) => {
                warn!(%reason, "No usable card outline");
                Err(ScanError::NoQuadrilateralFound(reason))
            }
        }
    }

    /// One transition out of `Searching`.
    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &self,
        quad: &Quadrilateral,
        index: usize,
        fallback: Option<Retained>,
        source: &RgbImage,
        scale: f32,
        recognizer: &dyn TextRecognizer,
        reports: &mut Vec<CandidateReport>,
    ) -> SelectionState {
        let next = index + 1;
        let report = |corners: Option<OrderedQuad>, outcome: CandidateOutcome| CandidateReport {
            rank: quad.rank,
            area: quad.area,
            corners,
            outcome,
        };

        let candidate = match self.normalizer.normalize(source, &quad.points, scale) {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(rank = quad.rank, error = %err, "Candidate geometry rejected");
                let corners = order_corners(&quad.points).ok().map(|q| q.scaled(scale));
                reports.push(report(
                    corners,
                    CandidateOutcome::GeometryFailed {
                        reason: err.to_string(),
                    },
                ));
                return SelectionState::Searching { next, fallback };
            }
        };
        debug!(rank = quad.rank, "Candidate normalized");

        match self.validator.validate(&candidate.card, recognizer) {
            Ok(validation) if validation.passed => {
                reports.push(report(
                    Some(candidate.quad),
                    CandidateOutcome::Accepted {
                        digits: validation.identifier.clone(),
                        confidence: validation.confidence,
                        strategy: validation.strategy.clone(),
                    },
                ));
                SelectionState::Done(Terminal::Accepted {
                    candidate,
                    validation,
                })
            }
            Ok(validation) => {
                info!(
                    rank = quad.rank,
                    digits = validation.identifier.len(),
                    "Candidate failed the identifier gate"
                );
                reports.push(report(
                    Some(candidate.quad),
                    CandidateOutcome::GateFailed {
                        digits: validation.identifier.clone(),
                        confidence: validation.confidence,
                        strategy: validation.strategy.clone(),
                    },
                ));
                SelectionState::Searching {
                    next,
                    fallback: fallback.or(Some(Retained {
                        candidate,
                        validation: Some(validation),
                    })),
                }
            }
            Err(err) => {
                warn!(rank = quad.rank, error = %err, "Candidate could not be read");
                reports.push(report(
                    Some(candidate.quad),
                    CandidateOutcome::OcrFailed {
                        reason: err.to_string(),
                    },
                ));
                SelectionState::Searching {
                    next,
                    fallback: fallback.or(Some(Retained {
                        candidate,
                        validation: None,
                    })),
                }
            }
        }
    }
}
