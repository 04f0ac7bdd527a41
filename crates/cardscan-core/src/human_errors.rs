// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable messages for the fatal scan errors.
//
// Every error a caller can see is mapped to plain English with a clear suggestion
// about how to retake the photo or fix the input.

use crate::error::ScanError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something on the machine went wrong; trying again may work.
    Transient,
    /// The user must change something (retake the photo, fix a path or config).
    ActionRequired,
    /// The input can never be processed as given.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether running the same command again could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert a `ScanError` into a `HumanError`.
pub fn humanize_error(err: &ScanError) -> HumanError {
    match err {
        ScanError::ImageLoad(_) => HumanError {
            message: "This file isn't a readable photo.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanError::NoQuadrilateralFound(_) => HumanError {
            message: "We couldn't find the card in this photo.".into(),
            suggestion: "Place the card on a plain, contrasting surface so all four corners are visible and well-lit, then take the photo again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanError::InvalidConfig(detail) => HumanError {
            message: "The scan settings aren't usable.".into(),
            suggestion: format!("Fix the configuration file and try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanError::Encode(_) => HumanError {
            message: "The processed card couldn't be saved as an image.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "The file couldn't be found.".into(),
                suggestion: "Check the path and try again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "We don't have permission to use that file or folder.".into(),
                suggestion: "Check the permissions, or choose a different output folder.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "There was a problem reading or writing a file.".into(),
                suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        ScanError::Serialization(_) => HumanError {
            message: "A settings or result file isn't valid JSON.".into(),
            suggestion: "Check the file contents and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}
