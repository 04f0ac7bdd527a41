// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printed card identifier: digit-glyph normalization, the length gate, and the
// structural confidence score over the `CYYMMDDRR...` layout.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Characters the OCR whitelist strategy is allowed to return: ASCII,
/// Arabic-Indic, and Eastern Arabic digits.
pub const DIGIT_WHITELIST: &str = "0123456789٠١٢٣٤٥٦٧٨٩۰۱۲۳۴۵۶۷۸۹";

/// Length of a complete identifier.
pub const FULL_IDENTIFIER_LEN: usize = 14;

/// Two-digit region codes that appear at positions 7..9.
pub const VALID_REGION_CODES: [&str; 28] = [
    "01", "02", "03", "04", // metropolitan governorates
    "11", "12", "13", "14", "15", "16", "17", "18", "19", // delta
    "21", "22", "23", "24", "25", "26", "27", "28", "29", // upper region
    "31", "32", "33", "34", "35", // frontier
    "88", // born abroad
];

// Score weights in hundredths so the sum is exact.
const CENTURY_POINTS: u32 = 10;
const MONTH_POINTS: u32 = 35;
const DAY_POINTS: u32 = 35;
const REGION_POINTS: u32 = 20;

/// Digits recovered from the identifier region. Always ASCII `0-9` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierString(String);

impl IdentifierString {
    /// Normalize raw OCR output: map Arabic-Indic and Eastern Arabic digits to
    /// ASCII and drop everything that is not a digit.
    pub fn from_ocr_text(text: &str) -> Self {
        Self(text.chars().filter_map(ascii_digit).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether enough digits were recovered to count as a real identifier.
    pub fn passes_gate(&self, min_digits: usize) -> bool {
        self.len() >= min_digits
    }

    /// Structural plausibility in `[0, 1]`; see [`confidence_score`].
    pub fn confidence(&self) -> f32 {
        confidence_score(&self.0)
    }

    /// Birth date encoded in the century, year, month, and day digits.
    ///
    /// `None` when the digits are missing or do not form a calendar date.
    pub fn birth_date(&self) -> Option<NaiveDate> {
        let digits = self.0.as_str();
        let century = match digits.get(0..1)? {
            "2" => 1900,
            "3" => 2000,
            _ => return None,
        };
        let year: i32 = digits.get(1..3)?.parse().ok()?;
        let month: u32 = digits.get(3..5)?.parse().ok()?;
        let day: u32 = digits.get(5..7)?.parse().ok()?;
        NaiveDate::from_ymd_opt(century + year, month, day)
    }

    /// Region code at positions 7..9, if it is one of [`VALID_REGION_CODES`].
    pub fn region_code(&self) -> Option<&str> {
        let code = self.0.get(7..9)?;
        VALID_REGION_CODES.contains(&code).then_some(code)
    }
}

impl std::fmt::Display for IdentifierString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn ascii_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        '\u{0660}'..='\u{0669}' => char::from_digit(c as u32 - 0x0660, 10),
        '\u{06F0}'..='\u{06F9}' => char::from_digit(c as u32 - 0x06F0, 10),
        _ => None,
    }
}

/// Additive plausibility score of a digit string.
///
/// Each check only applies when the string is long enough to contain its
/// substring. Empty strings and strings with any non-ASCII-digit character
/// score exactly `0.0`.
pub fn confidence_score(digits: &str) -> f32 {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return 0.0;
    }

    let mut points = 0u32;

    if matches!(digits.as_bytes()[0], b'2' | b'3') {
        points += CENTURY_POINTS;
    }

    if digits.len() >= 7 {
        if parse_in_range(&digits[3..5], 1..=12) {
            points += MONTH_POINTS;
        }
        if parse_in_range(&digits[5..7], 1..=31) {
            points += DAY_POINTS;
        }
    }

    if digits.len() >= 9 && VALID_REGION_CODES.contains(&&digits[7..9]) {
        points += REGION_POINTS;
    }

    (points as f32 / 100.0).clamp(0.0, 1.0)
}

fn parse_in_range(field: &str, range: std::ops::RangeInclusive<u32>) -> bool {
    field.parse::<u32>().is_ok_and(|value| range.contains(&value))
}
