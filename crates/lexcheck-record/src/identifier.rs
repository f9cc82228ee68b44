//! Identifier canonicalization
//!
//! Record identifiers are non-negative decimals rendered with exactly
//! [`FRACTION_DIGITS`] fractional digits (`7.00023`). Parsing is exact
//! decimal arithmetic on the input text: no binary floating point is
//! involved, so `0.1` stays `0.10000` and rounding is half-to-even on the
//! written digits.
//!
//! The permissive policy accepts any non-negative decimal and re-renders it,
//! which means the five-digit pattern check can never reject a value that
//! parsed. [`IdPolicy::Strict`] closes that gap by requiring the raw text to
//! already carry five fractional digits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fractional digits in a canonical identifier
pub const FRACTION_DIGITS: usize = 5;

/// Exponents beyond this magnitude are rejected rather than expanded
const MAX_EXPONENT: i64 = 308;

static CANONICAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d{5}$").expect("canonical id regex must compile"));

/// Identifier parse failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdFormatError {
    /// Empty or whitespace-only value
    #[error("missing Id")]
    Empty,

    /// Not a decimal number
    #[error("invalid Id format: '{value}' is not numeric")]
    NotNumeric { value: String },

    /// Negative number
    #[error("invalid Id format: '{value}' is negative")]
    Negative { value: String },

    /// Exponent too large to expand
    #[error("invalid Id format: exponent of '{value}' out of range")]
    ExponentOutOfRange { value: String },

    /// Strict policy: input did not carry exactly five fractional digits
    #[error("invalid Id format: '{value}' must have exactly {FRACTION_DIGITS} fractional digits")]
    FractionDigits { value: String },

    /// Rendered form does not match the canonical pattern
    #[error("invalid Id format: '{value}' does not render to a canonical identifier")]
    PatternMismatch { value: String },
}

/// Canonical identifier (`digits.ddddd`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Artifact file name (`{id}.txt`)
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.0)
    }

    /// Content store key under `prefix` (`{prefix}/{id}.txt`)
    #[inline]
    #[must_use]
    pub fn content_key(&self, prefix: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            self.file_name()
        } else {
            format!("{prefix}/{}", self.file_name())
        }
    }

    /// Check if text is already in canonical form
    #[inline]
    #[must_use]
    pub fn is_canonical(text: &str) -> bool {
        CANONICAL_PATTERN.is_match(text)
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CanonicalId {
    type Err = IdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id(s)
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = IdFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_id(&value)
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

/// How strictly raw identifiers are checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdPolicy {
    /// Any non-negative decimal, re-rendered to five digits
    #[default]
    Permissive,
    /// Raw text must already be `digits.ddddd`
    Strict,
}

impl IdPolicy {
    /// Canonicalize a raw identifier under this policy
    ///
    /// # Errors
    /// Returns `IdFormatError` when the value is rejected.
    pub fn canonicalize(self, value: &str) -> Result<CanonicalId, IdFormatError> {
        if self == IdPolicy::Strict && !CanonicalId::is_canonical(value.trim()) {
            if value.trim().is_empty() {
                return Err(IdFormatError::Empty);
            }
            // Surface non-numeric input as such, even in strict mode
            Decimal::parse(value)?;
            return Err(IdFormatError::FractionDigits {
                value: value.to_string(),
            });
        }
        parse_id(value)
    }
}

/// Parse and canonicalize an identifier
///
/// Idempotent: `parse_id(parse_id(s)?.as_str()) == parse_id(s)`.
///
/// # Errors
/// Returns `IdFormatError` for empty, non-numeric or negative input.
pub fn parse_id(value: &str) -> Result<CanonicalId, IdFormatError> {
    let rendered = Decimal::parse(value)?.render_fixed(FRACTION_DIGITS);

    // Cannot fail for anything that parsed; kept as the final gate.
    if !CanonicalId::is_canonical(&rendered) {
        return Err(IdFormatError::PatternMismatch {
            value: value.to_string(),
        });
    }

    Ok(CanonicalId(rendered))
}

/// Exact non-negative decimal as digit vectors
#[derive(Debug, Clone, PartialEq, Eq)]
struct Decimal {
    int: Vec<u8>,
    frac: Vec<u8>,
}

impl Decimal {
    fn parse(value: &str) -> Result<Self, IdFormatError> {
        let text = value.trim();
        if text.is_empty() {
            return Err(IdFormatError::Empty);
        }
        let not_numeric = || IdFormatError::NotNumeric {
            value: value.to_string(),
        };

        let unsigned = match text.as_bytes()[0] {
            b'-' => {
                return Err(IdFormatError::Negative {
                    value: value.to_string(),
                })
            }
            b'+' => &text[1..],
            _ => text,
        };

        let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
            Some(pos) => {
                let exponent = parse_exponent(&unsigned[pos + 1..]).ok_or_else(not_numeric)?;
                if exponent.abs() > MAX_EXPONENT {
                    return Err(IdFormatError::ExponentOutOfRange {
                        value: value.to_string(),
                    });
                }
                (&unsigned[..pos], exponent)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(not_numeric());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(not_numeric());
        }

        let digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();

        // Position of the decimal point within `digits` after applying the exponent
        let point = i64::try_from(int_part.len()).map_err(|_| not_numeric())? + exponent;
        let len = i64::try_from(digits.len()).map_err(|_| not_numeric())?;

        let (int, frac) = if point <= 0 {
            let mut frac = vec![0u8; usize::try_from(-point).unwrap_or(0)];
            frac.extend_from_slice(&digits);
            (Vec::new(), frac)
        } else if point >= len {
            let mut int = digits;
            int.resize(usize::try_from(point).unwrap_or(0), 0);
            (int, Vec::new())
        } else {
            let split = usize::try_from(point).unwrap_or(0);
            (digits[..split].to_vec(), digits[split..].to_vec())
        };

        Ok(Self { int, frac })
    }

    /// Render with exactly `places` fractional digits, rounding half-to-even
    fn render_fixed(&self, places: usize) -> String {
        let mut kept: Vec<u8> = self.int.clone();
        kept.extend(self.frac.iter().take(places));
        kept.resize(self.int.len() + places, 0);

        let rest = self.frac.get(places..).unwrap_or(&[]);
        if round_up(rest, kept.last().copied()) {
            increment(&mut kept);
        }

        let int_len = kept.len() - places;
        let (int, frac) = kept.split_at(int_len);

        let int_text: String = int
            .iter()
            .skip_while(|&&d| d == 0)
            .map(|d| char::from(b'0' + d))
            .collect();
        let frac_text: String = frac.iter().map(|d| char::from(b'0' + d)).collect();

        let int_text = if int_text.is_empty() { "0".to_string() } else { int_text };
        format!("{int_text}.{frac_text}")
    }
}

fn parse_exponent(text: &str) -> Option<i64> {
    let digits = text.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Saturate huge exponents so the range check rejects them
    text.parse::<i64>().ok().or(Some(if text.starts_with('-') {
        i64::MIN / 2
    } else {
        i64::MAX / 2
    }))
}

fn round_up(rest: &[u8], last_kept: Option<u8>) -> bool {
    match rest.split_first() {
        None => false,
        Some((&first, tail)) if first == 5 => {
            tail.iter().any(|&d| d != 0) || last_kept.is_some_and(|d| d % 2 == 1)
        }
        Some((&first, _)) => first > 5,
    }
}

fn increment(digits: &mut Vec<u8>) {
    for digit in digits.iter_mut().rev() {
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
    digits.insert(0, 1);
}
