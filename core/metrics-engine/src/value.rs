//! FILENAME: core/metrics-engine/src/value.rs
//! PURPOSE: Scalar cell values as returned by the query executor.
//! CONTEXT: Every pipeline stage goes through `CellValue::as_number` and
//! `CellValue::to_text`, so a value that is "not a number" in one stage is
//! not a number in all of them.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single cell of a query result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric projection. `None` plays the role of the NaN sentinel:
    /// nulls, empty text, non-numeric text and NaN itself all map to it.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Null => None,
            CellValue::Number(n) if n.is_nan() => None,
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => parse_numeric_text(s),
        }
    }

    /// String form used for substring matching and lexicographic comparison.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Null => Cow::Borrowed(""),
            CellValue::Number(n) => Cow::Owned(format_number(*n)),
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

// ============================================================================
// SERDE (plain JSON scalars)
// ============================================================================

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<RawScalar>::deserialize(deserializer)?;
        Ok(match raw {
            None => CellValue::Null,
            Some(RawScalar::Bool(b)) => CellValue::Number(if b { 1.0 } else { 0.0 }),
            Some(RawScalar::Number(n)) => CellValue::Number(n),
            Some(RawScalar::Text(s)) => CellValue::Text(s),
        })
    }
}

// ============================================================================
// COERCION HELPERS
// ============================================================================

/// Parses trimmed decimal text. Rust's float parser also accepts `inf` and
/// `nan`; those are not numeric text here, only the `Infinity` spelling is.
fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    match trimmed {
        "" => return None,
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    let has_letters = trimmed
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E');
    if has_letters {
        return None;
    }

    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn format_number(n: f64) -> String {
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    format!("{}", n)
}

/// Wrapper around f64 that implements Eq and Hash for use as HashMap keys.
/// NaN values are treated as equal to each other, and so are 0.0 and -0.0.
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}
