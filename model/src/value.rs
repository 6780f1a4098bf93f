use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::reference::Reference;

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("invalid double {0:?}")]
    InvalidDouble(String),
    #[error("invalid boolean {0:?}")]
    InvalidBoolean(String),
    #[error("invalid timestamp {0:?} (expected epoch milliseconds)")]
    InvalidTimestamp(String),
    #[error("invalid duration {0:?} (expected seconds)")]
    InvalidDuration(String),
    #[error("invalid symbol identification code {0:?}")]
    InvalidSymbolCode(String),
}

lazy_static! {
    // 15-position identification code, APP-6A style; '*' and '-' are the
    // unset-position fillers.
    static ref SYMBOL_CODE: Regex = Regex::new(r"^[A-Za-z0-9*-]{15}$").unwrap();
}

/// A 15-character military symbol identification code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolCode(String);

impl SymbolCode {
    pub fn parse(source: &str) -> Result<Self, ValueError> {
        if SYMBOL_CODE.is_match(source) {
            Ok(Self(source.to_string()))
        } else {
            Err(ValueError::InvalidSymbolCode(source.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SymbolCode {
    fn default() -> Self {
        Self("*".repeat(15))
    }
}

impl fmt::Display for SymbolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The payload of a leaf node. The concrete representation follows the
/// node's declared type: timestamps are epoch milliseconds, durations are
/// seconds.
#[derive(Clone, Debug, PartialEq)]
pub enum SimpleValue {
    Double(f64),
    String(String),
    Boolean(bool),
    Timestamp(i64),
    Duration(f64),
    Point { lat: f64, lon: f64 },
    Reference(Reference),
    SymbolCode(SymbolCode),
}

impl SimpleValue {
    /// Whether `other` holds the same kind of payload; `set_value` refuses
    /// cross-kind writes.
    pub fn same_kind(&self, other: &SimpleValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The canonical lexical form, as emitted by the exporter. Points,
    /// references and symbol codes serialize structurally, not through
    /// this.
    pub fn lexical(&self) -> String {
        match self {
            Self::Double(v) => format_double(*v),
            Self::String(v) => v.clone(),
            Self::Boolean(v) => v.to_string(),
            Self::Timestamp(v) => v.to_string(),
            Self::Duration(v) => format_double(*v),
            Self::Point { .. } | Self::Reference(_) | Self::SymbolCode(_) => {
                unreachable!("structural values have no single lexical form")
            }
        }
    }
}

fn format_double(v: f64) -> String {
    // Keep integral doubles readable; "0" round-trips just as well as "0.0".
    if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

pub fn parse_double(source: &str) -> Result<f64, ValueError> {
    source
        .trim()
        .parse::<f64>()
        .map_err(|_| ValueError::InvalidDouble(source.to_string()))
}

pub fn parse_boolean(source: &str) -> Result<bool, ValueError> {
    match source.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ValueError::InvalidBoolean(other.to_string())),
    }
}

pub fn parse_timestamp(source: &str) -> Result<i64, ValueError> {
    source
        .trim()
        .parse::<i64>()
        .map_err(|_| ValueError::InvalidTimestamp(source.to_string()))
}

pub fn parse_duration(source: &str) -> Result<f64, ValueError> {
    source
        .trim()
        .parse::<f64>()
        .map_err(|_| ValueError::InvalidDuration(source.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_code_accepts_fillers() {
        assert!(SymbolCode::parse("SFGPUCI--------").is_ok());
        assert!(SymbolCode::parse("***************").is_ok());
    }

    #[test]
    fn symbol_code_rejects_wrong_length_and_alphabet() {
        assert!(SymbolCode::parse("SFGP").is_err());
        assert!(SymbolCode::parse("SFGPUCI------- ").is_err());
        assert!(SymbolCode::parse("SFGPUCI--------X").is_err());
    }

    #[test]
    fn boolean_accepts_both_lexical_forms() {
        assert_eq!(parse_boolean("true").unwrap(), true);
        assert_eq!(parse_boolean("0").unwrap(), false);
        assert!(parse_boolean("yes").is_err());
    }

    #[test]
    fn numeric_forms_are_trimmed() {
        assert_eq!(parse_double(" 3.25 ").unwrap(), 3.25);
        assert_eq!(parse_timestamp("1136073600000").unwrap(), 1_136_073_600_000);
        assert!(parse_timestamp("2006-01-01").is_err());
    }

    #[test]
    fn same_kind_distinguishes_variants() {
        assert!(SimpleValue::Double(1.0).same_kind(&SimpleValue::Double(2.0)));
        assert!(!SimpleValue::Double(1.0).same_kind(&SimpleValue::Duration(1.0)));
    }
}
