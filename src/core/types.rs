//! Scalar codecs shared by schema nodes.
//!
//! Every type knows how to check the text form of a value, turn it into a
//! [`Value`] and back. `Pattern` and `Range` wrap a base type and only
//! narrow what is accepted; decoding and encoding go through the base.

use crate::core::value::Value;
use crate::utils::error::{ModelError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use std::fmt;

#[derive(Clone)]
pub enum ScalarType {
    Bool,
    Int,
    Double,
    Str,
    Timestamp,
    Pattern {
        base: Box<ScalarType>,
        source: String,
        regex: Regex,
    },
    Range {
        base: Box<ScalarType>,
        min: Option<Value>,
        max: Option<Value>,
    },
}

impl ScalarType {
    /// The regex has to match the whole text, not a prefix.
    pub fn pattern(base: ScalarType, pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            ModelError::InvalidConfigValueError {
                field: "pattern".to_string(),
                value: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(ScalarType::Pattern {
            base: Box::new(base),
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn range(base: ScalarType, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        Self::bounded(base, Some(min.into()), Some(max.into()))
    }

    /// A missing bound leaves that side open.
    pub fn bounded(base: ScalarType, min: Option<Value>, max: Option<Value>) -> Self {
        ScalarType::Range {
            base: Box::new(base),
            min,
            max,
        }
    }

    /// The part of `text` the type looks at: surrounding whitespace is
    /// ignored by every kind except `Str`.
    fn lexical<'t>(&self, text: &'t str) -> &'t str {
        match self {
            ScalarType::Str => text,
            ScalarType::Pattern { base, .. } | ScalarType::Range { base, .. } => base.lexical(text),
            _ => text.trim(),
        }
    }

    pub fn validate(&self, text: &str) -> bool {
        match self {
            ScalarType::Bool => matches!(text.trim(), "true" | "false"),
            ScalarType::Int => text.trim().parse::<i64>().is_ok(),
            ScalarType::Double => text.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
            ScalarType::Str => true,
            ScalarType::Timestamp => parse_timestamp(text).is_some(),
            ScalarType::Pattern { base, regex, .. } => base.validate(text) && regex.is_match(self.lexical(text)),
            ScalarType::Range { base, min, max } => {
                if !base.validate(text) {
                    return false;
                }
                match base.decode(text) {
                    Ok(value) => in_range(&value, min, max),
                    Err(_) => false,
                }
            }
        }
    }

    pub fn decode(&self, text: &str) -> Result<Value> {
        let invalid = || ModelError::InvalidValue {
            tag: self.to_string(),
            text: text.to_string(),
        };
        match self {
            ScalarType::Bool => match text.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            ScalarType::Int => text.trim().parse::<i64>().map(Value::Int).map_err(|_| invalid()),
            ScalarType::Double => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Value::Double)
                .ok_or_else(invalid),
            ScalarType::Str => Ok(Value::Str(text.to_string())),
            ScalarType::Timestamp => parse_timestamp(text).map(Value::Timestamp).ok_or_else(invalid),
            ScalarType::Pattern { base, .. } | ScalarType::Range { base, .. } => base.decode(text),
        }
    }

    pub fn encode(&self, value: &Value) -> Result<String> {
        let mismatch = || ModelError::InvalidValue {
            tag: self.to_string(),
            text: value.to_string(),
        };
        match (self, value) {
            (ScalarType::Bool, Value::Bool(b)) => Ok(if *b { "true" } else { "false" }.to_string()),
            (ScalarType::Int, Value::Int(i)) => Ok(i.to_string()),
            (ScalarType::Double, Value::Double(d)) => Ok(format_double(*d)),
            (ScalarType::Double, Value::Int(i)) => Ok(format_double(*i as f64)),
            (ScalarType::Str, Value::Str(s)) => Ok(s.clone()),
            (ScalarType::Timestamp, Value::Timestamp(t)) if is_representable(t) => Ok(format_timestamp(t)),
            (ScalarType::Pattern { base, .. }, _) | (ScalarType::Range { base, .. }, _) => base.encode(value),
            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::Int => write!(f, "int"),
            ScalarType::Double => write!(f, "double"),
            ScalarType::Str => write!(f, "string"),
            ScalarType::Timestamp => write!(f, "timestamp"),
            ScalarType::Pattern { base, source, .. } => write!(f, "{}/{}/", base, source),
            ScalarType::Range { base, min, max } => {
                write!(f, "{}[", base)?;
                if let Some(min) = min {
                    write!(f, "{}", min)?;
                }
                write!(f, "..")?;
                if let Some(max) = max {
                    write!(f, "{}", max)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Debug for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarType({})", self)
    }
}

fn in_range(value: &Value, min: &Option<Value>, max: &Option<Value>) -> bool {
    let above = min
        .as_ref()
        .map_or(true, |min| value.compare(min).is_some_and(|o| o.is_ge()));
    let below = max
        .as_ref()
        .map_or(true, |max| value.compare(max).is_some_and(|o| o.is_le()));
    above && below
}

fn format_double(d: f64) -> String {
    // Debug keeps a trailing ".0" on whole numbers and round-trips exactly.
    format!("{:?}", d)
}

/// ISO-8601 profile: RFC 3339 with an offset, a naive date-time taken as
/// UTC, or a bare date at midnight UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Four-digit years only; RFC 3339 has no form for the others.
pub fn is_representable(t: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&t.year())
}

/// Fractional seconds are written only when present, with as many digits
/// as needed to keep the value exact.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
