// Copyright 2026 Flatsql Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime value type
//!
//! A unified Value enum representing the scalars the engine operates on.
//! Explicit conversions return `Value::Null` on failure instead of
//! erroring; predicates over values collapse to [`Ternary`].
//!
//! Note: String uses Arc<str> for cheap cloning during record operations.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::ternary::Ternary;

/// Datetime formats tried when casting a string, after any formats the
/// session configures. Order matters, more specific formats first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z", // RFC3339 with fractional seconds
    "%Y-%m-%dT%H:%M:%S%:z",    // RFC3339
    "%Y-%m-%dT%H:%M:%S%.fZ",   // RFC3339 UTC, fractional
    "%Y-%m-%dT%H:%M:%SZ",      // RFC3339 UTC
    "%Y-%m-%dT%H:%M:%S%.f",    // ISO without timezone
    "%Y-%m-%dT%H:%M:%S",       // ISO without timezone
    "%Y-%m-%d %H:%M:%S%.f",    // SQL-style with fractional seconds
    "%Y-%m-%d %H:%M:%S",       // SQL-style
    "%Y/%m/%d %H:%M:%S",       // alternative with slashes
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Arithmetic operators understood by [`Value::calculate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

/// A runtime scalar with type information
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL
    Null,

    /// Two-valued boolean
    Boolean(bool),

    /// Three-valued truth value, the result type of every predicate
    Ternary(Ternary),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 text (Arc for cheap cloning)
    String(Arc<str>),

    /// Timestamp (UTC)
    Datetime(DateTime<Utc>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a text value
    pub fn text(value: impl AsRef<str>) -> Self {
        Value::String(Arc::from(value.as_ref()))
    }

    /// Create a text value from Arc<str> (zero-copy)
    pub fn text_arc(value: Arc<str>) -> Self {
        Value::String(value)
    }

    /// Build a numeric value from a float, collapsing integral results to
    /// Integer. Non-finite results become Null.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            Value::Null
        } else if value.fract() == 0.0 && value.abs() < (i64::MAX as f64) {
            Value::Integer(value as i64)
        } else {
            Value::Float(value)
        }
    }

    /// Build a value from a decoded field of a source file. Fields are
    /// untyped text; the empty-field-to-NULL decision belongs to the codec.
    pub fn from_field(raw: &str) -> Self {
        Value::text(raw)
    }

    // =========================================================================
    // Type tests
    // =========================================================================

    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for the UNKNOWN truth value, which renders as an
    /// empty field in every output format
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Ternary(Ternary::Unknown))
    }

    // =========================================================================
    // Ternary projection
    // =========================================================================

    /// Truth value of this scalar. NULL and non-truthlike values are
    /// UNKNOWN; integers and floats map 1 to TRUE and 0 to FALSE.
    pub fn ternary(&self) -> Ternary {
        match self {
            Value::Null => Ternary::Unknown,
            Value::Boolean(b) => Ternary::of(*b),
            Value::Ternary(t) => *t,
            Value::Integer(1) => Ternary::True,
            Value::Integer(0) => Ternary::False,
            Value::Integer(_) => Ternary::Unknown,
            Value::Float(f) if *f == 1.0 => Ternary::True,
            Value::Float(f) if *f == 0.0 => Ternary::False,
            Value::Float(_) => Ternary::Unknown,
            Value::String(s) => Ternary::parse(s).unwrap_or(Ternary::Unknown),
            Value::Datetime(_) => Ternary::Unknown,
        }
    }

    // =========================================================================
    // Conversions (Null on failure)
    // =========================================================================

    /// Convert to Boolean. UNKNOWN and unconvertible values yield Null.
    pub fn to_boolean(&self) -> Value {
        match self {
            Value::Boolean(_) => self.clone(),
            Value::Ternary(t) => t.as_bool().map(Value::Boolean).unwrap_or(Value::Null),
            Value::Integer(1) | Value::Integer(0) => {
                Value::Boolean(matches!(self, Value::Integer(1)))
            }
            Value::Float(f) if *f == 1.0 || *f == 0.0 => Value::Boolean(*f == 1.0),
            Value::String(s) => match Ternary::parse(s).and_then(Ternary::as_bool) {
                Some(b) => Value::Boolean(b),
                None => Value::Null,
            },
            _ => Value::Null,
        }
    }

    /// Convert to Integer. Integral floats and integer-shaped strings
    /// convert; everything else yields Null.
    pub fn to_integer(&self) -> Value {
        match self {
            Value::Integer(_) => self.clone(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Value::Integer(*f as i64),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Value::Integer(i)
                } else if let Some(f) = parse_float_str(s) {
                    if f.fract() == 0.0 {
                        Value::Integer(f as i64)
                    } else {
                        Value::Null
                    }
                } else {
                    Value::Null
                }
            }
            _ => Value::Null,
        }
    }

    /// Integer extraction that does not cross the integer/float boundary:
    /// only Integer values and integer-literal strings qualify. Used by
    /// the comparison-key serializer.
    pub fn strict_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Convert to Float
    pub fn to_float(&self) -> Value {
        match self.as_float() {
            Some(f) => Value::Float(f),
            None => Value::Null,
        }
    }

    /// Extract as f64 with numeric widening
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => parse_float_str(s.trim()),
            _ => None,
        }
    }

    /// Extract as i64 if this value converts to an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self.to_integer() {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Extract the raw text of a String value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to String. NULL stays NULL.
    pub fn to_string_value(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::String(_) => self.clone(),
            other => Value::text(other.serialize()),
        }
    }

    /// Convert to Datetime, trying the configured formats first and the
    /// built-in RFC3339/SQL formats after.
    pub fn to_datetime(&self, formats: &[String]) -> Value {
        match self {
            Value::Datetime(_) => self.clone(),
            Value::String(s) => parse_datetime_str(s.trim(), formats)
                .map(Value::Datetime)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Convert to a Ternary value. Unlike [`Value::ternary`], plain
    /// NULL stays NULL so the cast is distinguishable from UNKNOWN input.
    pub fn to_ternary(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            other => Value::Ternary(other.ternary()),
        }
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Arithmetic over two values. Any NULL or non-numeric operand and any
    /// non-finite result (division by zero) yield Null. Integral results
    /// collapse to Integer.
    pub fn calculate(lhs: &Value, rhs: &Value, op: ArithmeticOp) -> Value {
        let (a, b) = match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Value::Null,
        };

        let result = match op {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Subtract => a - b,
            ArithmeticOp::Multiply => a * b,
            ArithmeticOp::Divide => a / b,
            ArithmeticOp::Modulo => a % b,
        };
        Value::from_f64(result)
    }

    /// String concatenation. NULL in any operand yields Null.
    pub fn concat(values: &[Value]) -> Value {
        let mut out = String::new();
        for v in values {
            match v.to_string_value() {
                Value::String(s) => out.push_str(&s),
                _ => return Value::Null,
            }
        }
        Value::text(out)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Canonical text form used for display, LISTAGG and string casts.
    /// NULL serializes as the empty string.
    pub fn serialize(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Ternary(t) => t.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.to_string(),
            Value::Datetime(dt) => dt.to_rfc3339(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.serialize()),
        }
    }
}

/// Canonical float formatting: shortest form that round-trips, integral
/// floats render without a fractional part.
pub fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

fn parse_float_str(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    // Reject the textual inf/NaN spellings the std parser accepts.
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_datetime_str(s: &str, configured: &[String]) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    for fmt in configured {
        if let Some(dt) = parse_with_format(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Some(dt) = parse_with_format(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            let dt = d.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

fn parse_with_format(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ternary_projection() {
        assert_eq!(Value::Null.ternary(), Ternary::Unknown);
        assert_eq!(Value::Boolean(true).ternary(), Ternary::True);
        assert_eq!(Value::Integer(1).ternary(), Ternary::True);
        assert_eq!(Value::Integer(0).ternary(), Ternary::False);
        assert_eq!(Value::Integer(7).ternary(), Ternary::Unknown);
        assert_eq!(Value::text("true").ternary(), Ternary::True);
        assert_eq!(Value::text("unknown").ternary(), Ternary::Unknown);
        assert_eq!(Value::text("giraffe").ternary(), Ternary::Unknown);
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(Value::text(" 42 ").to_integer(), Value::Integer(42));
        assert_eq!(Value::Float(3.0).to_integer(), Value::Integer(3));
        assert_eq!(Value::Float(3.5).to_integer(), Value::Null);
        assert_eq!(Value::text("1e2").to_integer(), Value::Integer(100));
        assert_eq!(Value::text("abc").to_integer(), Value::Null);
        assert_eq!(Value::Null.to_integer(), Value::Null);
    }

    #[test]
    fn test_strict_integer() {
        assert_eq!(Value::Integer(5).strict_integer(), Some(5));
        assert_eq!(Value::text("5").strict_integer(), Some(5));
        assert_eq!(Value::Float(5.0).strict_integer(), None);
        assert_eq!(Value::text("5.0").strict_integer(), None);
    }

    #[test]
    fn test_to_float_rejects_inf_spellings() {
        assert_eq!(Value::text("inf").to_float(), Value::Null);
        assert_eq!(Value::text("NaN").to_float(), Value::Null);
        assert_eq!(Value::text("-1.25").to_float(), Value::Float(-1.25));
    }

    #[test]
    fn test_to_boolean() {
        assert_eq!(Value::text("true").to_boolean(), Value::Boolean(true));
        assert_eq!(Value::Integer(0).to_boolean(), Value::Boolean(false));
        assert_eq!(Value::Integer(2).to_boolean(), Value::Null);
        assert_eq!(
            Value::Ternary(Ternary::Unknown).to_boolean(),
            Value::Null
        );
    }

    #[test]
    fn test_to_datetime() {
        let v = Value::text("2024-03-01 12:30:00").to_datetime(&[]);
        match v {
            Value::Datetime(dt) => assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+00:00"),
            other => panic!("expected datetime, got {:?}", other),
        }
        assert_eq!(Value::text("not a date").to_datetime(&[]), Value::Null);
    }

    #[test]
    fn test_calculate() {
        assert_eq!(
            Value::calculate(&Value::Integer(2), &Value::Integer(3), ArithmeticOp::Add),
            Value::Integer(5)
        );
        assert_eq!(
            Value::calculate(&Value::Integer(3), &Value::Integer(2), ArithmeticOp::Divide),
            Value::Float(1.5)
        );
        assert_eq!(
            Value::calculate(&Value::Integer(4), &Value::Integer(2), ArithmeticOp::Divide),
            Value::Integer(2)
        );
        assert_eq!(
            Value::calculate(&Value::Integer(1), &Value::Integer(0), ArithmeticOp::Divide),
            Value::Null
        );
        assert_eq!(
            Value::calculate(&Value::Null, &Value::Integer(1), ArithmeticOp::Add),
            Value::Null
        );
    }

    #[test]
    fn test_concat() {
        assert_eq!(
            Value::concat(&[Value::text("a"), Value::Integer(1)]),
            Value::text("a1")
        );
        assert_eq!(
            Value::concat(&[Value::text("a"), Value::Null]),
            Value::Null
        );
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(Value::Float(2.0).serialize(), "2");
    }
}
