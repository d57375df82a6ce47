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

//! Value comparison and comparison keys
//!
//! Comparisons are three-valued: NULL on either side and incommensurable
//! pairs yield UNKNOWN. Comparison keys are byte serializations of value
//! tuples chosen so values the engine treats as equal serialize
//! identically; they back GROUP BY, DISTINCT and the set operations.

use std::cmp::Ordering;

use super::ternary::Ternary;
use super::value::{format_float, Value};

/// Compare two values for ordering. Returns None when either side is NULL
/// or the pair has no common comparable type. Numeric comparison widens to
/// float; string comparison trims spaces and honors `ignore_case`.
pub fn compare(a: &Value, b: &Value, ignore_case: bool) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }

    if let (Some(x), Some(y)) = (a.as_float(), b.as_float()) {
        return x.partial_cmp(&y);
    }

    if datetime_candidate(a) && datetime_candidate(b) {
        if let (Value::Datetime(x), Value::Datetime(y)) =
            (a.to_datetime(&[]), b.to_datetime(&[]))
        {
            return Some(x.cmp(&y));
        }
    }

    if let (Value::Boolean(x), Value::Boolean(y)) = (a.to_boolean(), b.to_boolean()) {
        return Some(x.cmp(&y));
    }

    if let (Value::String(x), Value::String(y)) = (a, b) {
        let x = x.trim();
        let y = y.trim();
        return if ignore_case {
            Some(x.to_uppercase().cmp(&y.to_uppercase()))
        } else {
            Some(x.cmp(y))
        };
    }

    None
}

fn datetime_candidate(v: &Value) -> bool {
    matches!(v, Value::Datetime(_) | Value::String(_))
}

/// `=` with ternary result
pub fn equal(a: &Value, b: &Value, ignore_case: bool) -> Ternary {
    match compare(a, b, ignore_case) {
        Some(ord) => Ternary::of(ord == Ordering::Equal),
        None => Ternary::Unknown,
    }
}

/// `<>` with ternary result
pub fn not_equal(a: &Value, b: &Value, ignore_case: bool) -> Ternary {
    equal(a, b, ignore_case).not()
}

/// `<` with ternary result
pub fn less_than(a: &Value, b: &Value, ignore_case: bool) -> Ternary {
    match compare(a, b, ignore_case) {
        Some(ord) => Ternary::of(ord == Ordering::Less),
        None => Ternary::Unknown,
    }
}

/// `<=` with ternary result
pub fn less_than_or_equal(a: &Value, b: &Value, ignore_case: bool) -> Ternary {
    match compare(a, b, ignore_case) {
        Some(ord) => Ternary::of(ord != Ordering::Greater),
        None => Ternary::Unknown,
    }
}

/// `>` with ternary result
pub fn greater_than(a: &Value, b: &Value, ignore_case: bool) -> Ternary {
    match compare(a, b, ignore_case) {
        Some(ord) => Ternary::of(ord == Ordering::Greater),
        None => Ternary::Unknown,
    }
}

/// `>=` with ternary result
pub fn greater_than_or_equal(a: &Value, b: &Value, ignore_case: bool) -> Ternary {
    match compare(a, b, ignore_case) {
        Some(ord) => Ternary::of(ord != Ordering::Less),
        None => Ternary::Unknown,
    }
}

/// The `==` identical operator: type and value must both match. Two NULLs
/// are identical; NULL against anything else is not. Never UNKNOWN.
pub fn identical(a: &Value, b: &Value) -> Ternary {
    let same = match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Ternary(x), Value::Ternary(y)) => x == y,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Datetime(x), Value::Datetime(y)) => x == y,
        _ => false,
    };
    Ternary::of(same)
}

// =============================================================================
// Comparison keys
// =============================================================================

/// Serialize one value into `buf`. The encoding bridges representations the
/// engine compares as equal: integer-shaped values of every type land on
/// the `[I]` form, 0/1 carry a `[B]` marker so booleans join them, and
/// integral floats collapse to integers.
pub fn serialize_key(buf: &mut String, value: &Value) {
    if let Some(i) = value.strict_integer() {
        serialize_integer(buf, i);
        return;
    }

    if let Some(f) = value.as_float() {
        if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
            serialize_integer(buf, f as i64);
        } else {
            buf.push_str("[F]");
            buf.push_str(&format_float(f));
        }
        return;
    }

    if datetime_candidate(value) {
        if let Value::Datetime(dt) = value.to_datetime(&[]) {
            buf.push_str("[D]");
            buf.push_str(&dt.timestamp().to_string());
            buf.push('.');
            buf.push_str(&format!("{:09}", dt.timestamp_subsec_nanos()));
            return;
        }
    }

    match value.to_boolean() {
        Value::Boolean(true) => {
            serialize_integer(buf, 1);
            return;
        }
        Value::Boolean(false) => {
            serialize_integer(buf, 0);
            return;
        }
        _ => {}
    }

    match value {
        Value::String(s) => {
            buf.push_str("[S]");
            buf.push_str(&s.trim().to_uppercase());
        }
        _ => buf.push_str("[N]"),
    }
}

fn serialize_integer(buf: &mut String, i: i64) {
    buf.push_str("[I]");
    buf.push_str(&i.to_string());
    match i {
        0 => buf.push_str("[B]false"),
        1 => buf.push_str("[B]true"),
        _ => {}
    }
}

/// Serialize a tuple of values, `:`-joined
pub fn serialize_comparison_keys(buf: &mut String, values: &[Value]) {
    for (i, v) in values.iter().enumerate() {
        if 0 < i {
            buf.push(':');
        }
        serialize_key(buf, v);
    }
}

/// Convenience wrapper returning the key of a value tuple
pub fn comparison_key(values: &[Value]) -> String {
    let mut buf = String::new();
    serialize_comparison_keys(&mut buf, values);
    buf
}

/// First-occurrence dedup of a value list by comparison key. Used by
/// DISTINCT aggregate arguments.
pub fn distinguish(values: Vec<Value>) -> Vec<Value> {
    let mut seen = rustc_hash::FxHashSet::default();
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        let mut key = String::new();
        serialize_key(&mut key, &v);
        if seen.insert(key) {
            out.push(v);
        }
    }
    out
}
