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

//! Sort values
//!
//! A SortValue is the typed sort key of one cell: values are bridged to a
//! common shape once (numbers to float, datetime-shaped strings to ticks,
//! strings case-folded per flags), so the comparator itself is cheap.
//! Sort-value vectors also answer equivalence, which backs
//! `LIMIT ... WITH TIES` and analytic rank peers.

use std::cmp::Ordering;

use crate::ast::{NullPosition, SortDirection};
use crate::core::Value;

/// Typed sort key of a single value
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Null,
    Number(f64),
    Datetime(i64),
    Boolean(bool),
    String(String),
}

impl SortValue {
    pub fn new(value: &Value, ignore_case: bool) -> SortValue {
        if value.is_null() {
            return SortValue::Null;
        }
        if let Some(f) = value.as_float() {
            return SortValue::Number(f);
        }
        if matches!(value, Value::Datetime(_) | Value::String(_)) {
            if let Value::Datetime(dt) = value.to_datetime(&[]) {
                return SortValue::Datetime(
                    dt.timestamp() * 1_000_000_000 + dt.timestamp_subsec_nanos() as i64,
                );
            }
        }
        match value.to_boolean() {
            Value::Boolean(b) => SortValue::Boolean(b),
            _ => match value {
                Value::String(s) => {
                    let t = s.trim();
                    SortValue::String(if ignore_case {
                        t.to_uppercase()
                    } else {
                        t.to_string()
                    })
                }
                _ => SortValue::Null,
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SortValue::Null)
    }

    /// Ordering against another key; None for incommensurable pairs,
    /// which sort as ties
    fn partial_cmp(&self, other: &SortValue) -> Option<Ordering> {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.partial_cmp(b),
            (SortValue::Datetime(a), SortValue::Datetime(b)) => Some(a.cmp(b)),
            (SortValue::Boolean(a), SortValue::Boolean(b)) => Some(a.cmp(b)),
            (SortValue::String(a), SortValue::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equivalence including NULL == NULL
    pub fn equivalent_to(&self, other: &SortValue) -> bool {
        match (self, other) {
            (SortValue::Null, SortValue::Null) => true,
            _ => self.partial_cmp(other) == Some(Ordering::Equal),
        }
    }
}

/// Compare two sort-value vectors under per-item directions and null
/// positions. NULLS FIRST sorts null before every value regardless of
/// direction.
pub fn compare_sort_values(
    a: &[SortValue],
    b: &[SortValue],
    directions: &[SortDirection],
    null_positions: &[NullPosition],
) -> Ordering {
    for i in 0..a.len().min(b.len()) {
        match (a[i].is_null(), b[i].is_null()) {
            (true, true) => continue,
            (true, false) => {
                return match null_positions[i] {
                    NullPosition::First => Ordering::Less,
                    NullPosition::Last => Ordering::Greater,
                }
            }
            (false, true) => {
                return match null_positions[i] {
                    NullPosition::First => Ordering::Greater,
                    NullPosition::Last => Ordering::Less,
                }
            }
            (false, false) => {}
        }
        match a[i].partial_cmp(&b[i]) {
            Some(Ordering::Equal) | None => continue,
            Some(ord) => {
                return if directions[i] == SortDirection::Descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    }
    Ordering::Equal
}

/// Whole-vector equivalence, for WITH TIES and rank peers
pub fn equivalent(a: &[SortValue], b: &[SortValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equivalent_to(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_bridging() {
        let a = SortValue::new(&Value::Integer(2), false);
        let b = SortValue::new(&Value::text("10"), false);
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_null_positions() {
        let null = vec![SortValue::Null];
        let one = vec![SortValue::Number(1.0)];
        let asc = [SortDirection::Ascending];

        assert_eq!(
            compare_sort_values(&null, &one, &asc, &[NullPosition::First]),
            Ordering::Less
        );
        assert_eq!(
            compare_sort_values(&null, &one, &asc, &[NullPosition::Last]),
            Ordering::Greater
        );
    }

    #[test]
    fn test_direction() {
        let a = vec![SortValue::Number(1.0)];
        let b = vec![SortValue::Number(2.0)];
        assert_eq!(
            compare_sort_values(&a, &b, &[SortDirection::Descending], &[NullPosition::Last]),
            Ordering::Greater
        );
    }

    #[test]
    fn test_multi_key_tiebreak() {
        let a = vec![SortValue::Number(1.0), SortValue::String("b".to_string())];
        let b = vec![SortValue::Number(1.0), SortValue::String("a".to_string())];
        let dirs = [SortDirection::Ascending, SortDirection::Ascending];
        let nulls = [NullPosition::First, NullPosition::First];
        assert_eq!(compare_sort_values(&a, &b, &dirs, &nulls), Ordering::Greater);
    }

    #[test]
    fn test_equivalence() {
        let a = vec![SortValue::Null, SortValue::Number(1.0)];
        let b = vec![SortValue::Null, SortValue::Number(1.0)];
        assert!(equivalent(&a, &b));
        let c = vec![SortValue::Null, SortValue::Number(2.0)];
        assert!(!equivalent(&a, &c));
    }

    #[test]
    fn test_incommensurable_ties() {
        let a = vec![SortValue::String("x".to_string())];
        let b = vec![SortValue::Boolean(true)];
        let dirs = [SortDirection::Ascending];
        let nulls = [NullPosition::First];
        assert_eq!(compare_sort_values(&a, &b, &dirs, &nulls), Ordering::Equal);
    }
}
