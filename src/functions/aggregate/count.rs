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

//! COUNT aggregate function

use crate::core::{Ternary, Value};
use crate::functions::AggregateFunction;

/// COUNT(column) counts non-NULL values; COUNT(*) counts rows. A ternary
/// value counts only when TRUE, so counting a predicate partitions the
/// rows: COUNT(p) + COUNT(NOT p) + COUNT(p IS UNKNOWN) = COUNT(*).
#[derive(Default)]
pub struct CountFunction {
    count_rows: bool,
    count: i64,
}

impl CountFunction {
    pub fn new(count_rows: bool) -> CountFunction {
        CountFunction {
            count_rows,
            count: 0,
        }
    }
}

impl AggregateFunction for CountFunction {
    fn name(&self) -> &str {
        "COUNT"
    }

    fn accumulate(&mut self, value: &Value) {
        if self.count_rows {
            self.count += 1;
            return;
        }
        let counted = match value {
            Value::Null => false,
            Value::Ternary(t) => *t == Ternary::True,
            _ => true,
        };
        if counted {
            self.count += 1;
        }
    }

    fn result(&self) -> Value {
        Value::Integer(self.count)
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_skips_null() {
        let mut count = CountFunction::new(false);
        count.accumulate(&Value::Integer(1));
        count.accumulate(&Value::Null);
        count.accumulate(&Value::text("x"));
        assert_eq!(count.result(), Value::Integer(2));
    }

    #[test]
    fn test_count_rows_includes_null() {
        let mut count = CountFunction::new(true);
        count.accumulate(&Value::Null);
        count.accumulate(&Value::Null);
        assert_eq!(count.result(), Value::Integer(2));
    }

    #[test]
    fn test_count_empty_is_zero() {
        let count = CountFunction::new(false);
        assert_eq!(count.result(), Value::Integer(0));
    }

    #[test]
    fn test_count_only_nulls_is_zero() {
        let mut count = CountFunction::new(false);
        count.accumulate(&Value::Null);
        assert_eq!(count.result(), Value::Integer(0));
    }

    #[test]
    fn test_count_ternary_counts_only_true() {
        let mut count = CountFunction::new(false);
        count.accumulate(&Value::Ternary(Ternary::True));
        count.accumulate(&Value::Ternary(Ternary::False));
        count.accumulate(&Value::Ternary(Ternary::Unknown));
        assert_eq!(count.result(), Value::Integer(1));
    }
}
