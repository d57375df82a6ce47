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

//! SUM aggregate function

use crate::core::Value;
use crate::functions::AggregateFunction;

/// SUM accumulates every float-convertible value and skips the rest.
/// Integral results collapse to Integer; no convertible input yields NULL.
#[derive(Default)]
pub struct SumFunction {
    sum: f64,
    count: usize,
}

impl AggregateFunction for SumFunction {
    fn name(&self) -> &str {
        "SUM"
    }

    fn accumulate(&mut self, value: &Value) {
        if let Some(f) = value.as_float() {
            self.sum += f;
            self.count += 1;
        }
    }

    fn result(&self) -> Value {
        if self.count < 1 {
            Value::Null
        } else {
            Value::from_f64(self.sum)
        }
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_integers() {
        let mut sum = SumFunction::default();
        sum.accumulate(&Value::Integer(1));
        sum.accumulate(&Value::Integer(2));
        sum.accumulate(&Value::Integer(3));
        assert_eq!(sum.result(), Value::Integer(6));
    }

    #[test]
    fn test_sum_mixed_yields_float() {
        let mut sum = SumFunction::default();
        sum.accumulate(&Value::Integer(1));
        sum.accumulate(&Value::Float(2.5));
        assert_eq!(sum.result(), Value::Float(3.5));
    }

    #[test]
    fn test_sum_skips_null_and_text() {
        let mut sum = SumFunction::default();
        sum.accumulate(&Value::Integer(1));
        sum.accumulate(&Value::Null);
        sum.accumulate(&Value::text("abc"));
        sum.accumulate(&Value::text("4"));
        assert_eq!(sum.result(), Value::Integer(5));
    }

    #[test]
    fn test_sum_empty_is_null() {
        let sum = SumFunction::default();
        assert_eq!(sum.result(), Value::Null);
    }

    #[test]
    fn test_sum_reset() {
        let mut sum = SumFunction::default();
        sum.accumulate(&Value::Integer(1));
        sum.reset();
        assert_eq!(sum.result(), Value::Null);
    }
}
