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

//! MIN and MAX aggregate functions
//!
//! Both skip NULLs and keep a candidate only when the ternary comparison
//! answers TRUE, so incommensurable values never displace a result.

use crate::core::compare::{greater_than, less_than};
use crate::core::{Ternary, Value};
use crate::functions::AggregateFunction;

/// MIN aggregate function
pub struct MinFunction {
    ignore_case: bool,
    result: Value,
}

impl MinFunction {
    pub fn new(ignore_case: bool) -> MinFunction {
        MinFunction {
            ignore_case,
            result: Value::Null,
        }
    }
}

impl AggregateFunction for MinFunction {
    fn name(&self) -> &str {
        "MIN"
    }

    fn accumulate(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        if self.result.is_null()
            || less_than(value, &self.result, self.ignore_case) == Ternary::True
        {
            self.result = value.clone();
        }
    }

    fn result(&self) -> Value {
        self.result.clone()
    }

    fn reset(&mut self) {
        self.result = Value::Null;
    }
}

/// MAX aggregate function
pub struct MaxFunction {
    ignore_case: bool,
    result: Value,
}

impl MaxFunction {
    pub fn new(ignore_case: bool) -> MaxFunction {
        MaxFunction {
            ignore_case,
            result: Value::Null,
        }
    }
}

impl AggregateFunction for MaxFunction {
    fn name(&self) -> &str {
        "MAX"
    }

    fn accumulate(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        if self.result.is_null()
            || greater_than(value, &self.result, self.ignore_case) == Ternary::True
        {
            self.result = value.clone();
        }
    }

    fn result(&self) -> Value {
        self.result.clone()
    }

    fn reset(&mut self) {
        self.result = Value::Null;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max() {
        let mut min = MinFunction::new(false);
        let mut max = MaxFunction::new(false);
        for v in [Value::Integer(3), Value::Null, Value::Integer(1), Value::Integer(2)] {
            min.accumulate(&v);
            max.accumulate(&v);
        }
        assert_eq!(min.result(), Value::Integer(1));
        assert_eq!(max.result(), Value::Integer(3));
    }

    #[test]
    fn test_min_max_empty_is_null() {
        assert_eq!(MinFunction::new(false).result(), Value::Null);
        assert_eq!(MaxFunction::new(false).result(), Value::Null);
    }

    #[test]
    fn test_max_keeps_first_against_incommensurable() {
        let mut max = MaxFunction::new(false);
        max.accumulate(&Value::Integer(5));
        max.accumulate(&Value::text("abc"));
        assert_eq!(max.result(), Value::Integer(5));
    }

    #[test]
    fn test_min_strings_case() {
        let mut min = MinFunction::new(true);
        min.accumulate(&Value::text("b"));
        min.accumulate(&Value::text("A"));
        assert_eq!(min.result(), Value::text("A"));
    }
}
