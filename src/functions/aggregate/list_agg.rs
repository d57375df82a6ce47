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

//! LISTAGG aggregate function

use crate::core::Value;
use crate::functions::AggregateFunction;

/// LISTAGG concatenates the string casts of the non-NULL values with a
/// separator; nothing to join yields NULL
pub struct ListAggFunction {
    separator: String,
    parts: Vec<String>,
}

impl ListAggFunction {
    pub fn new(separator: &str) -> ListAggFunction {
        ListAggFunction {
            separator: separator.to_string(),
            parts: Vec::new(),
        }
    }
}

impl AggregateFunction for ListAggFunction {
    fn name(&self) -> &str {
        "LISTAGG"
    }

    fn accumulate(&mut self, value: &Value) {
        if let Value::String(s) = value.to_string_value() {
            self.parts.push(s.to_string());
        }
    }

    fn result(&self) -> Value {
        if self.parts.is_empty() {
            Value::Null
        } else {
            Value::text(self.parts.join(&self.separator))
        }
    }

    fn reset(&mut self) {
        self.parts.clear();
    }
}
