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

//! JSON_AGG aggregate function

use crate::codec::json::aggregate_array;
use crate::core::Value;
use crate::functions::AggregateFunction;

/// JSON_AGG collects the group into a JSON array, keeping NULLs as JSON
/// nulls. An empty group yields NULL like every non-COUNT aggregate.
#[derive(Default)]
pub struct JsonAggFunction {
    values: Vec<Value>,
}

impl AggregateFunction for JsonAggFunction {
    fn name(&self) -> &str {
        "JSON_AGG"
    }

    fn accumulate(&mut self, value: &Value) {
        self.values.push(value.clone());
    }

    fn result(&self) -> Value {
        if self.values.is_empty() {
            Value::Null
        } else {
            Value::text(aggregate_array(&self.values))
        }
    }

    fn reset(&mut self) {
        self.values.clear();
    }
}
