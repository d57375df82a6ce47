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

//! ROW_NUMBER window function

use crate::core::{Result, Value};
use crate::functions::{WindowContext, WindowFunction};

/// 1-based position within the partition
pub struct RowNumberFunction;

impl WindowFunction for RowNumberFunction {
    fn name(&self) -> &str {
        "ROW_NUMBER"
    }

    fn process(&self, _ctx: &WindowContext, row: usize) -> Result<Value> {
        Ok(Value::Integer(row as i64 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_number() {
        let values = vec![Value::Null; 3];
        let peers = vec![0, 0, 1];
        let ctx = WindowContext {
            values: &values,
            peers: &peers,
            frame: (0, 3),
            args: &[],
        };
        let f = RowNumberFunction;
        assert_eq!(f.process(&ctx, 0).unwrap(), Value::Integer(1));
        assert_eq!(f.process(&ctx, 2).unwrap(), Value::Integer(3));
    }
}
