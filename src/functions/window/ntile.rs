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

//! NTILE window function

use crate::core::{Error, Result, Value};
use crate::functions::{WindowContext, WindowFunction};

/// NTILE(n): distribute the partition into n buckets, earlier buckets one
/// row larger when the split is uneven
pub struct NtileFunction;

impl WindowFunction for NtileFunction {
    fn name(&self) -> &str {
        "NTILE"
    }

    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value> {
        let tiles = ctx
            .args
            .first()
            .and_then(Value::as_integer)
            .filter(|&n| 0 < n)
            .ok_or_else(|| {
                Error::invalid_argument("NTILE requires a positive integer argument")
            })? as usize;

        let len = ctx.partition_len();
        let base = len / tiles;
        let remainder = len % tiles;
        // The first `remainder` buckets hold base+1 rows
        let boundary = remainder * (base + 1);
        let tile = if row < boundary {
            row / (base + 1)
        } else if 0 < base {
            remainder + (row - boundary) / base
        } else {
            row
        };
        Ok(Value::Integer(tile as i64 + 1))
    }
}
