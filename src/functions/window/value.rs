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

//! FIRST_VALUE, LAST_VALUE and NTH_VALUE window functions
//!
//! All three read from the framed slice of the partition.

use crate::core::{Error, Result, Value};
use crate::functions::{WindowContext, WindowFunction};

/// Which framed position to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePosition {
    First,
    Last,
    Nth,
}

/// FIRST_VALUE / LAST_VALUE / NTH_VALUE(value, n)
pub struct NthValueFunction {
    position: ValuePosition,
}

impl NthValueFunction {
    pub fn new(position: ValuePosition) -> NthValueFunction {
        NthValueFunction { position }
    }
}

impl WindowFunction for NthValueFunction {
    fn name(&self) -> &str {
        match self.position {
            ValuePosition::First => "FIRST_VALUE",
            ValuePosition::Last => "LAST_VALUE",
            ValuePosition::Nth => "NTH_VALUE",
        }
    }

    fn process(&self, ctx: &WindowContext, _row: usize) -> Result<Value> {
        let frame = ctx.framed_values();
        let picked = match self.position {
            ValuePosition::First => frame.first(),
            ValuePosition::Last => frame.last(),
            ValuePosition::Nth => {
                let n = ctx
                    .args
                    .first()
                    .and_then(Value::as_integer)
                    .filter(|&n| 0 < n)
                    .ok_or_else(|| {
                        Error::invalid_argument("NTH_VALUE requires a positive integer argument")
                    })?;
                frame.get(n as usize - 1)
            }
        };
        Ok(picked.cloned().unwrap_or(Value::Null))
    }
}
