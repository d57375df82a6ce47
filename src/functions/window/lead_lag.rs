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

//! LAG and LEAD window functions
//!
//! Both ignore the frame: they look a fixed offset backward or forward in
//! the full partition, falling back to the default argument (NULL when
//! absent) out of range.

use crate::core::{Result, Value};
use crate::functions::{WindowContext, WindowFunction};

fn shifted(ctx: &WindowContext, row: usize, forward: bool) -> Value {
    let offset = ctx
        .args
        .first()
        .and_then(Value::as_integer)
        .unwrap_or(1)
        .max(0) as usize;
    let default = ctx.args.get(1).cloned().unwrap_or(Value::Null);

    let target = if forward {
        row.checked_add(offset)
    } else {
        row.checked_sub(offset)
    };
    match target.and_then(|t| ctx.values.get(t)) {
        Some(v) => v.clone(),
        None => default,
    }
}

/// LAG(value [, offset [, default]])
pub struct LagFunction;

impl WindowFunction for LagFunction {
    fn name(&self) -> &str {
        "LAG"
    }

    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value> {
        Ok(shifted(ctx, row, false))
    }
}

/// LEAD(value [, offset [, default]])
pub struct LeadFunction;

impl WindowFunction for LeadFunction {
    fn name(&self) -> &str {
        "LEAD"
    }

    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value> {
        Ok(shifted(ctx, row, true))
    }
}
