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

//! SQL function system
//!
//! - [`AggregateFunction`] - reductions over grouped value lists (COUNT,
//!   SUM, AVG, MIN, MAX, statistics, MEDIAN, LISTAGG, JSON_AGG)
//! - [`WindowFunction`] - analytic functions computed per row over a
//!   partition (ROW_NUMBER, RANK, LAG, ...)
//! - scalar builtins dispatched by name
//!
//! DISTINCT is handled by the caller: the view deduplicates the value
//! list by comparison key before feeding an aggregate.

pub mod aggregate;
pub mod scalar;
pub mod window;

use crate::core::{Result, Value};

pub use aggregate::{
    AvgFunction, CountFunction, JsonAggFunction, ListAggFunction, MaxFunction, MedianFunction,
    MinFunction, StdevFunction, SumFunction, VarFunction,
};
pub use window::{
    CumeDistFunction, DenseRankFunction, LagFunction, LeadFunction, NthValueFunction,
    NtileFunction, PercentRankFunction, RankFunction, RowNumberFunction, ValuePosition,
};

/// Trait for aggregate functions
///
/// An instance accumulates the values of one group and yields the result.
/// NULL handling is per-function; the empty group yields NULL for every
/// function except COUNT.
pub trait AggregateFunction: Send {
    /// Get the function name
    fn name(&self) -> &str;

    /// Accumulate one value
    fn accumulate(&mut self, value: &Value);

    /// Get the final result
    fn result(&self) -> Value;

    /// Reset the state for the next group
    fn reset(&mut self);
}

/// Per-row inputs a window function sees when processing one partition
pub struct WindowContext<'a> {
    /// Evaluated argument value per row, in partition order
    pub values: &'a [Value],
    /// Peer-group ordinal per row: rows with equivalent sort keys share
    /// an ordinal; without ORDER BY the whole partition is one peer group
    pub peers: &'a [usize],
    /// Framed slice `[start, end)` for the current row
    pub frame: (usize, usize),
    /// Extra evaluated arguments (NTILE n, LAG offset and default, ...)
    pub args: &'a [Value],
}

impl WindowContext<'_> {
    /// Number of rows in the partition
    pub fn partition_len(&self) -> usize {
        self.values.len()
    }

    /// The framed slice of argument values
    pub fn framed_values(&self) -> &[Value] {
        &self.values[self.frame.0..self.frame.1]
    }
}

/// Trait for window functions
pub trait WindowFunction: Send {
    /// Get the function name
    fn name(&self) -> &str;

    /// Compute the value for row `row` (0-based, partition order)
    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value>;
}

/// Instantiate a built-in aggregate by name. `ignore_case` configures the
/// string comparisons of MIN/MAX.
pub fn aggregate_instance(name: &str, ignore_case: bool) -> Option<Box<dyn AggregateFunction>> {
    let instance: Box<dyn AggregateFunction> = match name.to_uppercase().as_str() {
        "COUNT" => Box::new(CountFunction::new(false)),
        "MIN" => Box::new(MinFunction::new(ignore_case)),
        "MAX" => Box::new(MaxFunction::new(ignore_case)),
        "SUM" => Box::new(SumFunction::default()),
        "AVG" => Box::new(AvgFunction::default()),
        "STDEV" => Box::new(StdevFunction::sample()),
        "STDEVP" => Box::new(StdevFunction::population()),
        "VAR" => Box::new(VarFunction::sample()),
        "VARP" => Box::new(VarFunction::population()),
        "MEDIAN" => Box::new(MedianFunction::default()),
        _ => return None,
    };
    Some(instance)
}

/// True when the name is a built-in aggregate
pub fn is_aggregate(name: &str) -> bool {
    matches!(
        name.to_uppercase().as_str(),
        "COUNT" | "MIN" | "MAX" | "SUM" | "AVG" | "STDEV" | "STDEVP" | "VAR" | "VARP" | "MEDIAN"
    )
}

/// Instantiate a list aggregate (the two-argument aggregates)
pub fn list_aggregate_instance(
    name: &str,
    separator: Option<&str>,
) -> Option<Box<dyn AggregateFunction>> {
    let instance: Box<dyn AggregateFunction> = match name.to_uppercase().as_str() {
        "LISTAGG" => Box::new(ListAggFunction::new(separator.unwrap_or(""))),
        "JSON_AGG" => Box::new(JsonAggFunction::default()),
        _ => return None,
    };
    Some(instance)
}

/// True when the name is a list aggregate
pub fn is_list_aggregate(name: &str) -> bool {
    matches!(name.to_uppercase().as_str(), "LISTAGG" | "JSON_AGG")
}

/// Instantiate a built-in window function by name
pub fn window_instance(name: &str) -> Option<Box<dyn WindowFunction>> {
    let instance: Box<dyn WindowFunction> = match name.to_uppercase().as_str() {
        "ROW_NUMBER" => Box::new(RowNumberFunction),
        "RANK" => Box::new(RankFunction),
        "DENSE_RANK" => Box::new(DenseRankFunction),
        "CUME_DIST" => Box::new(CumeDistFunction),
        "PERCENT_RANK" => Box::new(PercentRankFunction),
        "NTILE" => Box::new(NtileFunction),
        "FIRST_VALUE" => Box::new(NthValueFunction::new(ValuePosition::First)),
        "LAST_VALUE" => Box::new(NthValueFunction::new(ValuePosition::Last)),
        "NTH_VALUE" => Box::new(NthValueFunction::new(ValuePosition::Nth)),
        "LAG" => Box::new(LagFunction),
        "LEAD" => Box::new(LeadFunction),
        _ => return None,
    };
    Some(instance)
}

/// True when the name is a built-in window function
pub fn is_window(name: &str) -> bool {
    matches!(
        name.to_uppercase().as_str(),
        "ROW_NUMBER"
            | "RANK"
            | "DENSE_RANK"
            | "CUME_DIST"
            | "PERCENT_RANK"
            | "NTILE"
            | "FIRST_VALUE"
            | "LAST_VALUE"
            | "NTH_VALUE"
            | "LAG"
            | "LEAD"
    )
}
