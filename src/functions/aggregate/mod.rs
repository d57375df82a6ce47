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

//! Aggregate functions
//!
//! - [`CountFunction`] - COUNT(column) and COUNT(*)
//! - [`SumFunction`] / [`AvgFunction`] - float accumulation, NULL-skipping
//! - [`MinFunction`] / [`MaxFunction`] - ternary-comparison extremes
//! - [`StdevFunction`] / [`VarFunction`] - sample and population moments
//! - [`MedianFunction`]
//! - [`ListAggFunction`] - LISTAGG(value, separator)
//! - [`JsonAggFunction`] - JSON_AGG(value)
//!
//! Every function except COUNT yields NULL over an empty input.

mod avg;
mod count;
mod json_agg;
mod list_agg;
mod min_max;
mod statistics;
mod sum;

pub use avg::AvgFunction;
pub use count::CountFunction;
pub use json_agg::JsonAggFunction;
pub use list_agg::ListAggFunction;
pub use min_max::{MaxFunction, MinFunction};
pub use statistics::{MedianFunction, StdevFunction, VarFunction};
pub use sum::SumFunction;
