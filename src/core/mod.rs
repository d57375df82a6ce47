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

//! Core types for flatsql
//!
//! This module contains the fundamental types used throughout the engine:
//!
//! - [`Value`] - runtime scalar with type information
//! - [`Ternary`] - three-valued logic primitive
//! - [`Cell`], [`Record`], [`RecordSet`] - the tabular building blocks
//! - [`Header`], [`HeaderField`] - column metadata
//! - [`Error`], [`Result`] - error handling

pub mod compare;
pub mod error;
pub mod header;
pub mod row;
pub mod ternary;
pub mod value;

pub use compare::{comparison_key, serialize_comparison_keys, serialize_key};
pub use error::{Error, Result};
pub use header::{Header, HeaderField, INTERNAL_ID_COLUMN};
pub use row::{Cell, Record, RecordSet};
pub use ternary::Ternary;
pub use value::{ArithmeticOp, Value};
