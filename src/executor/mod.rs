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

//! Query executor
//!
//! Everything between the AST and the codecs:
//!
//! - [`Session`] - process-wide state: flags, view cache, temp scopes,
//!   variables, cursors, user functions
//! - [`Executor`] - the statement driver with transactional commit
//! - [`View`] - the relational operator surface
//! - [`Filter`] - scope-stack expression evaluation
//! - [`ExecContext`] - cancellation and worker-count plumbing

pub mod analytic;
pub mod cache;
pub mod context;
pub mod cursor;
pub mod driver;
pub mod filter;
pub mod flags;
pub mod function_map;
pub mod join;
pub mod parallel;
pub mod query;
pub mod session;
pub mod sort;
pub mod transaction;
pub mod variables;
pub mod view;

pub use context::ExecContext;
pub use driver::{ExecResult, Executor, Flow, ResultKind};
pub use filter::{Filter, FilterRecord};
pub use flags::Flags;
pub use session::{Session, StatementParser};
pub use view::View;
