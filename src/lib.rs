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

//! # flatsql - transactional SQL over delimited files
//!
//! flatsql executes SQL (SELECT with joins, grouping, analytics and set
//! operations; INSERT/UPDATE/DELETE; DDL; procedural control flow)
//! against CSV, TSV, fixed-width, LTSV and JSON files as if they were
//! relational tables. Each referenced file is materialized as an
//! in-memory [`View`]; mutations stay buffered in the view cache and are
//! written back atomically on COMMIT.
//!
//! ## Key properties
//!
//! - **Three-valued logic** - every predicate evaluates to
//!   TRUE/FALSE/UNKNOWN with Kleene connectives; WHERE keeps only TRUE
//! - **At-most-once table loads** - a file is read once per transaction
//!   and every later reference shares the cached view
//! - **Internal row identity** - UPDATE/DELETE over joined FROM clauses
//!   track physical rows, rejecting double writes
//! - **Snapshot-diff commits** - only files whose views actually changed
//!   are rewritten, via temp file + rename
//! - **Cancellation-aware** - every per-record pass polls the execution
//!   context and unwinds cleanly
//!
//! ## Quick start
//!
//! ```no_run
//! use flatsql::ast::{
//!     Expression, FieldObject, QueryBody, SelectEntity, SelectField, SelectQuery, Statement,
//!     TableExpr,
//! };
//! use flatsql::executor::{ExecContext, Executor, Flags, Session};
//!
//! let session = Session::new(Flags::default());
//! let mut executor = Executor::new(&session);
//!
//! // SELECT * FROM users
//! let query = SelectQuery::from_entity(SelectEntity {
//!     distinct: false,
//!     fields: vec![SelectField::all_columns()],
//!     from: vec![TableExpr::identifier("users.csv")],
//!     where_clause: None,
//!     group_by: vec![],
//!     having: None,
//! });
//!
//! let ctx = ExecContext::default();
//! let output = executor.execute(&ctx, &[Statement::Select(query)]).unwrap();
//! println!("{}", output);
//! ```
//!
//! The SQL text parser is an external collaborator: hosts construct
//! [`ast`] nodes directly, or plug a parser in through
//! [`executor::StatementParser`] to enable `EXECUTE`.
//!
//! ## Modules
//!
//! - [`core`] - values, ternary logic, cells/records, headers, errors
//! - [`ast`] - the typed statement and expression nodes the engine runs
//! - [`codec`] - file formats, encodings, locking file handlers
//! - [`functions`] - aggregate, window and scalar builtins
//! - [`executor`] - views, evaluation, the driver and transactions

pub mod ast;
pub mod codec;
pub mod core;
pub mod executor;
pub mod functions;

pub use crate::core::{Error, Result, Ternary, Value};
pub use executor::{ExecContext, Executor, Flags, Session, View};
