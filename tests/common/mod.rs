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

//! Shared fixtures for the integration suites. The engine has no SQL
//! text frontend, so tests build AST nodes directly; the helpers here
//! keep that construction compact.

#![allow(dead_code)]

use std::fs;

use tempfile::TempDir;

use flatsql::ast::{
    Expression, FieldReference, SelectEntity, SelectField, SelectQuery, TableExpr,
};
use flatsql::executor::filter::Filter;
use flatsql::executor::query;
use flatsql::executor::{ExecContext, Flags, Session, View};
use flatsql::Value;

pub fn write_file(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).expect("failed to write fixture file");
}

pub fn read_file(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).expect("failed to read fixture file")
}

/// A session whose repository is the given temp directory
pub fn session_in(dir: &TempDir) -> Session {
    let mut flags = Flags::default();
    flags.repository = dir.path().to_path_buf();
    flags.cpu = 1;
    Session::new(flags)
}

pub fn run_select(session: &Session, select_query: &SelectQuery) -> View {
    try_select(session, select_query).expect("query failed")
}

pub fn try_select(session: &Session, select_query: &SelectQuery) -> flatsql::Result<View> {
    let ctx = ExecContext::new(1);
    let filter = Filter::new(session, &ctx);
    query::select(&filter, select_query)
}

/// Scalar projection of a finalized view's records
pub fn rows(view: &View) -> Vec<Vec<Value>> {
    view.records
        .iter()
        .map(|record| record.iter().map(|cell| cell.value().clone()).collect())
        .collect()
}

pub fn columns(view: &View) -> Vec<String> {
    view.header.table_column_names()
}

pub fn select_from(fields: Vec<SelectField>, from: Vec<TableExpr>) -> SelectQuery {
    SelectQuery::from_entity(SelectEntity {
        distinct: false,
        fields,
        from,
        where_clause: None,
        group_by: Vec::new(),
        having: None,
    })
}

pub fn entity_from(fields: Vec<SelectField>, from: Vec<TableExpr>) -> SelectEntity {
    SelectEntity {
        distinct: false,
        fields,
        from,
        where_clause: None,
        group_by: Vec::new(),
        having: None,
    }
}

pub fn fref(column: &str) -> FieldReference {
    FieldReference {
        view: None,
        column: column.to_string(),
    }
}

pub fn qref(view: &str, column: &str) -> FieldReference {
    FieldReference {
        view: Some(view.to_string()),
        column: column.to_string(),
    }
}

pub fn int(value: i64) -> Value {
    Value::Integer(value)
}

pub fn text(value: &str) -> Value {
    Value::text(value)
}

pub fn count_star() -> Expression {
    Expression::AggregateFunction {
        name: "COUNT".to_string(),
        distinct: false,
        arg: None,
    }
}

pub fn aggregate(name: &str, arg: Expression) -> Expression {
    Expression::AggregateFunction {
        name: name.to_string(),
        distinct: false,
        arg: Some(Box::new(arg)),
    }
}
