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

//! Set operation tests: UNION, EXCEPT, INTERSECT with and without ALL

mod common;

use common::*;
use flatsql::ast::{Expression, QueryBody, SelectField, SelectQuery, SetOperator, TableExpr};
use tempfile::TempDir;

fn body_of(table: &str) -> QueryBody {
    QueryBody::Entity(entity_from(
        vec![SelectField::expr(Expression::field("a"))],
        vec![TableExpr::identifier(table)],
    ))
}

fn set_query(left: &str, operator: SetOperator, all: bool, right: &str) -> SelectQuery {
    SelectQuery::from_body(QueryBody::Set {
        left: Box::new(body_of(left)),
        operator,
        all,
        right: Box::new(body_of(right)),
    })
}

fn setup(dir: &TempDir) {
    write_file(dir, "l.csv", "a\n1\n2\n2\n3");
    write_file(dir, "r.csv", "a\n2\n4\n4");
}

#[test]
fn test_union_all_concatenates() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let view = run_select(&session, &set_query("l", SetOperator::Union, true, "r"));
    assert_eq!(
        rows(&view),
        vec![
            vec![text("1")],
            vec![text("2")],
            vec![text("2")],
            vec![text("3")],
            vec![text("2")],
            vec![text("4")],
            vec![text("4")],
        ]
    );
}

#[test]
fn test_union_dedups_stable_first_occurrence() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let view = run_select(&session, &set_query("l", SetOperator::Union, false, "r"));
    assert_eq!(
        rows(&view),
        vec![
            vec![text("1")],
            vec![text("2")],
            vec![text("3")],
            vec![text("4")],
        ]
    );
}

#[test]
fn test_except_drops_right_keys() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let view = run_select(&session, &set_query("l", SetOperator::Except, false, "r"));
    assert_eq!(rows(&view), vec![vec![text("1")], vec![text("3")]]);
}

#[test]
fn test_except_all_still_dedups_right_side() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    // The right side is deduplicated before subtraction: both left 2s
    // are dropped even though ALL keeps left multiplicity elsewhere
    let view = run_select(&session, &set_query("l", SetOperator::Except, true, "r"));
    assert_eq!(rows(&view), vec![vec![text("1")], vec![text("3")]]);
}

#[test]
fn test_intersect() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let view = run_select(&session, &set_query("l", SetOperator::Intersect, false, "r"));
    assert_eq!(rows(&view), vec![vec![text("2")]]);

    // INTERSECT ALL keeps left multiplicity of matching keys
    let view = run_select(&session, &set_query("l", SetOperator::Intersect, true, "r"));
    assert_eq!(rows(&view), vec![vec![text("2")], vec![text("2")]]);
}

#[test]
fn test_set_operation_clears_file_backing() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let view = run_select(&session, &set_query("l", SetOperator::Union, true, "r"));
    assert!(view.file_info.is_none());
}

#[test]
fn test_field_length_mismatch_is_an_error() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "one.csv", "a\n1");
    write_file(&dir, "two.csv", "a,b\n1,2");
    let session = session_in(&dir);

    let query = SelectQuery::from_body(QueryBody::Set {
        left: Box::new(QueryBody::Entity(entity_from(
            vec![SelectField::all_columns()],
            vec![TableExpr::identifier("one")],
        ))),
        operator: SetOperator::Union,
        all: false,
        right: Box::new(QueryBody::Entity(entity_from(
            vec![SelectField::all_columns()],
            vec![TableExpr::identifier("two")],
        ))),
    });
    let err = try_select(&session, &query).unwrap_err();
    assert!(matches!(err, flatsql::Error::FieldLengthNotMatch { .. }));
}

#[test]
fn test_union_bridges_numeric_representations() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "l.csv", "a\n1");
    let session = session_in(&dir);

    // SELECT a FROM l UNION SELECT 1: the text "1" and the integer 1
    // serialize to the same comparison key
    let query = SelectQuery::from_body(QueryBody::Set {
        left: Box::new(body_of("l")),
        operator: SetOperator::Union,
        all: false,
        right: Box::new(QueryBody::Entity(entity_from(
            vec![SelectField::expr(Expression::integer(1))],
            vec![],
        ))),
    });
    let view = run_select(&session, &query);
    assert_eq!(view.records.len(), 1);
}
