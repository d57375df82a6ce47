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

//! Join tests through the whole query pipeline

mod common;

use common::*;
use flatsql::ast::{
    ComparisonOp, Expression, Join, JoinCondition, JoinDirection, JoinType, SelectField,
    TableExpr, TableUnit,
};
use flatsql::Value;
use tempfile::TempDir;

fn join_tables(
    left: TableExpr,
    right: TableExpr,
    join_type: JoinType,
    condition: Option<JoinCondition>,
) -> TableExpr {
    TableExpr {
        object: TableUnit::Join(Box::new(Join {
            left,
            right,
            join_type,
            natural: false,
            condition,
        })),
        alias: None,
    }
}

fn setup(dir: &TempDir) {
    write_file(dir, "users.csv", "id,name\n1,ann\n2,bob\n3,cid");
    write_file(dir, "orders.csv", "user_id,item\n1,apple\n1,pear\n3,fig");
}

#[test]
fn test_cross_join_is_cartesian() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let query = select_from(
        vec![SelectField::all_columns()],
        vec![
            TableExpr::identifier("users"),
            TableExpr::identifier("orders"),
        ],
    );
    let view = run_select(&session, &query);
    assert_eq!(view.records.len(), 9);
    assert_eq!(columns(&view), vec!["id", "name", "user_id", "item"]);
}

#[test]
fn test_inner_join_on() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let condition = Expression::Comparison {
        lhs: Box::new(Expression::qualified_field("users", "id")),
        op: ComparisonOp::Equal,
        rhs: Box::new(Expression::qualified_field("orders", "user_id")),
    };
    let query = select_from(
        vec![
            SelectField::expr(Expression::qualified_field("users", "name")),
            SelectField::expr(Expression::qualified_field("orders", "item")),
        ],
        vec![join_tables(
            TableExpr::identifier("users"),
            TableExpr::identifier("orders"),
            JoinType::Inner,
            Some(JoinCondition::On(condition)),
        )],
    );
    let view = run_select(&session, &query);
    assert_eq!(
        rows(&view),
        vec![
            vec![text("ann"), text("apple")],
            vec![text("ann"), text("pear")],
            vec![text("cid"), text("fig")],
        ]
    );
}

#[test]
fn test_left_outer_join_pads_unmatched() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    let condition = Expression::Comparison {
        lhs: Box::new(Expression::qualified_field("users", "id")),
        op: ComparisonOp::Equal,
        rhs: Box::new(Expression::qualified_field("orders", "user_id")),
    };
    let query = select_from(
        vec![
            SelectField::expr(Expression::qualified_field("users", "name")),
            SelectField::expr(Expression::qualified_field("orders", "item")),
        ],
        vec![join_tables(
            TableExpr::identifier("users"),
            TableExpr::identifier("orders"),
            JoinType::Outer(JoinDirection::Left),
            Some(JoinCondition::On(condition)),
        )],
    );
    let view = run_select(&session, &query);
    assert_eq!(
        rows(&view),
        vec![
            vec![text("ann"), text("apple")],
            vec![text("ann"), text("pear")],
            vec![text("bob"), Value::Null],
            vec![text("cid"), text("fig")],
        ]
    );
}

#[test]
fn test_join_using_collapses_column() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "a.csv", "id,l\n1,x\n2,y");
    write_file(&dir, "b.csv", "id,r\n1,p\n3,q");
    let session = session_in(&dir);

    let query = select_from(
        vec![SelectField::all_columns()],
        vec![join_tables(
            TableExpr::identifier("a"),
            TableExpr::identifier("b"),
            JoinType::Inner,
            Some(JoinCondition::Using(vec!["id".to_string()])),
        )],
    );
    let view = run_select(&session, &query);
    // The join column comes first, once
    assert_eq!(columns(&view), vec!["id", "l", "r"]);
    assert_eq!(rows(&view), vec![vec![text("1"), text("x"), text("p")]]);
}

#[test]
fn test_natural_join() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "a.csv", "id,l\n1,x\n2,y");
    write_file(&dir, "b.csv", "id,r\n2,q");
    let session = session_in(&dir);

    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr {
            object: TableUnit::Join(Box::new(Join {
                left: TableExpr::identifier("a"),
                right: TableExpr::identifier("b"),
                join_type: JoinType::Inner,
                natural: true,
                condition: None,
            })),
            alias: None,
        }],
    );
    let view = run_select(&session, &query);
    assert_eq!(columns(&view), vec!["id", "l", "r"]);
    assert_eq!(rows(&view), vec![vec![text("2"), text("y"), text("q")]]);
}

#[test]
fn test_self_join_requires_aliases() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1");
    let session = session_in(&dir);

    // The same table twice without aliases is a duplicate table name
    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t"), TableExpr::identifier("t")],
    );
    let err = try_select(&session, &query).unwrap_err();
    assert!(matches!(err, flatsql::Error::DuplicateTableName(_)));

    // Aliased, it works
    let query = select_from(
        vec![SelectField::all_columns()],
        vec![
            TableExpr::aliased("t", "t1"),
            TableExpr::aliased("t", "t2"),
        ],
    );
    let view = run_select(&session, &query);
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.header.len(), 2);
}

#[test]
fn test_correlated_subquery_sees_outer_row() {
    let dir = TempDir::new().unwrap();
    setup(&dir);
    let session = session_in(&dir);

    // SELECT name FROM users WHERE EXISTS
    //   (SELECT 1 FROM orders WHERE orders.user_id = users.id)
    let mut inner = entity_from(
        vec![SelectField::expr(Expression::integer(1))],
        vec![TableExpr::identifier("orders")],
    );
    inner.where_clause = Some(Expression::Comparison {
        lhs: Box::new(Expression::qualified_field("orders", "user_id")),
        op: ComparisonOp::Equal,
        rhs: Box::new(Expression::qualified_field("users", "id")),
    });

    let mut outer = entity_from(
        vec![SelectField::expr(Expression::field("name"))],
        vec![TableExpr::identifier("users")],
    );
    outer.where_clause = Some(Expression::Exists(Box::new(
        flatsql::ast::SelectQuery::from_entity(inner),
    )));
    let view = run_select(&session, &flatsql::ast::SelectQuery::from_entity(outer));
    assert_eq!(rows(&view), vec![vec![text("ann")], vec![text("cid")]]);
}
