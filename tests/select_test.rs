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

//! SELECT pipeline tests: projection, WHERE, DISTINCT, ORDER BY,
//! OFFSET/LIMIT and ternary predicates

mod common;

use common::*;
use flatsql::ast::{
    ComparisonOp, Expression, InListSource, LimitClause, OrderItem, QueryBody, SelectField,
    TableExpr,
};
use flatsql::core::Ternary;
use flatsql::Value;
use tempfile::TempDir;

#[test]
fn test_basic_projection_reorders_columns() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a,b\n1,2\n3,4");
    let session = session_in(&dir);

    // SELECT b, a FROM t
    let query = select_from(
        vec![
            SelectField::expr(Expression::field("b")),
            SelectField::expr(Expression::field("a")),
        ],
        vec![TableExpr::identifier("t")],
    );
    let view = run_select(&session, &query);

    assert_eq!(columns(&view), vec!["b", "a"]);
    assert_eq!(
        rows(&view),
        vec![
            vec![text("2"), text("1")],
            vec![text("4"), text("3")],
        ]
    );
}

#[test]
fn test_select_star_expands_in_order() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a,b,c\n1,2,3");
    let session = session_in(&dir);

    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    let view = run_select(&session, &query);
    assert_eq!(columns(&view), vec!["a", "b", "c"]);
}

#[test]
fn test_where_keeps_only_definite_true() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n\n3");
    let session = session_in(&dir);

    // WHERE a > 1: the NULL row is UNKNOWN and must be dropped
    let mut entity = entity_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    entity.where_clause = Some(Expression::Comparison {
        lhs: Box::new(Expression::field("a")),
        op: ComparisonOp::Greater,
        rhs: Box::new(Expression::integer(1)),
    });
    let view = run_select(
        &session,
        &flatsql::ast::SelectQuery::from_entity(entity),
    );
    assert_eq!(rows(&view), vec![vec![text("3")]]);
}

#[test]
fn test_chained_where_equals_conjunction() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2\n3\n4");
    let session = session_in(&dir);

    let gt = |n: i64| Expression::Comparison {
        lhs: Box::new(Expression::field("a")),
        op: ComparisonOp::Greater,
        rhs: Box::new(Expression::integer(n)),
    };
    let lt = |n: i64| Expression::Comparison {
        lhs: Box::new(Expression::field("a")),
        op: ComparisonOp::Less,
        rhs: Box::new(Expression::integer(n)),
    };

    // WHERE a > 1 AND a < 4
    let mut conjunction = entity_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    conjunction.where_clause = Some(Expression::And(Box::new(gt(1)), Box::new(lt(4))));
    let expected = rows(&run_select(
        &session,
        &flatsql::ast::SelectQuery::from_entity(conjunction),
    ));

    // Subquery with WHERE a > 1, outer WHERE a < 4
    let mut inner = entity_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    inner.where_clause = Some(gt(1));
    let mut outer = entity_from(
        vec![SelectField::all_columns()],
        vec![TableExpr {
            object: flatsql::ast::TableUnit::Subquery(Box::new(
                flatsql::ast::SelectQuery::from_entity(inner),
            )),
            alias: Some("s".to_string()),
        }],
    );
    outer.where_clause = Some(lt(4));
    let chained = rows(&run_select(
        &session,
        &flatsql::ast::SelectQuery::from_entity(outer),
    ));

    assert_eq!(expected, chained);
    assert_eq!(expected, vec![vec![text("2")], vec![text("3")]]);
}

#[test]
fn test_not_in_with_null_is_unknown() {
    let dir = TempDir::new().unwrap();
    let session = session_in(&dir);

    // SELECT 3 NOT IN (1, NULL, 2) with no FROM clause
    let query = select_from(
        vec![SelectField::expr(Expression::In {
            lhs: Box::new(Expression::integer(3)),
            list: InListSource::Values(vec![
                Expression::integer(1),
                Expression::null(),
                Expression::integer(2),
            ]),
            negated: true,
        })],
        vec![],
    );
    let view = run_select(&session, &query);
    assert_eq!(rows(&view), vec![vec![Value::Ternary(Ternary::Unknown)]]);
}

#[test]
fn test_distinct_keeps_first_occurrence_order() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "d.csv", "c\nB\nA\nB\nA");
    let session = session_in(&dir);

    let mut entity = entity_from(
        vec![SelectField::expr(Expression::field("c"))],
        vec![TableExpr::identifier("d")],
    );
    entity.distinct = true;
    let view = run_select(&session, &flatsql::ast::SelectQuery::from_entity(entity));
    assert_eq!(rows(&view), vec![vec![text("B")], vec![text("A")]]);
}

#[test]
fn test_distinct_preserves_cardinality_without_duplicates() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2\n3");
    let session = session_in(&dir);

    // Projection without DISTINCT preserves cardinality
    let query = select_from(
        vec![SelectField::expr(Expression::field("a"))],
        vec![TableExpr::identifier("t")],
    );
    assert_eq!(run_select(&session, &query).records.len(), 3);
}

#[test]
fn test_order_by_with_null_positions() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n2\n\n1");
    let session = session_in(&dir);

    // ASC defaults NULLS FIRST
    let mut query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    query.order_by = vec![OrderItem::new(Expression::field("a"))];
    let view = run_select(&session, &query);
    assert_eq!(
        rows(&view),
        vec![vec![Value::Null], vec![text("1")], vec![text("2")]]
    );

    // DESC defaults NULLS LAST
    let mut query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    query.order_by = vec![OrderItem::descending(Expression::field("a"))];
    let view = run_select(&session, &query);
    assert_eq!(
        rows(&view),
        vec![vec![text("2")], vec![text("1")], vec![Value::Null]]
    );
}

#[test]
fn test_order_by_is_stable() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "k,v\n1,a\n1,b\n0,c\n1,d");
    let session = session_in(&dir);

    let mut query = select_from(
        vec![SelectField::expr(Expression::field("v"))],
        vec![TableExpr::identifier("t")],
    );
    query.order_by = vec![OrderItem::new(Expression::field("k"))];
    let view = run_select(&session, &query);
    // Ties keep their input order
    assert_eq!(
        rows(&view),
        vec![
            vec![text("c")],
            vec![text("a")],
            vec![text("b")],
            vec![text("d")],
        ]
    );
}

#[test]
fn test_offset_and_limit() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2\n3\n4\n5");
    let session = session_in(&dir);

    let mut query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    query.offset = Some(Expression::integer(1));
    query.limit = Some(LimitClause {
        value: Expression::integer(2),
        percent: false,
        with_ties: false,
    });
    let view = run_select(&session, &query);
    assert_eq!(rows(&view), vec![vec![text("2")], vec![text("3")]]);
}

#[test]
fn test_limit_percent() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2\n3\n4\n5\n6\n7\n8\n9\n10");
    let session = session_in(&dir);

    // 30 percent of 10 records, no offset: ceil(3) = 3
    let mut query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    query.limit = Some(LimitClause {
        value: Expression::integer(30),
        percent: true,
        with_ties: false,
    });
    let view = run_select(&session, &query);
    assert_eq!(view.records.len(), 3);
}

#[test]
fn test_limit_with_ties_extends_over_equal_keys() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2\n2\n3");
    let session = session_in(&dir);

    let mut query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    query.order_by = vec![OrderItem::new(Expression::field("a"))];
    query.limit = Some(LimitClause {
        value: Expression::integer(2),
        percent: false,
        with_ties: true,
    });
    let view = run_select(&session, &query);
    assert_eq!(
        rows(&view),
        vec![vec![text("1")], vec![text("2")], vec![text("2")]]
    );
}

#[test]
fn test_case_insensitive_flag_changes_comparison() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\nAbc\nxyz");
    let session = session_in(&dir);
    session
        .flags
        .write()
        .set("IGNORE_CASE", &Value::Boolean(true))
        .unwrap();

    let mut entity = entity_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    entity.where_clause = Some(Expression::Comparison {
        lhs: Box::new(Expression::field("a")),
        op: ComparisonOp::Equal,
        rhs: Box::new(Expression::string("ABC")),
    });
    let view = run_select(&session, &flatsql::ast::SelectQuery::from_entity(entity));
    assert_eq!(rows(&view), vec![vec![text("Abc")]]);
}

#[test]
fn test_subquery_as_set_operand() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2");
    let session = session_in(&dir);

    // (SELECT a FROM t) UNION ALL (SELECT a FROM t)
    let side = || {
        QueryBody::Subquery(Box::new(select_from(
            vec![SelectField::expr(Expression::field("a"))],
            vec![TableExpr::identifier("t")],
        )))
    };
    let query = flatsql::ast::SelectQuery::from_body(QueryBody::Set {
        left: Box::new(side()),
        operator: flatsql::ast::SetOperator::Union,
        all: true,
        right: Box::new(side()),
    });
    let view = run_select(&session, &query);
    assert_eq!(view.records.len(), 4);
}
