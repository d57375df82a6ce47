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

//! Common table expression tests, including recursion

mod common;

use common::*;
use flatsql::ast::{
    CommonTable, ComparisonOp, Expression, QueryBody, SelectField, SelectQuery, SetOperator,
    TableExpr,
};
use flatsql::core::ArithmeticOp;
use flatsql::Value;
use tempfile::TempDir;

/// WITH r(n) AS (SELECT 1 UNION ALL SELECT n+1 FROM r WHERE n < <stop>)
fn counting_cte(stop: Expression) -> CommonTable {
    let anchor = QueryBody::Entity(entity_from(
        vec![SelectField::expr(Expression::integer(1))],
        vec![],
    ));

    let mut step = entity_from(
        vec![SelectField::expr(Expression::Arithmetic {
            lhs: Box::new(Expression::field("n")),
            op: ArithmeticOp::Add,
            rhs: Box::new(Expression::integer(1)),
        })],
        vec![TableExpr::identifier("r")],
    );
    step.where_clause = Some(Expression::Comparison {
        lhs: Box::new(Expression::field("n")),
        op: ComparisonOp::Less,
        rhs: Box::new(stop),
    });

    CommonTable {
        recursive: true,
        name: "r".to_string(),
        columns: vec!["n".to_string()],
        query: SelectQuery::from_body(QueryBody::Set {
            left: Box::new(anchor),
            operator: SetOperator::Union,
            all: true,
            right: Box::new(QueryBody::Entity(step)),
        }),
    }
}

#[test]
fn test_plain_with_clause() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2");
    let session = session_in(&dir);

    // WITH doubled(d) AS (SELECT a FROM t) SELECT d FROM doubled
    let ct = CommonTable {
        recursive: false,
        name: "doubled".to_string(),
        columns: vec!["d".to_string()],
        query: select_from(
            vec![SelectField::expr(Expression::field("a"))],
            vec![TableExpr::identifier("t")],
        ),
    };
    let mut query = select_from(
        vec![SelectField::expr(Expression::field("d"))],
        vec![TableExpr::identifier("doubled")],
    );
    query.with = vec![ct];

    let view = run_select(&session, &query);
    assert_eq!(columns(&view), vec!["d"]);
    assert_eq!(rows(&view), vec![vec![text("1")], vec![text("2")]]);
}

#[test]
fn test_recursive_cte_with_scalar_subquery_bound() {
    let dir = TempDir::new().unwrap();
    let session = session_in(&dir);

    // The recursion bound is itself a scalar subquery: (SELECT 3)
    let bound = Expression::ScalarSubquery(Box::new(select_from(
        vec![SelectField::expr(Expression::integer(3))],
        vec![],
    )));
    let mut query = select_from(
        vec![SelectField::expr(Expression::field("n"))],
        vec![TableExpr::identifier("r")],
    );
    query.with = vec![counting_cte(bound)];

    let view = run_select(&session, &query);
    assert_eq!(columns(&view), vec!["n"]);
    assert_eq!(
        rows(&view),
        vec![vec![int(1)], vec![int(2)], vec![int(3)]]
    );
}

#[test]
fn test_recursive_cte_respects_limit() {
    let dir = TempDir::new().unwrap();
    let session = session_in(&dir);
    session
        .flags
        .write()
        .set("LIMIT_RECURSION", &Value::Integer(5))
        .unwrap();

    // Unbounded recursion trips the iteration cap
    let mut query = select_from(
        vec![SelectField::expr(Expression::field("n"))],
        vec![TableExpr::identifier("r")],
    );
    query.with = vec![counting_cte(Expression::integer(1_000_000))];

    let err = try_select(&session, &query).unwrap_err();
    assert_eq!(err, flatsql::Error::RecursionExceededLimit(5));
}

#[test]
fn test_recursive_cte_joinable_with_files() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "n,label\n2,two\n3,three\n9,nine");
    let session = session_in(&dir);

    // Rows of t whose n appears in the generated series 1..=3
    let mut entity = entity_from(
        vec![SelectField::expr(Expression::field("label"))],
        vec![TableExpr::identifier("t")],
    );
    entity.where_clause = Some(Expression::In {
        lhs: Box::new(Expression::field("n")),
        list: flatsql::ast::InListSource::Subquery(Box::new(select_from(
            vec![SelectField::expr(Expression::field("n"))],
            vec![TableExpr::identifier("r")],
        ))),
        negated: false,
    });
    let mut query = flatsql::ast::SelectQuery::from_entity(entity);
    query.with = vec![counting_cte(Expression::integer(3))];

    let view = run_select(&session, &query);
    assert_eq!(rows(&view), vec![vec![text("two")], vec![text("three")]]);
}
