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

//! Transaction semantics: buffered mutation, snapshot-diff commits,
//! rollback, cached view reuse and cancellation

mod common;

use common::*;
use flatsql::ast::{
    Expression, InsertQuery, InsertSource, SelectField, Statement, TableExpr,
};
use flatsql::executor::{ExecContext, Executor};
use tempfile::TempDir;

#[test]
fn test_select_output_is_emitted_at_commit() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a,b\n1,2\n3,4");
    let session = session_in(&dir);

    let query = select_from(
        vec![
            SelectField::expr(Expression::field("b")),
            SelectField::expr(Expression::field("a")),
        ],
        vec![TableExpr::identifier("t")],
    );
    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    let out = executor.execute(&ctx, &[Statement::Select(query)]).unwrap();
    assert_eq!(out, "b,a\n2,1\n4,3\n");
}

#[test]
fn test_unmodified_views_are_not_rewritten() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1\n2");
    let session = session_in(&dir);

    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    let out = executor.execute(&ctx, &[Statement::Select(query)]).unwrap();

    // No flush message: the snapshot diff found nothing to write
    assert!(!out.contains("Commit:"));
    assert_eq!(read_file(&dir, "t.csv"), "a\n1\n2");
}

#[test]
fn test_mutation_stays_buffered_until_commit() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1");
    let session = session_in(&dir);

    let insert = Statement::Insert(InsertQuery {
        with: vec![],
        table: "t.csv".to_string(),
        fields: vec![fref("a")],
        source: InsertSource::Values(vec![vec![Expression::integer(2)]]),
    });

    // Run the statement without the implicit commit
    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    executor.execute_statement(&ctx, &insert).unwrap();
    assert_eq!(read_file(&dir, "t.csv"), "a\n1");

    // Commit flushes
    executor.commit(&ctx).unwrap();
    assert_eq!(read_file(&dir, "t.csv"), "a\n1\n2");
}

#[test]
fn test_rollback_discards_buffered_mutation() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1");
    let session = session_in(&dir);

    let insert = Statement::Insert(InsertQuery {
        with: vec![],
        table: "t.csv".to_string(),
        fields: vec![fref("a")],
        source: InsertSource::Values(vec![vec![Expression::integer(2)]]),
    });

    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    executor
        .execute(&ctx, &[insert, Statement::Rollback])
        .unwrap();
    assert_eq!(read_file(&dir, "t.csv"), "a\n1");
}

#[test]
fn test_commit_then_reload_sees_committed_state() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a,b\n1,x");
    let session = session_in(&dir);

    let insert = Statement::Insert(InsertQuery {
        with: vec![],
        table: "t.csv".to_string(),
        fields: vec![fref("a"), fref("b")],
        source: InsertSource::Values(vec![vec![
            Expression::integer(2),
            Expression::string("y"),
        ]]),
    });
    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    executor.execute(&ctx, &[insert]).unwrap();

    // Fresh transaction reloads from disk and sees exactly the
    // committed records
    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    let view = run_select(&session, &query);
    assert_eq!(
        rows(&view),
        vec![
            vec![text("1"), text("x")],
            vec![text("2"), text("y")],
        ]
    );
}

#[test]
fn test_table_is_loaded_once_per_transaction() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1");
    let session = session_in(&dir);

    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    executor
        .execute_statement(&ctx, &Statement::Select(query.clone()))
        .unwrap();

    // Overwrite the file mid-transaction; the cached view must win
    write_file(&dir, "t.csv", "a\n999");
    executor
        .execute_statement(&ctx, &Statement::Select(query.clone()))
        .unwrap();

    let second = executor.result_set[1].view.clone().unwrap();
    assert_eq!(rows(&second), vec![vec![text("1")]]);
}

#[test]
fn test_cancellation_leaves_cache_untouched() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "t.csv", "a\n1");
    let session = session_in(&dir);

    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("t")],
    );
    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    ctx.cancel();
    let err = executor
        .execute(&ctx, &[Statement::Select(query)])
        .unwrap_err();
    assert_eq!(err, flatsql::Error::Cancelled);
    assert!(session.cached_views.keys().is_empty());
}

#[test]
fn test_declare_table_is_never_flushed() {
    let dir = TempDir::new().unwrap();
    let session = session_in(&dir);

    let declare = Statement::DeclareTable {
        table: "scratch".to_string(),
        fields: vec!["a".to_string()],
        query: None,
    };
    let insert = Statement::Insert(InsertQuery {
        with: vec![],
        table: "scratch".to_string(),
        fields: vec![fref("a")],
        source: InsertSource::Values(vec![vec![Expression::integer(1)]]),
    });
    let query = select_from(
        vec![SelectField::all_columns()],
        vec![TableExpr::identifier("scratch")],
    );

    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    let out = executor
        .execute(&ctx, &[declare, insert, Statement::Select(query)])
        .unwrap();

    assert!(out.contains("1 record inserted"));
    assert!(out.contains("a\n1"));
    // Nothing landed in the repository directory
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_print_and_log_order() {
    let dir = TempDir::new().unwrap();
    let session = session_in(&dir);

    let statements = [
        Statement::Print(Expression::string("first")),
        Statement::Print(Expression::integer(2)),
    ];
    let mut executor = Executor::new(&session);
    let ctx = ExecContext::new(1);
    let out = executor.execute(&ctx, &statements).unwrap();
    assert_eq!(out, "first\n2\n");
}
