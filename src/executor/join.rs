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

//! Joins
//!
//! All joins are nested loops over the Cartesian pairs: CROSS keeps
//! everything, INNER keeps pairs whose ON condition answers TRUE, OUTER
//! additionally preserves unmatched rows of the chosen side padded with
//! NULL. USING and NATURAL joins synthesize the equality condition, then
//! collapse each joined column pair into a single leading output column.

use rustc_hash::FxHashSet;

use crate::ast::{
    ComparisonOp, Expression, FieldReference, Join, JoinCondition, JoinDirection, JoinType,
};
use crate::core::{Cell, Header, Record, Result, Ternary, Value};

use super::context::ExecContext;
use super::filter::Filter;
use super::view::View;

/// Execute one join node, folding `right` into `left`
pub fn execute(
    ctx: &ExecContext,
    filter: &Filter,
    left: &mut View,
    right: View,
    join_expr: &Join,
) -> Result<()> {
    let (condition, include, exclude) = parse_join_condition(join_expr, left, &right)?;

    match join_expr.join_type {
        JoinType::Cross => cross_join(ctx, left, right)?,
        JoinType::Inner => inner_join(ctx, filter, left, right, condition.as_ref())?,
        JoinType::Outer(direction) => {
            outer_join(ctx, filter, left, right, condition.as_ref(), direction)?
        }
    }

    if !include.is_empty() {
        let coalesce = matches!(join_expr.join_type, JoinType::Outer(JoinDirection::Full));
        collapse_join_columns(ctx, left, &include, &exclude, coalesce)?;
    }
    Ok(())
}

/// Derive the ON condition and the column collapse lists for USING and
/// NATURAL joins
fn parse_join_condition(
    join_expr: &Join,
    left: &View,
    right: &View,
) -> Result<(Option<Expression>, Vec<FieldReference>, Vec<FieldReference>)> {
    let using: Vec<String> = if join_expr.natural {
        let right_names: Vec<String> = right.header.table_column_names();
        left.header
            .table_column_names()
            .into_iter()
            .filter(|l| right_names.iter().any(|r| r.eq_ignore_ascii_case(l)))
            .collect()
    } else {
        match &join_expr.condition {
            Some(JoinCondition::On(expr)) => return Ok((Some(expr.clone()), Vec::new(), Vec::new())),
            Some(JoinCondition::Using(columns)) => columns.clone(),
            None => Vec::new(),
        }
    };

    if using.is_empty() {
        return Ok((None, Vec::new(), Vec::new()));
    }

    let mut condition: Option<Expression> = None;
    let mut left_refs = Vec::with_capacity(using.len());
    let mut right_refs = Vec::with_capacity(using.len());
    for column in &using {
        let left_idx = left.header.contains(None, column)?;
        let right_idx = right.header.contains(None, column)?;
        let left_ref = FieldReference {
            view: Some(left.header[left_idx].view.clone()),
            column: left.header[left_idx].column.clone(),
        };
        let right_ref = FieldReference {
            view: Some(right.header[right_idx].view.clone()),
            column: right.header[right_idx].column.clone(),
        };

        let equality = Expression::Comparison {
            lhs: Box::new(Expression::FieldReference(left_ref.clone())),
            op: ComparisonOp::Equal,
            rhs: Box::new(Expression::FieldReference(right_ref.clone())),
        };
        condition = Some(match condition {
            None => equality,
            Some(prior) => Expression::And(Box::new(prior), Box::new(equality)),
        });

        left_refs.push(left_ref);
        right_refs.push(right_ref);
    }

    // The preserved side contributes the collapsed column
    let (include, exclude) = match join_expr.join_type {
        JoinType::Outer(JoinDirection::Right) => (right_refs, left_refs),
        _ => (left_refs, right_refs),
    };
    Ok((condition, include, exclude))
}

/// Cartesian product
pub fn cross_join(ctx: &ExecContext, left: &mut View, right: View) -> Result<()> {
    let header = Header::merge(left.header.clone(), right.header.clone());
    let mut records = Vec::with_capacity(left.records.len() * right.records.len().max(1));
    for l in &left.records {
        ctx.check()?;
        for r in &right.records {
            records.push(merge_records(l, r));
        }
    }
    left.header = header;
    left.records = records;
    left.file_info = None;
    Ok(())
}

fn merge_records(l: &Record, r: &Record) -> Record {
    l.iter().cloned().chain(r.iter().cloned()).collect()
}

fn pad_record(record: &Record, nulls_before: usize, nulls_after: usize) -> Record {
    let nulls = |n: usize| std::iter::repeat_with(|| Cell::new(Value::Null)).take(n);
    nulls(nulls_before)
        .chain(record.iter().cloned())
        .chain(nulls(nulls_after))
        .collect()
}

/// Evaluate the ON condition against a candidate pair
struct JoinProbe {
    scratch: View,
}

impl JoinProbe {
    fn new(header: Header) -> JoinProbe {
        JoinProbe {
            scratch: View {
                header,
                records: vec![Record::new(Vec::new())],
                ..Default::default()
            },
        }
    }

    fn matches(
        &mut self,
        filter: &Filter,
        condition: Option<&Expression>,
        candidate: Record,
    ) -> Result<(bool, Record)> {
        let Some(condition) = condition else {
            return Ok((true, candidate));
        };
        self.scratch.records[0] = candidate;
        let t = filter
            .with_record(&self.scratch, 0)
            .evaluate_condition(condition)?;
        let record = std::mem::replace(&mut self.scratch.records[0], Record::new(Vec::new()));
        Ok((t == Ternary::True, record))
    }
}

/// INNER JOIN: the Cartesian pairs whose condition holds
pub fn inner_join(
    ctx: &ExecContext,
    filter: &Filter,
    left: &mut View,
    right: View,
    condition: Option<&Expression>,
) -> Result<()> {
    let header = Header::merge(left.header.clone(), right.header.clone());
    let mut probe = JoinProbe::new(header.clone());
    let mut records = Vec::new();

    for l in &left.records {
        ctx.check()?;
        for r in &right.records {
            let (keep, record) = probe.matches(filter, condition, merge_records(l, r))?;
            if keep {
                records.push(record);
            }
        }
    }

    left.header = header;
    left.records = records;
    left.file_info = None;
    Ok(())
}

/// OUTER JOIN: preserve unmatched rows of the chosen side(s), padding
/// the other side with NULL
pub fn outer_join(
    ctx: &ExecContext,
    filter: &Filter,
    left: &mut View,
    right: View,
    condition: Option<&Expression>,
    direction: JoinDirection,
) -> Result<()> {
    let left_len = left.field_len();
    let right_len = right.field_len();
    let header = Header::merge(left.header.clone(), right.header.clone());
    let mut probe = JoinProbe::new(header.clone());
    let mut records = Vec::new();

    match direction {
        JoinDirection::Left | JoinDirection::Full => {
            let mut matched_right: FxHashSet<usize> = FxHashSet::default();
            for l in &left.records {
                ctx.check()?;
                let mut matched = false;
                for (ri, r) in right.records.iter().enumerate() {
                    let (keep, record) = probe.matches(filter, condition, merge_records(l, r))?;
                    if keep {
                        matched = true;
                        matched_right.insert(ri);
                        records.push(record);
                    }
                }
                if !matched {
                    records.push(pad_record(l, 0, right_len));
                }
            }
            if direction == JoinDirection::Full {
                for (ri, r) in right.records.iter().enumerate() {
                    if !matched_right.contains(&ri) {
                        records.push(pad_record(r, left_len, 0));
                    }
                }
            }
        }
        JoinDirection::Right => {
            for r in &right.records {
                ctx.check()?;
                let mut matched = false;
                for l in &left.records {
                    let (keep, record) = probe.matches(filter, condition, merge_records(l, r))?;
                    if keep {
                        matched = true;
                        records.push(record);
                    }
                }
                if !matched {
                    records.push(pad_record(r, left_len, 0));
                }
            }
        }
    }

    left.header = header;
    left.records = records;
    left.file_info = None;
    Ok(())
}

/// Collapse each USING/NATURAL column pair into a single leading column
/// marked as a join column. With `coalesce` (FULL joins) the collapsed
/// cell falls back to the excluded side when the kept side is NULL.
fn collapse_join_columns(
    ctx: &ExecContext,
    view: &mut View,
    include: &[FieldReference],
    exclude: &[FieldReference],
    coalesce: bool,
) -> Result<()> {
    let include_indices = view.field_indices(include)?;
    let exclude_indices = view.field_indices(exclude)?;

    let mut field_order: Vec<usize> = Vec::with_capacity(view.field_len() - exclude_indices.len());
    let mut fields = Vec::with_capacity(field_order.capacity());
    for &idx in &include_indices {
        let mut field = view.header[idx].clone();
        field.view = String::new();
        field.number = 0;
        field.is_join_column = true;
        fields.push(field);
        field_order.push(idx);
    }
    for (i, field) in view.header.iter().enumerate() {
        if include_indices.contains(&i) || exclude_indices.contains(&i) {
            continue;
        }
        fields.push(field.clone());
        field_order.push(i);
    }

    let join_count = include_indices.len();
    let records = super::parallel::map_indexed(ctx, view.records.len(), |i| {
        let record = &view.records[i];
        let cells = field_order
            .iter()
            .enumerate()
            .map(|(slot, &idx)| {
                if coalesce && slot < join_count && record[idx].value().is_null() {
                    record[exclude_indices[slot]].clone()
                } else {
                    record[idx].clone()
                }
            })
            .collect();
        Ok(Record::new(cells))
    })?;

    view.header = Header::from_fields(fields);
    view.records = records;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::flags::Flags;
    use crate::executor::session::Session;

    fn view(name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> View {
        let columns: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        View {
            header: Header::new(name, &columns).unwrap(),
            records: rows.into_iter().map(Record::from_values).collect(),
            ..Default::default()
        }
    }

    fn on_equal(lv: &str, lc: &str, rv: &str, rc: &str) -> Expression {
        Expression::Comparison {
            lhs: Box::new(Expression::qualified_field(lv, lc)),
            op: ComparisonOp::Equal,
            rhs: Box::new(Expression::qualified_field(rv, rc)),
        }
    }

    #[test]
    fn test_cross_join_order() {
        let ctx = ExecContext::new(1);
        let mut left = view("a", &["x"], vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
        let right = view("b", &["y"], vec![vec![Value::Integer(10)], vec![Value::Integer(20)]]);
        cross_join(&ctx, &mut left, right).unwrap();

        assert_eq!(left.field_len(), 2);
        assert_eq!(left.records.len(), 4);
        assert_eq!(left.records[0][0].value(), &Value::Integer(1));
        assert_eq!(left.records[0][1].value(), &Value::Integer(10));
        assert_eq!(left.records[3][0].value(), &Value::Integer(2));
        assert_eq!(left.records[3][1].value(), &Value::Integer(20));
    }

    #[test]
    fn test_inner_join_filters() {
        let session = Session::new(Flags::default());
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let mut left = view("a", &["id"], vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
        let right = view(
            "b",
            &["id", "v"],
            vec![
                vec![Value::Integer(2), Value::text("two")],
                vec![Value::Integer(3), Value::text("three")],
            ],
        );
        let condition = on_equal("a", "id", "b", "id");
        inner_join(&ctx, &filter, &mut left, right, Some(&condition)).unwrap();

        assert_eq!(left.records.len(), 1);
        assert_eq!(left.records[0][2].value(), &Value::text("two"));
    }

    #[test]
    fn test_left_outer_pads_with_null() {
        let session = Session::new(Flags::default());
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let mut left = view("a", &["id"], vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
        let right = view("b", &["id"], vec![vec![Value::Integer(2)]]);
        let condition = on_equal("a", "id", "b", "id");
        outer_join(
            &ctx,
            &filter,
            &mut left,
            right,
            Some(&condition),
            JoinDirection::Left,
        )
        .unwrap();

        assert_eq!(left.records.len(), 2);
        assert_eq!(left.records[0][1].value(), &Value::Null);
        assert_eq!(left.records[1][1].value(), &Value::Integer(2));
    }

    #[test]
    fn test_full_outer_appends_unmatched_right() {
        let session = Session::new(Flags::default());
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let mut left = view("a", &["id"], vec![vec![Value::Integer(1)]]);
        let right = view("b", &["id"], vec![vec![Value::Integer(9)]]);
        let condition = on_equal("a", "id", "b", "id");
        outer_join(
            &ctx,
            &filter,
            &mut left,
            right,
            Some(&condition),
            JoinDirection::Full,
        )
        .unwrap();

        assert_eq!(left.records.len(), 2);
        assert_eq!(left.records[1][0].value(), &Value::Null);
        assert_eq!(left.records[1][1].value(), &Value::Integer(9));
    }

    #[test]
    fn test_using_collapse() {
        let session = Session::new(Flags::default());
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let mut left = view(
            "a",
            &["id", "l"],
            vec![vec![Value::Integer(1), Value::text("x")]],
        );
        let right = view(
            "b",
            &["id", "r"],
            vec![vec![Value::Integer(1), Value::text("y")]],
        );
        let join_expr = Join {
            left: crate::ast::TableExpr::identifier("a"),
            right: crate::ast::TableExpr::identifier("b"),
            join_type: JoinType::Inner,
            natural: false,
            condition: Some(JoinCondition::Using(vec!["id".to_string()])),
        };
        execute(&ctx, &filter, &mut left, right, &join_expr).unwrap();

        // id collapsed and moved first, remaining columns follow
        assert_eq!(left.field_len(), 3);
        assert!(left.header[0].is_join_column);
        assert_eq!(left.header[0].column, "id");
        assert_eq!(left.records[0][0].value(), &Value::Integer(1));
        assert_eq!(left.records[0][1].value(), &Value::text("x"));
        assert_eq!(left.records[0][2].value(), &Value::text("y"));
        // The collapsed column resolves as a bare reference again
        assert!(left.header.contains(None, "id").is_ok());
    }

    #[test]
    fn test_natural_join_finds_common_columns() {
        let session = Session::new(Flags::default());
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let mut left = view(
            "a",
            &["id", "v"],
            vec![vec![Value::Integer(1), Value::text("x")]],
        );
        let right = view(
            "b",
            &["id", "w"],
            vec![
                vec![Value::Integer(1), Value::text("y")],
                vec![Value::Integer(2), Value::text("z")],
            ],
        );
        let join_expr = Join {
            left: crate::ast::TableExpr::identifier("a"),
            right: crate::ast::TableExpr::identifier("b"),
            join_type: JoinType::Inner,
            natural: true,
            condition: None,
        };
        execute(&ctx, &filter, &mut left, right, &join_expr).unwrap();

        assert_eq!(left.records.len(), 1);
        assert_eq!(left.field_len(), 3);
        assert_eq!(left.header[0].column, "id");
    }
}
