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

//! Expression evaluation
//!
//! A Filter is the evaluator's scope stack: the session (variables,
//! flags, caches), the query's common tables, the inline views recursive
//! CTEs iterate through, and a stack of `(view, record index)` frames.
//! Subquery evaluation pushes frames onto a child filter; parent frames
//! are never mutated. Field references resolve innermost frame outward,
//! so correlated subqueries see their own row first.

use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::ast::{
    CommonTable, ComparisonOp, Expression, InListSource, SelectQuery,
};
use crate::core::compare;
use crate::core::{Error, Result, Ternary, Value};

use super::context::ExecContext;
use super::driver;
use super::query;
use super::session::Session;
use super::view::View;

/// One record frame: a view pinned at a record index
#[derive(Clone, Copy)]
pub struct FilterRecord<'a> {
    pub view: &'a View,
    pub record_index: usize,
}

/// The evaluator scope stack
#[derive(Clone)]
pub struct Filter<'a> {
    pub session: &'a Session,
    pub ctx: &'a ExecContext,
    pub records: Vec<FilterRecord<'a>>,
    /// Materialized WITH views, keyed by upper-cased name
    pub common_tables: Arc<FxHashMap<String, View>>,
    /// Recursive CTE declarations awaiting execution
    pub recursive_tables: Arc<FxHashMap<String, CommonTable>>,
    /// The working view of the recursion currently executing
    pub inline_tables: Arc<FxHashMap<String, View>>,
}

impl<'a> Filter<'a> {
    pub fn new(session: &'a Session, ctx: &'a ExecContext) -> Filter<'a> {
        Filter {
            session,
            ctx,
            records: Vec::new(),
            common_tables: Arc::new(FxHashMap::default()),
            recursive_tables: Arc::new(FxHashMap::default()),
            inline_tables: Arc::new(FxHashMap::default()),
        }
    }

    /// Child filter with one more record frame
    pub fn with_record<'b>(&self, view: &'b View, record_index: usize) -> Filter<'b>
    where
        'a: 'b,
    {
        let mut records: Vec<FilterRecord<'b>> = Vec::with_capacity(self.records.len() + 1);
        for r in &self.records {
            records.push(FilterRecord {
                view: r.view,
                record_index: r.record_index,
            });
        }
        records.push(FilterRecord { view, record_index });
        Filter {
            session: self.session,
            ctx: self.ctx,
            records,
            common_tables: Arc::clone(&self.common_tables),
            recursive_tables: Arc::clone(&self.recursive_tables),
            inline_tables: Arc::clone(&self.inline_tables),
        }
    }

    /// Child filter whose recursion placeholder resolves to `view`
    pub fn with_inline_table(&self, name: &str, view: View) -> Filter<'a> {
        let mut child = self.clone();
        Arc::make_mut(&mut child.inline_tables).insert(name.to_uppercase(), view);
        child
    }

    /// Materialize a WITH clause into this filter's scope
    pub fn load_common_tables(&mut self, tables: &[CommonTable]) -> Result<()> {
        for ct in tables {
            let key = ct.name.to_uppercase();
            if self.common_tables.contains_key(&key) || self.recursive_tables.contains_key(&key) {
                return Err(Error::DuplicateTableName(ct.name.clone()));
            }
            if ct.recursive {
                Arc::make_mut(&mut self.recursive_tables).insert(key, ct.clone());
            } else {
                let mut view = query::select_as_subquery(self, &ct.query)?;
                let columns = if ct.columns.is_empty() {
                    None
                } else {
                    Some(&ct.columns[..])
                };
                view.header.update(&ct.name, columns)?;
                view.file_info = None;
                Arc::make_mut(&mut self.common_tables).insert(key, view);
            }
        }
        Ok(())
    }

    fn ignore_case(&self) -> bool {
        self.session.ignore_case()
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluate an expression against the current scope stack
    pub fn evaluate(&self, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Parentheses(e) => self.evaluate(e),
            Expression::FieldReference(_) | Expression::ColumnNumber(_) => {
                self.evaluate_field(expr)
            }
            Expression::Arithmetic { lhs, op, rhs } => {
                let l = self.evaluate(lhs)?;
                let r = self.evaluate(rhs)?;
                Ok(Value::calculate(&l, &r, *op))
            }
            Expression::UnaryMinus(e) => {
                let v = self.evaluate(e)?;
                Ok(Value::calculate(
                    &Value::Integer(0),
                    &v,
                    crate::core::ArithmeticOp::Subtract,
                ))
            }
            Expression::Concat(items) => {
                let values = items
                    .iter()
                    .map(|e| self.evaluate(e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::concat(&values))
            }
            Expression::Comparison { lhs, op, rhs } => {
                let l = self.evaluate(lhs)?;
                let r = self.evaluate(rhs)?;
                let ic = self.ignore_case();
                let t = match op {
                    ComparisonOp::Equal => compare::equal(&l, &r, ic),
                    ComparisonOp::NotEqual => compare::not_equal(&l, &r, ic),
                    ComparisonOp::Less => compare::less_than(&l, &r, ic),
                    ComparisonOp::LessEqual => compare::less_than_or_equal(&l, &r, ic),
                    ComparisonOp::Greater => compare::greater_than(&l, &r, ic),
                    ComparisonOp::GreaterEqual => compare::greater_than_or_equal(&l, &r, ic),
                    ComparisonOp::Identical => compare::identical(&l, &r),
                };
                Ok(Value::Ternary(t))
            }
            Expression::Is { lhs, rhs, negated } => {
                let l = self.evaluate(lhs)?;
                let r = self.evaluate(rhs)?;
                let t = if r.is_null() {
                    Ternary::of(l.is_null())
                } else {
                    Ternary::of(l.ternary() == r.ternary())
                };
                Ok(Value::Ternary(if *negated { t.not() } else { t }))
            }
            Expression::Between {
                lhs,
                low,
                high,
                negated,
            } => {
                let v = self.evaluate(lhs)?;
                let lo = self.evaluate(low)?;
                let hi = self.evaluate(high)?;
                let ic = self.ignore_case();
                let t = compare::greater_than_or_equal(&v, &lo, ic)
                    .and(compare::less_than_or_equal(&v, &hi, ic));
                Ok(Value::Ternary(if *negated { t.not() } else { t }))
            }
            Expression::In { lhs, list, negated } => {
                let t = self.evaluate_in(lhs, list)?;
                Ok(Value::Ternary(if *negated { t.not() } else { t }))
            }
            Expression::Like {
                lhs,
                pattern,
                negated,
            } => {
                let t = self.evaluate_like(lhs, pattern)?;
                Ok(Value::Ternary(if *negated { t.not() } else { t }))
            }
            Expression::Exists(q) => {
                let view = query::select_as_subquery(self, q)?;
                Ok(Value::Ternary(Ternary::of(!view.records.is_empty())))
            }
            Expression::And(l, r) => {
                let lt = self.evaluate(l)?.ternary();
                if lt == Ternary::False {
                    return Ok(Value::Ternary(Ternary::False));
                }
                Ok(Value::Ternary(lt.and(self.evaluate(r)?.ternary())))
            }
            Expression::Or(l, r) => {
                let lt = self.evaluate(l)?.ternary();
                if lt == Ternary::True {
                    return Ok(Value::Ternary(Ternary::True));
                }
                Ok(Value::Ternary(lt.or(self.evaluate(r)?.ternary())))
            }
            Expression::Not(e) => Ok(Value::Ternary(self.evaluate(e)?.ternary().not())),
            Expression::ScalarSubquery(q) => self.evaluate_scalar_subquery(q),
            Expression::Function {
                name,
                args,
                distinct,
            } => self.evaluate_function(name, args, *distinct),
            Expression::AggregateFunction {
                name,
                distinct,
                arg,
            } => self.evaluate_aggregate(name, *distinct, arg.as_deref(), None),
            Expression::ListFunction {
                name,
                distinct,
                arg,
                separator,
            } => self.evaluate_aggregate(name, *distinct, Some(arg), separator.as_deref()),
            Expression::AnalyticFunction(f) => {
                Err(Error::AnalyticFunctionNotAllowed(f.name.clone()))
            }
            Expression::Case {
                operand,
                branches,
                else_result,
            } => self.evaluate_case(operand.as_deref(), branches, else_result.as_deref()),
            Expression::Variable(name) => self.session.variables.get(name),
            Expression::EnvironmentVariable(name) => Ok(std::env::var(name)
                .map(Value::text)
                .unwrap_or(Value::Null)),
            Expression::Flag(name) => self.session.flags.read().get(name),
        }
    }

    /// Evaluate a predicate and keep only definite TRUE
    pub fn evaluate_condition(&self, expr: &Expression) -> Result<Ternary> {
        Ok(self.evaluate(expr)?.ternary())
    }

    fn evaluate_field(&self, expr: &Expression) -> Result<Value> {
        for frame in self.records.iter().rev() {
            match frame.view.field_index_expr(expr) {
                Ok(idx) => {
                    let view = frame.view;
                    if view.is_grouped
                        && view.header[idx].is_from_table
                        && !view.header[idx].is_group_key
                    {
                        return Err(Error::FieldNotGroupKey(expr.to_string()));
                    }
                    let record = &view.records[frame.record_index];
                    return Ok(record[idx].value().clone());
                }
                Err(Error::FieldAmbiguous(c)) => return Err(Error::FieldAmbiguous(c)),
                Err(_) => continue,
            }
        }
        Err(Error::FieldNotExist(expr.to_string()))
    }

    fn evaluate_in(&self, lhs: &Expression, list: &InListSource) -> Result<Ternary> {
        let value = self.evaluate(lhs)?;
        let ic = self.ignore_case();
        let mut result = Ternary::False;

        match list {
            InListSource::Values(items) => {
                for item in items {
                    let candidate = self.evaluate(item)?;
                    match compare::equal(&value, &candidate, ic) {
                        Ternary::True => return Ok(Ternary::True),
                        Ternary::Unknown => result = Ternary::Unknown,
                        Ternary::False => {}
                    }
                }
            }
            InListSource::Subquery(q) => {
                let view = query::select_as_subquery(self, q)?;
                if 1 < view.header.len() {
                    return Err(Error::SubqueryTooManyFields);
                }
                for record in &view.records {
                    let candidate = record[0].value();
                    match compare::equal(&value, candidate, ic) {
                        Ternary::True => return Ok(Ternary::True),
                        Ternary::Unknown => result = Ternary::Unknown,
                        Ternary::False => {}
                    }
                }
            }
        }
        Ok(result)
    }

    fn evaluate_like(&self, lhs: &Expression, pattern: &Expression) -> Result<Ternary> {
        let text = self.evaluate(lhs)?.to_string_value();
        let pat = self.evaluate(pattern)?.to_string_value();
        let (Value::String(text), Value::String(pat)) = (text, pat) else {
            return Ok(Ternary::Unknown);
        };

        let mut built = String::with_capacity(pat.len() + 8);
        built.push_str(if self.ignore_case() { "(?is)^" } else { "(?s)^" });
        for c in pat.chars() {
            match c {
                '%' => built.push_str(".*"),
                '_' => built.push('.'),
                c => built.push_str(&regex::escape(&c.to_string())),
            }
        }
        built.push('$');

        let re = Regex::new(&built)
            .map_err(|e| Error::internal(format!("LIKE pattern compilation: {}", e)))?;
        Ok(Ternary::of(re.is_match(&text)))
    }

    fn evaluate_scalar_subquery(&self, query: &SelectQuery) -> Result<Value> {
        let view = query::select_as_subquery(self, query)?;
        if 1 < view.header.len() {
            return Err(Error::SubqueryTooManyFields);
        }
        if 1 < view.records.len() {
            return Err(Error::SubqueryTooManyRecords);
        }
        match view.records.first() {
            Some(record) => Ok(record[0].value().clone()),
            None => Ok(Value::Null),
        }
    }

    fn evaluate_case(
        &self,
        operand: Option<&Expression>,
        branches: &[crate::ast::CaseBranch],
        else_result: Option<&Expression>,
    ) -> Result<Value> {
        let operand_value = operand.map(|o| self.evaluate(o)).transpose()?;
        for branch in branches {
            let hit = match &operand_value {
                Some(op) => {
                    let cond = self.evaluate(&branch.condition)?;
                    compare::equal(op, &cond, self.ignore_case()).is_true()
                }
                None => self.evaluate_condition(&branch.condition)?.is_true(),
            };
            if hit {
                return self.evaluate(&branch.result);
            }
        }
        match else_result {
            Some(e) => self.evaluate(e),
            None => Ok(Value::Null),
        }
    }

    fn evaluate_function(
        &self,
        name: &str,
        args: &[Expression],
        distinct: bool,
    ) -> Result<Value> {
        let declaration = self.session.functions.lock().get(name);
        if let Some(declaration) = declaration {
            if declaration.cursor.is_some() {
                return self.evaluate_user_aggregate(&declaration, args, distinct);
            }
            let arg_values = args
                .iter()
                .map(|a| self.evaluate(a))
                .collect::<Result<Vec<_>>>()?;
            return driver::execute_scalar_function(self, &declaration, arg_values);
        }

        if distinct {
            return Err(Error::invalid_argument(format!(
                "DISTINCT is not usable with scalar function {}",
                name
            )));
        }
        let arg_values = args
            .iter()
            .map(|a| self.evaluate(a))
            .collect::<Result<Vec<_>>>()?;
        match crate::functions::scalar::dispatch(name, &arg_values) {
            Some(result) => result,
            None => Err(Error::FunctionNotExist(name.to_string())),
        }
    }

    /// Built-in aggregates and the LISTAGG/JSON_AGG list functions
    fn evaluate_aggregate(
        &self,
        name: &str,
        distinct: bool,
        arg: Option<&Expression>,
        separator: Option<&str>,
    ) -> Result<Value> {
        let expanded = self.grouped_frame_view(name)?;

        let Some(arg) = arg else {
            // COUNT(*) counts the group rows
            if name.eq_ignore_ascii_case("COUNT") {
                return Ok(Value::Integer(expanded.records.len() as i64));
            }
            return Err(Error::FunctionArgumentLength {
                name: name.to_string(),
                expected: "1 argument".to_string(),
                got: 0,
            });
        };

        let list = self.aggregate_value_list(&expanded, arg, distinct)?;

        let mut function = crate::functions::aggregate_instance(name, self.ignore_case())
            .or_else(|| crate::functions::list_aggregate_instance(name, separator))
            .ok_or_else(|| Error::FunctionNotExist(name.to_string()))?;
        for value in &list {
            function.accumulate(value);
        }
        Ok(function.result())
    }

    /// User-declared aggregate: the grouped values go through the
    /// function's implicit cursor
    fn evaluate_user_aggregate(
        &self,
        declaration: &crate::ast::FunctionDeclaration,
        args: &[Expression],
        distinct: bool,
    ) -> Result<Value> {
        let expanded = self.grouped_frame_view(&declaration.name)?;
        let (Some(first), rest) = (args.first(), args.get(1..).unwrap_or_default()) else {
            return Err(Error::FunctionArgumentLength {
                name: declaration.name.clone(),
                expected: "at least 1 argument".to_string(),
                got: 0,
            });
        };
        let list = self.aggregate_value_list(&expanded, first, distinct)?;
        let extra = rest
            .iter()
            .map(|a| self.evaluate(a))
            .collect::<Result<Vec<_>>>()?;
        driver::execute_aggregate_function(self, declaration, list, extra)
    }

    /// The single-group expansion view of the innermost grouped frame
    fn grouped_frame_view(&self, function_name: &str) -> Result<View> {
        let frame = self
            .records
            .last()
            .filter(|f| f.view.is_grouped)
            .ok_or_else(|| Error::NotGroupingRecords(function_name.to_string()))?;
        Ok(View::from_grouped_record(frame.view, frame.record_index))
    }

    /// Evaluate the aggregate argument once per grouped row
    fn aggregate_value_list(
        &self,
        expanded: &View,
        arg: &Expression,
        distinct: bool,
    ) -> Result<Vec<Value>> {
        let mut list = Vec::with_capacity(expanded.records.len());
        for i in 0..expanded.records.len() {
            self.ctx.check()?;
            let value = self.with_record(expanded, i).evaluate(arg).map_err(|e| {
                if e.is_not_grouping() {
                    Error::NestedAggregateFunctions
                } else {
                    e
                }
            })?;
            list.push(value);
        }
        if distinct {
            list = compare::distinguish(list);
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::flags::Flags;

    fn session() -> Session {
        Session::new(Flags::default())
    }

    #[test]
    fn test_literal_arithmetic() {
        let session = session();
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let expr = Expression::Arithmetic {
            lhs: Box::new(Expression::integer(2)),
            op: crate::core::ArithmeticOp::Add,
            rhs: Box::new(Expression::integer(3)),
        };
        assert_eq!(filter.evaluate(&expr).unwrap(), Value::Integer(5));
    }

    #[test]
    fn test_not_in_with_null_is_unknown() {
        let session = session();
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        // 3 NOT IN (1, NULL, 2) must be UNKNOWN, not TRUE
        let expr = Expression::In {
            lhs: Box::new(Expression::integer(3)),
            list: InListSource::Values(vec![
                Expression::integer(1),
                Expression::null(),
                Expression::integer(2),
            ]),
            negated: true,
        };
        assert_eq!(
            filter.evaluate(&expr).unwrap(),
            Value::Ternary(Ternary::Unknown)
        );

        // 2 NOT IN (1, NULL, 2) is FALSE: the match dominates
        let expr = Expression::In {
            lhs: Box::new(Expression::integer(2)),
            list: InListSource::Values(vec![
                Expression::integer(1),
                Expression::null(),
                Expression::integer(2),
            ]),
            negated: true,
        };
        assert_eq!(
            filter.evaluate(&expr).unwrap(),
            Value::Ternary(Ternary::False)
        );
    }

    #[test]
    fn test_like() {
        let session = session();
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let like = |text: &str, pattern: &str| Expression::Like {
            lhs: Box::new(Expression::string(text)),
            pattern: Box::new(Expression::string(pattern)),
            negated: false,
        };
        assert_eq!(
            filter.evaluate(&like("hello.csv", "%.csv")).unwrap(),
            Value::Ternary(Ternary::True)
        );
        assert_eq!(
            filter.evaluate(&like("ab", "a_")).unwrap(),
            Value::Ternary(Ternary::True)
        );
        // Regex metacharacters in the pattern are literal
        assert_eq!(
            filter.evaluate(&like("ab", "a.")).unwrap(),
            Value::Ternary(Ternary::False)
        );
        // NULL operand is UNKNOWN
        let null_like = Expression::Like {
            lhs: Box::new(Expression::null()),
            pattern: Box::new(Expression::string("%")),
            negated: false,
        };
        assert_eq!(
            filter.evaluate(&null_like).unwrap(),
            Value::Ternary(Ternary::Unknown)
        );
    }

    #[test]
    fn test_case_expression() {
        let session = session();
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let expr = Expression::Case {
            operand: Some(Box::new(Expression::integer(2))),
            branches: vec![
                crate::ast::CaseBranch {
                    condition: Expression::integer(1),
                    result: Expression::string("one"),
                },
                crate::ast::CaseBranch {
                    condition: Expression::integer(2),
                    result: Expression::string("two"),
                },
            ],
            else_result: None,
        };
        assert_eq!(filter.evaluate(&expr).unwrap(), Value::text("two"));
    }

    #[test]
    fn test_variables_and_flags() {
        let session = session();
        session.variables.declare("x", Value::Integer(7)).unwrap();
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        assert_eq!(
            filter.evaluate(&Expression::Variable("x".to_string())).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            filter
                .evaluate(&Expression::Flag("IGNORE_CASE".to_string()))
                .unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_aggregate_requires_grouping() {
        let session = session();
        let ctx = ExecContext::new(1);
        let filter = Filter::new(&session, &ctx);

        let expr = Expression::AggregateFunction {
            name: "COUNT".to_string(),
            distinct: false,
            arg: None,
        };
        assert!(matches!(
            filter.evaluate(&expr),
            Err(Error::NotGroupingRecords(_))
        ));
    }
}
