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

//! Views
//!
//! The in-memory table every operator runs against: header + records +
//! optional backing-file descriptor, plus the per-query scratch state
//! (projection plan, grouping flag, comparison keys, sort values) that
//! `fix` clears. Operators execute in the written order: load/join,
//! where, group by, having, select, order by, offset/limit, set
//! operations. Records may grow past the header during clause evaluation
//! to memoize computed expressions; every grown column is either chosen
//! by `select_fields` or trimmed by `fix`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{
    Expression, FieldObject, FieldReference, LimitClause, NullPosition, OrderItem, SelectField,
    SortDirection, TableExpr, TableUnit,
};
use crate::codec::{self, FileHandler, FileInfo, Format};
use crate::core::{
    compare, Cell, Error, Header, Record, RecordSet, Result, Ternary, Value, INTERNAL_ID_COLUMN,
};

use super::analytic;
use super::context::ExecContext;
use super::filter::Filter;
use super::join;
use super::parallel;
use super::query;
use super::sort::{self, SortValue};

/// In-memory tabular result or table image
#[derive(Debug, Clone, Default)]
pub struct View {
    pub header: Header,
    pub records: RecordSet,
    pub file_info: Option<FileInfo>,

    /// Projection plan: indices into header/records chosen by SELECT
    pub select_fields: Vec<usize>,
    /// Output labels matching `select_fields`
    pub select_labels: Vec<String>,
    pub is_grouped: bool,

    /// Per-record dedup keys, valid between generation and fix
    pub comparison_keys: Vec<String>,
    /// Per-record sort keys, valid between order_by and fix/limit
    pub sort_values_in_each_record: Vec<Vec<SortValue>>,
    /// Per-record cache of cell sort keys, shared between an analytic
    /// ORDER BY and the outer ORDER BY
    pub sort_values_in_each_cell: Option<Vec<FxHashMap<usize, SortValue>>>,
    pub sort_directions: Vec<SortDirection>,
    pub sort_null_positions: Vec<NullPosition>,
    pub(crate) offset: usize,

    pub use_internal_id: bool,
    pub for_update: bool,
    pub operated_records: usize,
    pub operated_fields: usize,
}

impl View {
    // =========================================================================
    // Construction
    // =========================================================================

    /// The synthetic single-row view a FROM-less SELECT runs against
    pub fn dual() -> View {
        View {
            records: vec![Record::new(Vec::new())],
            ..Default::default()
        }
    }

    /// Ungrouped expansion of one grouped record: one output row per
    /// group member
    pub fn from_grouped_record(source: &View, record_index: usize) -> View {
        let record = &source.records[record_index];
        let group_len = record.group_len();
        let mut records = Vec::with_capacity(group_len);
        for i in 0..group_len {
            records.push(
                record
                    .iter()
                    .map(|cell| Cell::new(cell.grouped_value(i).clone()))
                    .collect(),
            );
        }
        View {
            header: source.header.clone(),
            records,
            ..Default::default()
        }
    }

    /// Copy of this view with the internal-id column prepended, holding
    /// each record's physical ordinal
    pub fn with_internal_id(&self) -> Result<View> {
        let qualifier = self
            .header
            .iter()
            .find(|f| !f.view.is_empty())
            .map(|f| f.view.clone())
            .unwrap_or_default();
        if self.header.contains_internal_id(&qualifier).is_ok() {
            return Ok(self.clone());
        }

        let mut fields = vec![crate::core::HeaderField {
            view: qualifier,
            column: INTERNAL_ID_COLUMN.to_string(),
            ..Default::default()
        }];
        fields.extend(self.header.iter().cloned());

        let records = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let mut cells = Vec::with_capacity(record.len() + 1);
                cells.push(Cell::new(Value::Integer(i as i64)));
                cells.extend(record.iter().cloned());
                Record::new(cells)
            })
            .collect();

        let mut view = self.clone();
        view.header = Header::from_fields(fields);
        view.records = records;
        view.use_internal_id = true;
        Ok(view)
    }

    pub fn field_len(&self) -> usize {
        self.header.len()
    }

    pub fn record_len(&self) -> usize {
        self.records.len()
    }

    // =========================================================================
    // FROM
    // =========================================================================

    /// Resolve a FROM clause: load every table expression and CROSS JOIN
    /// them left to right. An empty clause reads stdin when piped input
    /// exists, the dual view otherwise.
    pub fn load(
        ctx: &ExecContext,
        filter: &Filter,
        from: &[TableExpr],
        use_internal_id: bool,
        for_update: bool,
    ) -> Result<View> {
        let mut aliases = FxHashSet::default();

        if from.is_empty() {
            if filter.session.has_stdin() {
                let stdin = TableExpr {
                    object: TableUnit::Stdin,
                    alias: None,
                };
                return load_table_expr(ctx, filter, &stdin, &mut aliases, use_internal_id, for_update);
            }
            return Ok(View::dual());
        }

        let mut result: Option<View> = None;
        for table in from {
            let loaded =
                load_table_expr(ctx, filter, table, &mut aliases, use_internal_id, for_update)?;
            result = Some(match result {
                None => loaded,
                Some(mut acc) => {
                    join::cross_join(ctx, &mut acc, loaded)?;
                    acc
                }
            });
        }
        Ok(result.expect("FROM clause checked non-empty"))
    }

    // =========================================================================
    // WHERE / HAVING
    // =========================================================================

    pub fn where_filter(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        condition: &Expression,
    ) -> Result<()> {
        let keep = {
            let view: &View = self;
            let mut keep = Vec::with_capacity(view.records.len());
            for i in 0..view.records.len() {
                ctx.check()?;
                let t = filter.with_record(view, i).evaluate_condition(condition)?;
                keep.push(t == Ternary::True);
            }
            keep
        };

        let mut kept = Vec::with_capacity(self.records.len());
        for (record, keep) in std::mem::take(&mut self.records).into_iter().zip(keep) {
            if keep {
                kept.push(record);
            }
        }
        self.records = kept;
        Ok(())
    }

    /// HAVING retries once with group-all when an aggregate found the
    /// view ungrouped
    pub fn having(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        condition: &Expression,
    ) -> Result<()> {
        match self.where_filter(ctx, filter, condition) {
            Err(e) if e.is_not_grouping() => {
                self.group_all();
                self.where_filter(ctx, filter, condition)
            }
            other => other,
        }
    }

    // =========================================================================
    // GROUP BY
    // =========================================================================

    /// Hash-group records by the serialized GROUP BY key tuple,
    /// preserving first-seen group order
    pub fn group_by(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        items: &[Expression],
    ) -> Result<()> {
        if items.is_empty() {
            self.group_all();
            return Ok(());
        }

        let keys = {
            let view: &View = self;
            let mut keys = Vec::with_capacity(view.records.len());
            for i in 0..view.records.len() {
                ctx.check()?;
                let f = filter.with_record(view, i);
                let values = items
                    .iter()
                    .map(|item| f.evaluate(item))
                    .collect::<Result<Vec<_>>>()?;
                keys.push(compare::comparison_key(&values));
            }
            keys
        };

        let mut groups: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        let mut group_order: Vec<&str> = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            match groups.get_mut(key.as_str()) {
                Some(indices) => indices.push(i),
                None => {
                    groups.insert(key, vec![i]);
                    group_order.push(key);
                }
            }
        }

        let field_len = self.field_len();
        let mut records = Vec::with_capacity(group_order.len());
        for key in group_order {
            let indices = &groups[key];
            let mut cells = Vec::with_capacity(field_len);
            for j in 0..field_len {
                let values = indices
                    .iter()
                    .map(|&i| self.records[i][j].value().clone())
                    .collect();
                cells.push(Cell::grouped(values));
            }
            records.push(Record::new(cells));
        }

        self.records = records;
        self.is_grouped = true;
        for item in items {
            if matches!(
                item,
                Expression::FieldReference(_) | Expression::ColumnNumber(_)
            ) {
                if let Ok(idx) = self.field_index_expr(item) {
                    self.header[idx].is_group_key = true;
                }
            }
        }
        Ok(())
    }

    /// Collapse the whole record set into one group. The single group
    /// exists even over zero records, so aggregates answer over the
    /// empty set (COUNT 0, everything else NULL).
    pub fn group_all(&mut self) {
        let field_len = self.field_len();
        let mut cells = Vec::with_capacity(field_len);
        for j in 0..field_len {
            let values = self
                .records
                .iter()
                .map(|record| record[j].value().clone())
                .collect();
            cells.push(Cell::grouped(values));
        }
        self.records = vec![Record::new(cells)];
        self.is_grouped = true;
    }

    // =========================================================================
    // SELECT
    // =========================================================================

    /// Evaluate the select clause: expand `*`, memoize computed columns
    /// into appended cells, set the projection plan, dedupe on DISTINCT.
    /// Retries once with group-all when evaluation finds an aggregate
    /// over the ungrouped view.
    pub fn select_clause(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        fields: &[SelectField],
        distinct: bool,
    ) -> Result<()> {
        let fields = self.expand_all_columns(fields);

        let original_len = self.field_len();
        if let Err(e) = self.eval_select_fields(ctx, filter, &fields) {
            if !e.is_not_grouping() {
                return Err(e);
            }
            // Undo the growth this clause caused, promote, retry once
            self.header.truncate(original_len);
            for record in &mut self.records {
                record.truncate(original_len);
            }
            self.select_fields.clear();
            self.select_labels.clear();
            self.group_all();
            self.eval_select_fields(ctx, filter, &fields)?;
        }

        if distinct {
            self.generate_comparison_keys(ctx)?;
            let mut seen: FxHashSet<String> = FxHashSet::default();
            let mut records = Vec::with_capacity(self.records.len());
            for (i, record) in self.records.iter().enumerate() {
                if seen.insert(self.comparison_keys[i].clone()) {
                    records.push(
                        self.select_fields
                            .iter()
                            .map(|&idx| record[idx].clone())
                            .collect(),
                    );
                }
            }

            let selected = std::mem::take(&mut self.select_fields);
            let mut fields = Vec::with_capacity(selected.len());
            for &idx in &selected {
                fields.push(self.header[idx].clone());
            }
            self.select_fields = (0..selected.len()).collect();
            self.header = Header::from_fields(fields);
            self.records = records;
            self.comparison_keys.clear();
            self.sort_values_in_each_cell = None;
        }

        Ok(())
    }

    fn expand_all_columns(&self, fields: &[SelectField]) -> Vec<SelectField> {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            match &field.object {
                FieldObject::AllColumns => {
                    for (view, column) in self.header.table_columns() {
                        out.push(SelectField::expr(Expression::FieldReference(
                            FieldReference { view, column },
                        )));
                    }
                }
                FieldObject::Expression(_) => out.push(field.clone()),
            }
        }
        out
    }

    fn eval_select_fields(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        fields: &[SelectField],
    ) -> Result<()> {
        let mut select_fields = Vec::with_capacity(fields.len());
        let mut select_labels = Vec::with_capacity(fields.len());
        for field in fields {
            let FieldObject::Expression(expr) = &field.object else {
                continue;
            };
            let idx = self.eval_column(ctx, filter, expr, field.alias.as_deref())?;
            select_fields.push(idx);
            select_labels.push(field.label());
        }
        self.select_fields = select_fields;
        self.select_labels = select_labels;
        Ok(())
    }

    /// Project every table column
    pub fn select_all_columns(&mut self, ctx: &ExecContext, filter: &Filter) -> Result<()> {
        self.select_clause(ctx, filter, &[SelectField::all_columns()], false)
    }

    /// Resolve one projection/order expression to a column index,
    /// evaluating and memoizing a new scratch column when the header has
    /// no match yet
    pub fn eval_column(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        expr: &Expression,
        alias: Option<&str>,
    ) -> Result<usize> {
        let idx = match expr {
            Expression::FieldReference(_) | Expression::ColumnNumber(_) => {
                let idx = self.field_index_expr(expr)?;
                if self.is_grouped
                    && self.header[idx].is_from_table
                    && !self.header[idx].is_group_key
                {
                    return Err(Error::FieldNotGroupKey(expr.to_string()));
                }
                idx
            }
            _ => {
                let label = expr.to_string();
                match self.header.contains_label(&label) {
                    Some(idx) => idx,
                    None => {
                        if let Expression::AnalyticFunction(af) = expr {
                            analytic::evaluate(self, ctx, filter, af)?;
                        } else {
                            let values = {
                                let view: &View = self;
                                let mut values = Vec::with_capacity(view.records.len());
                                for i in 0..view.records.len() {
                                    ctx.check()?;
                                    values.push(filter.with_record(view, i).evaluate(expr)?);
                                }
                                values
                            };
                            for (record, value) in self.records.iter_mut().zip(values) {
                                record.push(Cell::new(value));
                            }
                        }
                        self.header.add_field(label, None)
                    }
                }
            }
        };

        if let Some(alias) = alias {
            let field = &mut self.header[idx];
            if !field.column.eq_ignore_ascii_case(alias)
                && !field.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias))
            {
                field.aliases.push(alias.to_string());
            }
        }
        Ok(idx)
    }

    /// Serialize each record's projected cells into a dedup key
    pub fn generate_comparison_keys(&mut self, ctx: &ExecContext) -> Result<()> {
        let fields = if self.select_fields.is_empty() {
            None
        } else {
            Some(&self.select_fields[..])
        };
        let view: &View = self;
        self.comparison_keys = parallel::map_indexed(ctx, view.records.len(), |i| {
            Ok(view.records[i].comparison_key(fields))
        })?;
        Ok(())
    }

    // =========================================================================
    // ORDER BY / OFFSET / LIMIT
    // =========================================================================

    pub fn order_by(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        items: &[OrderItem],
    ) -> Result<()> {
        let mut indices = Vec::with_capacity(items.len());
        for item in items {
            indices.push(self.eval_column(ctx, filter, &item.value, None)?);
        }

        let mut directions = Vec::with_capacity(items.len());
        let mut null_positions = Vec::with_capacity(items.len());
        for item in items {
            let direction = item.direction.unwrap_or(SortDirection::Ascending);
            let position = item.null_position.unwrap_or(match direction {
                SortDirection::Ascending => NullPosition::First,
                SortDirection::Descending => NullPosition::Last,
            });
            directions.push(direction);
            null_positions.push(position);
        }

        let ignore_case = filter.session.ignore_case();
        let use_cache = self.sort_values_in_each_cell.is_some();
        if use_cache {
            let cache = self
                .sort_values_in_each_cell
                .as_mut()
                .expect("cache presence just checked");
            cache.resize_with(self.records.len(), FxHashMap::default);
        }

        let record_len = self.records.len();
        let sort_values = {
            let view: &View = self;
            let cache = view.sort_values_in_each_cell.as_deref();
            parallel::map_indexed(ctx, record_len, |i| {
                let mut keys = Vec::with_capacity(indices.len());
                for &idx in &indices {
                    let key = cache
                        .and_then(|c| c[i].get(&idx).cloned())
                        .unwrap_or_else(|| {
                            SortValue::new(view.records[i][idx].value(), ignore_case)
                        });
                    keys.push(key);
                }
                Ok(keys)
            })?
        };

        // Feed the computed keys back so the outer ORDER BY of the same
        // query reuses them
        if let Some(cache) = self.sort_values_in_each_cell.as_mut() {
            for (i, keys) in sort_values.iter().enumerate() {
                for (&idx, key) in indices.iter().zip(keys) {
                    cache[i].entry(idx).or_insert_with(|| key.clone());
                }
            }
        }

        let mut permutation: Vec<usize> = (0..record_len).collect();
        permutation.sort_by(|&a, &b| {
            sort::compare_sort_values(&sort_values[a], &sort_values[b], &directions, &null_positions)
        });

        self.records = apply_permutation(std::mem::take(&mut self.records), &permutation);
        self.sort_values_in_each_record = apply_permutation(sort_values, &permutation);
        if let Some(cache) = self.sort_values_in_each_cell.take() {
            self.sort_values_in_each_cell = Some(apply_permutation(cache, &permutation));
        }
        self.sort_directions = directions;
        self.sort_null_positions = null_positions;
        Ok(())
    }

    pub fn offset_clause(
        &mut self,
        _ctx: &ExecContext,
        filter: &Filter,
        value: &Expression,
    ) -> Result<()> {
        let v = filter.evaluate(value)?;
        let number = v
            .as_integer()
            .ok_or_else(|| Error::InvalidOffsetNumber(value.to_string()))?;
        self.offset = number.max(0) as usize;

        if self.records.len() <= self.offset {
            self.records.clear();
        } else {
            self.records.drain(..self.offset);
            if !self.sort_values_in_each_record.is_empty() {
                self.sort_values_in_each_record.drain(..self.offset);
            }
        }
        Ok(())
    }

    pub fn limit_clause(
        &mut self,
        _ctx: &ExecContext,
        filter: &Filter,
        clause: &LimitClause,
    ) -> Result<()> {
        let v = filter.evaluate(&clause.value)?;

        let mut limit = if clause.percent {
            let percentage = v
                .as_float()
                .ok_or_else(|| Error::InvalidLimitPercentage(clause.value.to_string()))?;
            let percentage = percentage.clamp(0.0, 100.0);
            ((self.records.len() + self.offset) as f64 * percentage / 100.0).ceil() as usize
        } else {
            let number = v
                .as_integer()
                .ok_or_else(|| Error::InvalidLimitNumber(clause.value.to_string()))?;
            number.max(0) as usize
        };

        if self.records.len() <= limit {
            return Ok(());
        }

        if clause.with_ties && !self.sort_values_in_each_record.is_empty() && 0 < limit {
            let bottom = self.sort_values_in_each_record[limit - 1].clone();
            while limit < self.records.len()
                && sort::equivalent(&bottom, &self.sort_values_in_each_record[limit])
            {
                limit += 1;
            }
        }

        self.records.truncate(limit);
        if !self.sort_values_in_each_record.is_empty() {
            self.sort_values_in_each_record.truncate(limit);
        }
        Ok(())
    }

    // =========================================================================
    // Set operations
    // =========================================================================

    /// UNION [ALL]: concatenate, then first-occurrence dedup unless ALL.
    /// The result is no longer backed by any file.
    pub fn union(&mut self, ctx: &ExecContext, other: View, all: bool) -> Result<()> {
        self.records.extend(other.records);
        self.file_info = None;

        if !all {
            self.generate_comparison_keys(ctx)?;
            let mut seen: FxHashSet<String> = FxHashSet::default();
            let mut records = Vec::with_capacity(self.records.len());
            for (i, record) in std::mem::take(&mut self.records).into_iter().enumerate() {
                if seen.insert(self.comparison_keys[i].clone()) {
                    records.push(record);
                }
            }
            self.records = records;
            self.comparison_keys.clear();
        }
        Ok(())
    }

    /// EXCEPT [ALL]. The right side is deduplicated before subtraction:
    /// a left row is dropped when its key appears anywhere on the right,
    /// regardless of right-side multiplicity.
    pub fn except(&mut self, ctx: &ExecContext, mut other: View, all: bool) -> Result<()> {
        self.generate_comparison_keys(ctx)?;
        other.generate_comparison_keys(ctx)?;

        let right: FxHashSet<String> = other.comparison_keys.into_iter().collect();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut records = Vec::with_capacity(self.records.len());
        for (i, record) in std::mem::take(&mut self.records).into_iter().enumerate() {
            let key = &self.comparison_keys[i];
            if right.contains(key) {
                continue;
            }
            if !all && !seen.insert(key.clone()) {
                continue;
            }
            records.push(record);
        }
        self.records = records;
        self.file_info = None;
        self.comparison_keys.clear();
        Ok(())
    }

    /// INTERSECT [ALL]
    pub fn intersect(&mut self, ctx: &ExecContext, mut other: View, all: bool) -> Result<()> {
        self.generate_comparison_keys(ctx)?;
        other.generate_comparison_keys(ctx)?;

        let right: FxHashSet<String> = other.comparison_keys.into_iter().collect();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut records = Vec::with_capacity(self.records.len());
        for (i, record) in std::mem::take(&mut self.records).into_iter().enumerate() {
            let key = &self.comparison_keys[i];
            if !right.contains(key) {
                continue;
            }
            if !all && !seen.insert(key.clone()) {
                continue;
            }
            records.push(record);
        }
        self.records = records;
        self.file_info = None;
        self.comparison_keys.clear();
        Ok(())
    }

    // =========================================================================
    // DML
    // =========================================================================

    /// INSERT ... VALUES: returns the number of inserted records
    pub fn insert_values(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        fields: &[FieldReference],
        rows: &[Vec<Expression>],
    ) -> Result<usize> {
        let mut values_list = Vec::with_capacity(rows.len());
        for row in rows {
            ctx.check()?;
            if row.len() != fields.len() {
                return Err(Error::InsertRowValueLength {
                    expected: fields.len(),
                });
            }
            let values = row
                .iter()
                .map(|e| filter.evaluate(e))
                .collect::<Result<Vec<_>>>()?;
            values_list.push(values);
        }
        self.insert(fields, values_list)
    }

    /// INSERT ... SELECT
    pub fn insert_from_query(
        &mut self,
        _ctx: &ExecContext,
        filter: &Filter,
        fields: &[FieldReference],
        select: &crate::ast::SelectQuery,
    ) -> Result<usize> {
        let source = query::select_as_subquery(filter, select)?;
        if source.field_len() != fields.len() {
            return Err(Error::InsertSelectFieldLength {
                expected: fields.len(),
            });
        }
        let values_list = source
            .records
            .iter()
            .map(|record| record.iter().map(|cell| cell.value().clone()).collect())
            .collect();
        self.insert(fields, values_list)
    }

    fn insert(
        &mut self,
        fields: &[FieldReference],
        values_list: Vec<Vec<Value>>,
    ) -> Result<usize> {
        let field_indices = self.field_indices(fields)?;
        let field_len = self.field_len();
        let count = values_list.len();

        for values in values_list {
            let mut cells = Vec::with_capacity(field_len);
            for j in 0..field_len {
                let value = field_indices
                    .iter()
                    .position(|&idx| idx == j)
                    .map(|slot| values[slot].clone())
                    .unwrap_or(Value::Null);
                cells.push(Cell::new(value));
            }
            self.records.push(Record::new(cells));
        }
        Ok(count)
    }

    /// INSERT OR UPDATE: rows whose key columns match an existing record
    /// update it in place; the rest append
    pub fn replace_values(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        fields: &[FieldReference],
        keys: &[FieldReference],
        rows: &[Vec<Expression>],
    ) -> Result<usize> {
        let mut values_list = Vec::with_capacity(rows.len());
        for row in rows {
            ctx.check()?;
            if row.len() != fields.len() {
                return Err(Error::InsertRowValueLength {
                    expected: fields.len(),
                });
            }
            values_list.push(
                row.iter()
                    .map(|e| filter.evaluate(e))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        self.replace(fields, keys, values_list)
    }

    pub fn replace_from_query(
        &mut self,
        _ctx: &ExecContext,
        filter: &Filter,
        fields: &[FieldReference],
        keys: &[FieldReference],
        select: &crate::ast::SelectQuery,
    ) -> Result<usize> {
        let source = query::select_as_subquery(filter, select)?;
        if source.field_len() != fields.len() {
            return Err(Error::InsertSelectFieldLength {
                expected: fields.len(),
            });
        }
        let values_list = source
            .records
            .iter()
            .map(|record| record.iter().map(|cell| cell.value().clone()).collect())
            .collect();
        self.replace(fields, keys, values_list)
    }

    fn replace(
        &mut self,
        fields: &[FieldReference],
        keys: &[FieldReference],
        values_list: Vec<Vec<Value>>,
    ) -> Result<usize> {
        let field_indices = self.field_indices(fields)?;
        let key_indices = self.field_indices(keys)?;
        for key_idx in &key_indices {
            if !field_indices.contains(key_idx) {
                return Err(Error::invalid_argument(
                    "replace key columns must be listed in the insert fields",
                ));
            }
        }

        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        for (i, record) in self.records.iter().enumerate() {
            index.insert(record.comparison_key(Some(&key_indices)), i);
        }

        let field_len = self.field_len();
        let count = values_list.len();
        for values in values_list {
            let mut cells = Vec::with_capacity(field_len);
            for j in 0..field_len {
                let value = field_indices
                    .iter()
                    .position(|&idx| idx == j)
                    .map(|slot| values[slot].clone())
                    .unwrap_or(Value::Null);
                cells.push(Cell::new(value));
            }
            let record = Record::new(cells);
            let key = record.comparison_key(Some(&key_indices));
            match index.get(&key) {
                Some(&existing) => {
                    for &idx in &field_indices {
                        self.records[existing][idx] = Cell::new(record[idx].value().clone());
                    }
                }
                None => {
                    index.insert(key, self.records.len());
                    self.records.push(record);
                }
            }
        }
        Ok(count)
    }

    // =========================================================================
    // Fix
    // =========================================================================

    /// Finalize the projection: trim and reorder records to the select
    /// plan, rebuild the header with output labels, clear every piece of
    /// per-query scratch state. Idempotent.
    pub fn fix(&mut self, ctx: &ExecContext) -> Result<()> {
        if self.select_fields.is_empty() {
            self.select_fields = (0..self.field_len()).collect();
        }

        let identity = self.select_fields.len() == self.field_len()
            && self.select_fields.iter().enumerate().all(|(i, &idx)| i == idx);

        if !identity {
            let select_fields = self.select_fields.clone();
            let view: &View = self;
            let records = parallel::map_indexed(ctx, view.records.len(), |i| {
                let record = &view.records[i];
                let cells = select_fields
                    .iter()
                    .map(|&idx| {
                        if 1 < record.group_len() {
                            Cell::new(record[idx].value().clone())
                        } else {
                            record[idx].clone()
                        }
                    })
                    .collect();
                Ok(Record::new(cells))
            })?;
            self.records = records;
        }

        let mut fields = Vec::with_capacity(self.select_fields.len());
        for (i, &idx) in self.select_fields.iter().enumerate() {
            let mut field = self.header[idx].clone();
            field.aliases.clear();
            field.number = i + 1;
            field.is_from_table = true;
            field.is_join_column = false;
            field.is_group_key = false;
            if i < self.select_labels.len() {
                field.column = self.select_labels[i].clone();
            }
            fields.push(field);
        }
        self.header = Header::from_fields(fields);

        self.select_fields.clear();
        self.select_labels.clear();
        self.is_grouped = false;
        self.comparison_keys.clear();
        self.sort_values_in_each_record.clear();
        self.sort_values_in_each_cell = None;
        self.sort_directions.clear();
        self.sort_null_positions.clear();
        self.offset = 0;
        Ok(())
    }

    // =========================================================================
    // Field resolution
    // =========================================================================

    pub fn field_index_expr(&self, expr: &Expression) -> Result<usize> {
        match expr {
            Expression::FieldReference(r) => self.header.contains(r.view.as_deref(), &r.column),
            Expression::ColumnNumber(n) => self.header.contains_number(&n.view, n.number),
            _ => Err(Error::FieldNotExist(expr.to_string())),
        }
    }

    pub fn field_index_ref(&self, reference: &FieldReference) -> Result<usize> {
        self.header
            .contains(reference.view.as_deref(), &reference.column)
    }

    pub fn field_indices(&self, references: &[FieldReference]) -> Result<Vec<usize>> {
        references
            .iter()
            .map(|r| self.field_index_ref(r))
            .collect()
    }

    /// The qualifier of the view a field belongs to
    pub fn field_view_name(&self, reference: &FieldReference) -> Result<String> {
        let idx = self.field_index_ref(reference)?;
        Ok(self.header[idx].view.clone())
    }

    /// Read a record's internal id for the named view. Empty cells (the
    /// padded side of an outer join) answer InternalIdEmpty.
    pub fn internal_record_id(&self, view_name: &str, record_index: usize) -> Result<usize> {
        let idx = self.header.contains_internal_id(view_name)?;
        match self.records[record_index][idx].value() {
            Value::Integer(id) => Ok(*id as usize),
            _ => Err(Error::InternalIdEmpty),
        }
    }
}

fn apply_permutation<T>(items: Vec<T>, permutation: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    permutation
        .iter()
        .map(|&i| slots[i].take().expect("permutation is a bijection"))
        .collect()
}

// =============================================================================
// FROM-clause resolution
// =============================================================================

fn load_table_expr(
    ctx: &ExecContext,
    filter: &Filter,
    table: &TableExpr,
    aliases: &mut FxHashSet<String>,
    use_internal_id: bool,
    for_update: bool,
) -> Result<View> {
    let name = table.name();
    match &table.object {
        TableUnit::Dual => Ok(View::dual()),
        TableUnit::Identifier(identifier) => {
            register_alias(aliases, &name)?;
            let flags = filter.session.flags.read().clone();
            load_identifier(
                ctx,
                filter,
                identifier,
                &name,
                use_internal_id,
                for_update,
                &flags,
            )
        }
        TableUnit::Stdin => {
            register_alias(aliases, &name)?;
            let flags = filter.session.flags.read().clone();
            load_stdin(ctx, filter, &name, use_internal_id, &flags)
        }
        TableUnit::Subquery(q) => {
            register_alias(aliases, &name)?;
            let mut view = query::select_as_subquery(filter, q)?;
            view.header.update(&name, None)?;
            Ok(view)
        }
        TableUnit::JsonTable { query: q, source } => {
            register_alias(aliases, &name)?;
            load_json_table(ctx, filter, q, source, &name)
        }
        TableUnit::TableObject {
            format,
            format_arg,
            path,
            args,
        } => {
            register_alias(aliases, &name)?;
            load_table_object(
                ctx,
                filter,
                *format,
                format_arg.as_ref(),
                path,
                args,
                &name,
                use_internal_id,
                for_update,
            )
        }
        TableUnit::Join(join_expr) => {
            let mut left = load_table_expr(
                ctx,
                filter,
                &join_expr.left,
                aliases,
                use_internal_id,
                for_update,
            )?;
            let right = load_table_expr(
                ctx,
                filter,
                &join_expr.right,
                aliases,
                use_internal_id,
                for_update,
            )?;
            join::execute(ctx, filter, &mut left, right, join_expr.as_ref())?;
            Ok(left)
        }
    }
}

fn register_alias(aliases: &mut FxHashSet<String>, name: &str) -> Result<()> {
    if !aliases.insert(name.to_uppercase()) {
        return Err(Error::DuplicateTableName(name.to_string()));
    }
    Ok(())
}

fn rename_for_alias(view: &mut View, alias: &str) -> Result<()> {
    let current = view
        .header
        .iter()
        .find(|f| !f.view.is_empty())
        .map(|f| f.view.clone())
        .unwrap_or_default();
    if !current.eq_ignore_ascii_case(alias) {
        view.header.update(alias, None)?;
    }
    Ok(())
}

fn load_identifier(
    ctx: &ExecContext,
    filter: &Filter,
    identifier: &str,
    alias: &str,
    use_internal_id: bool,
    for_update: bool,
    flags: &super::flags::Flags,
) -> Result<View> {
    let key = identifier.to_uppercase();

    // Scope order: recursion placeholder, WITH tables, recursive CTE
    // declarations, temp-view scopes, then the file cache.
    if let Some(view) = filter.inline_tables.get(&key) {
        let mut view = view.clone();
        rename_for_alias(&mut view, alias)?;
        return Ok(view);
    }
    if let Some(view) = filter.common_tables.get(&key) {
        let mut view = view.clone();
        rename_for_alias(&mut view, alias)?;
        return Ok(view);
    }
    if let Some(ct) = filter.recursive_tables.get(&key) {
        let mut view = query::execute_recursive_query(filter, ct)?;
        rename_for_alias(&mut view, alias)?;
        return Ok(view);
    }
    if filter.session.temp_view_exists(&key) {
        let mut view = match use_internal_id {
            true => filter
                .session
                .temp_view_with_internal_id(&key)
                .expect("temp view existence just checked")?,
            false => filter
                .session
                .temp_view(&key)
                .expect("temp view existence just checked"),
        };
        rename_for_alias(&mut view, alias)?;
        return Ok(view);
    }

    let path = search_file_path(identifier, &flags.repository)?;
    let path_key = path.display().to_string();

    if filter.session.cached_views.exists(&path_key)
        && for_update
        && !filter.session.cached_views.is_for_update(&path_key)
    {
        // Loaded read-only earlier in the transaction; reload for update
        filter.session.cached_views.dispose(&path_key);
    }

    if !filter.session.cached_views.exists(&path_key) {
        ctx.check()?;
        let handler = if for_update {
            FileHandler::for_update(&path, flags.wait_timeout, flags.retry_delay)?
        } else {
            FileHandler::for_read(&path, flags.wait_timeout, flags.retry_delay)?
        };
        let bytes = handler.read_bytes()?;
        let view = build_file_view(&path_key, &bytes, flags, for_update)?;
        if for_update {
            filter
                .session
                .handlers
                .lock()
                .insert(path_key.to_uppercase(), handler);
        }
        filter.session.cached_views.set(view);
    }

    let mut view = if use_internal_id {
        filter.session.cached_views.get_with_internal_id(&path_key)?
    } else {
        filter.session.cached_views.get(&path_key)?
    };
    rename_for_alias(&mut view, alias)?;
    Ok(view)
}

fn build_file_view(path: &str, bytes: &[u8], flags: &super::flags::Flags, for_update: bool) -> Result<View> {
    let (text, encoding) = match flags.encoding {
        Some(encoding) => (codec::text::decode_as(path, bytes, encoding)?, encoding),
        None => codec::text::decode(path, bytes)?,
    };
    let line_break = codec::text::detect_line_break(&text);
    let format = flags
        .import_format
        .unwrap_or_else(|| Format::from_extension(path));

    let mut info = FileInfo::new(path, format);
    info.delimiter = if format == Format::Tsv {
        '\t'
    } else {
        flags.delimiter
    };
    info.delimiter_positions = flags.delimiter_positions.clone();
    info.single_line = flags.single_line;
    info.json_query = flags.json_query.clone();
    info.encoding = encoding;
    info.line_break = line_break;
    info.no_header = flags.no_header;
    info.enclose_all = flags.enclose_all;
    info.json_escape = flags.json_escape;

    let table = codec::load_table(&info, &text, flags.without_null)?;
    info.delimiter_positions = table.delimiter_positions;

    let table_name = crate::ast::table_name_of_path(path);
    let header = Header::new(&table_name, &table.columns)?;
    let records: RecordSet = table
        .records
        .into_iter()
        .map(Record::from_values)
        .collect();

    info.capture_snapshot(&header, &records);
    Ok(View {
        header,
        records,
        file_info: Some(info),
        for_update,
        ..Default::default()
    })
}

fn load_stdin(
    _ctx: &ExecContext,
    filter: &Filter,
    alias: &str,
    use_internal_id: bool,
    flags: &super::flags::Flags,
) -> Result<View> {
    let session = filter.session;
    if !session.temp_view_exists("STDIN") {
        let Some(text) = session.stdin_text() else {
            return Err(Error::StdinEmpty);
        };
        let format = flags.import_format.unwrap_or(Format::Csv);

        let mut info = FileInfo::temporary("STDIN");
        info.format = format;
        info.delimiter = if format == Format::Tsv {
            '\t'
        } else {
            flags.delimiter
        };
        info.delimiter_positions = flags.delimiter_positions.clone();
        info.single_line = flags.single_line;
        info.json_query = flags.json_query.clone();
        info.no_header = flags.no_header;
        info.line_break = codec::text::detect_line_break(&text);

        let table = codec::load_table(&info, &text, flags.without_null)?;
        info.delimiter_positions = table.delimiter_positions;

        let header = Header::new("STDIN", &table.columns)?;
        let records: RecordSet = table
            .records
            .into_iter()
            .map(Record::from_values)
            .collect();
        info.capture_snapshot(&header, &records);
        session.set_temp_view(View {
            header,
            records,
            file_info: Some(info),
            ..Default::default()
        });
    }

    let mut view = match use_internal_id {
        true => session
            .temp_view_with_internal_id("STDIN")
            .expect("stdin view just registered")?,
        false => session
            .temp_view("STDIN")
            .expect("stdin view just registered"),
    };
    rename_for_alias(&mut view, alias)?;
    Ok(view)
}

fn load_json_table(
    _ctx: &ExecContext,
    filter: &Filter,
    query_expr: &Expression,
    source: &crate::ast::JsonTableSource,
    alias: &str,
) -> Result<View> {
    let query_value = filter.evaluate(query_expr)?.to_string_value();
    let Value::String(json_query) = query_value else {
        return Err(Error::invalid_argument("json query must be a string"));
    };

    let flags = filter.session.flags.read().clone();
    let (path_label, text) = match source {
        crate::ast::JsonTableSource::Text(e) => {
            let v = filter.evaluate(e)?.to_string_value();
            let Value::String(s) = v else {
                return Err(Error::invalid_argument("json text must be a string"));
            };
            (alias.to_string(), s.to_string())
        }
        crate::ast::JsonTableSource::File(path) => {
            let path = search_file_path(path, &flags.repository)?;
            let handler =
                FileHandler::for_read(&path, flags.wait_timeout, flags.retry_delay)?;
            let bytes = handler.read_bytes()?;
            let (text, _) = codec::text::decode(&path.display().to_string(), &bytes)?;
            (path.display().to_string(), text)
        }
    };

    let (columns, rows) = codec::json::read(&path_label, &text, &json_query)?;
    let header = Header::new(alias, &columns)?;
    let records: RecordSet = rows.into_iter().map(Record::from_values).collect();

    let mut info = FileInfo::temporary(alias);
    info.format = Format::Json;
    info.json_query = json_query.to_string();
    Ok(View {
        header,
        records,
        file_info: Some(info),
        ..Default::default()
    })
}

#[allow(clippy::too_many_arguments)]
fn load_table_object(
    ctx: &ExecContext,
    filter: &Filter,
    format: crate::ast::TableFormat,
    format_arg: Option<&Expression>,
    path: &TableUnit,
    args: &[Expression],
    alias: &str,
    use_internal_id: bool,
    for_update: bool,
) -> Result<View> {
    use crate::ast::TableFormat;

    // Rebuild the session flags with the forced format, then load
    // through the regular identifier/stdin path under those flags.
    let mut flags = filter.session.flags.read().clone();
    match format {
        TableFormat::Csv => {
            let arg = format_arg
                .ok_or_else(|| Error::invalid_argument("delimiter is not specified"))?;
            let v = filter.evaluate(arg)?.to_string_value();
            let Value::String(s) = v else {
                return Err(Error::invalid_argument("delimiter must be a string"));
            };
            let unescaped: &str = if s.as_ref() == "\\t" { "\t" } else { s.as_ref() };
            let mut chars = unescaped.chars();
            let (Some(delimiter), None) = (chars.next(), chars.next()) else {
                return Err(Error::invalid_argument("delimiter must be one character"));
            };
            flags.import_format = Some(if delimiter == '\t' {
                Format::Tsv
            } else {
                Format::Csv
            });
            flags.delimiter = delimiter;
        }
        TableFormat::Fixed => {
            let arg = format_arg
                .ok_or_else(|| Error::invalid_argument("delimiter positions are not specified"))?;
            let v = filter.evaluate(arg)?.to_string_value();
            let Value::String(s) = v else {
                return Err(Error::invalid_argument("delimiter positions must be a string"));
            };
            let mut spec = s.trim().to_string();
            if spec.eq_ignore_ascii_case("SPACES") {
                flags.delimiter_positions = Vec::new();
            } else {
                if spec.starts_with('S') || spec.starts_with('s') {
                    flags.single_line = true;
                    spec.remove(0);
                }
                let positions: Vec<usize> = serde_json::from_str(&spec).map_err(|_| {
                    Error::invalid_argument(format!("invalid delimiter positions: {}", s))
                })?;
                flags.delimiter_positions = positions;
            }
            flags.import_format = Some(Format::Fixed);
        }
        TableFormat::Json => {
            let arg = format_arg
                .ok_or_else(|| Error::invalid_argument("json query is not specified"))?;
            let v = filter.evaluate(arg)?.to_string_value();
            let Value::String(s) = v else {
                return Err(Error::invalid_argument("json query must be a string"));
            };
            flags.json_query = s.to_string();
            flags.import_format = Some(Format::Json);
        }
        TableFormat::Ltsv => {
            flags.import_format = Some(Format::Ltsv);
        }
    }

    // Optional trailing arguments: encoding, no-header, without-null
    if let Some(arg) = args.first() {
        let v = filter.evaluate(arg)?.to_string_value();
        match v {
            Value::String(s) => {
                flags.encoding = Some(crate::codec::Encoding::parse(&s).ok_or_else(|| {
                    Error::invalid_argument(format!("cannot be used as an encoding: {}", s))
                })?);
            }
            Value::Null => {}
            _ => return Err(Error::invalid_argument("encoding must be a string")),
        }
    }
    if let Some(arg) = args.get(1) {
        let v = filter.evaluate(arg)?.to_boolean();
        match v {
            Value::Boolean(b) => flags.no_header = b,
            Value::Null => {}
            _ => return Err(Error::invalid_argument("no-header must be a boolean")),
        }
    }
    if let Some(arg) = args.get(2) {
        let v = filter.evaluate(arg)?.to_boolean();
        match v {
            Value::Boolean(b) => flags.without_null = b,
            Value::Null => {}
            _ => return Err(Error::invalid_argument("without-null must be a boolean")),
        }
    }
    if 3 < args.len() {
        return Err(Error::invalid_argument(
            "table object takes at most 3 optional arguments",
        ));
    }

    match path {
        TableUnit::Identifier(identifier) => load_identifier(
            ctx,
            filter,
            identifier,
            alias,
            use_internal_id,
            for_update,
            &flags,
        ),
        TableUnit::Stdin => load_stdin(ctx, filter, alias, use_internal_id, &flags),
        _ => Err(Error::invalid_argument(
            "table object source must be a file or stdin",
        )),
    }
}

/// Resolve a table identifier to an existing file, trying the known
/// extensions when the bare path does not exist
pub fn search_file_path(identifier: &str, repository: &std::path::Path) -> Result<std::path::PathBuf> {
    let base = std::path::Path::new(identifier);
    let candidate = if base.is_absolute() {
        base.to_path_buf()
    } else {
        repository.join(base)
    };

    if candidate.is_file() {
        return std::fs::canonicalize(&candidate)
            .map_err(|e| Error::io(candidate.display().to_string(), e.to_string()));
    }
    for ext in ["csv", "tsv", "json", "ltsv"] {
        let mut with_ext = candidate.as_os_str().to_owned();
        with_ext.push(".");
        with_ext.push(ext);
        let with_ext = std::path::PathBuf::from(with_ext);
        if with_ext.is_file() {
            return std::fs::canonicalize(&with_ext)
                .map_err(|e| Error::io(with_ext.display().to_string(), e.to_string()));
        }
    }
    Err(Error::FileNotFound(identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn plain_view(columns: &[&str], rows: Vec<Vec<Value>>) -> View {
        let columns: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        View {
            header: Header::new("t", &columns).unwrap(),
            records: rows.into_iter().map(Record::from_values).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_group_all_over_empty_keeps_single_group() {
        let mut view = plain_view(&["a"], vec![]);
        view.group_all();
        assert!(view.is_grouped);
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].group_len(), 0);
    }

    #[test]
    fn test_from_grouped_record_expands() {
        let mut view = plain_view(
            &["a"],
            vec![
                vec![Value::Integer(1)],
                vec![Value::Integer(2)],
                vec![Value::Integer(3)],
            ],
        );
        view.group_all();
        let expanded = View::from_grouped_record(&view, 0);
        assert_eq!(expanded.records.len(), 3);
        assert_eq!(expanded.records[2][0].value(), &Value::Integer(3));
        assert!(!expanded.is_grouped);
    }

    #[test]
    fn test_with_internal_id() {
        let view = plain_view(&["a"], vec![vec![Value::Integer(9)], vec![Value::Integer(8)]]);
        let with_id = view.with_internal_id().unwrap();
        assert_eq!(with_id.field_len(), 2);
        assert_eq!(with_id.internal_record_id("t", 1).unwrap(), 1);
        // Idempotent
        let again = with_id.with_internal_id().unwrap();
        assert_eq!(again.field_len(), 2);
    }

    #[test]
    fn test_fix_is_idempotent() {
        let ctx = ExecContext::new(1);
        let mut view = plain_view(
            &["a", "b"],
            vec![vec![Value::Integer(1), Value::Integer(2)]],
        );
        view.select_fields = vec![1];
        view.select_labels = vec!["b".to_string()];
        view.fix(&ctx).unwrap();
        assert_eq!(view.field_len(), 1);
        assert_eq!(view.records[0].len(), 1);
        assert_eq!(view.header[0].column, "b");
        assert_eq!(view.header[0].number, 1);

        let snapshot = view.clone();
        view.fix(&ctx).unwrap();
        assert_eq!(view.header, snapshot.header);
        assert_eq!(view.records, snapshot.records);
    }

    #[test]
    fn test_insert_fills_missing_with_null() {
        let mut view = plain_view(&["a", "b"], vec![]);
        let fields = vec![FieldReference {
            view: None,
            column: "b".to_string(),
        }];
        let count = view
            .insert(&fields, vec![vec![Value::Integer(5)]])
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(view.records[0][0].value(), &Value::Null);
        assert_eq!(view.records[0][1].value(), &Value::Integer(5));
    }

    #[test]
    fn test_replace_updates_matching_key() {
        let mut view = plain_view(
            &["id", "v"],
            vec![
                vec![Value::Integer(1), Value::text("old")],
                vec![Value::Integer(2), Value::text("keep")],
            ],
        );
        let fields = vec![
            FieldReference {
                view: None,
                column: "id".to_string(),
            },
            FieldReference {
                view: None,
                column: "v".to_string(),
            },
        ];
        let keys = vec![FieldReference {
            view: None,
            column: "id".to_string(),
        }];
        view.replace(
            &fields,
            &keys,
            vec![
                vec![Value::Integer(1), Value::text("new")],
                vec![Value::Integer(3), Value::text("fresh")],
            ],
        )
        .unwrap();
        assert_eq!(view.records.len(), 3);
        assert_eq!(view.records[0][1].value(), &Value::text("new"));
        assert_eq!(view.records[2][0].value(), &Value::Integer(3));
    }
}
