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

//! Query orchestration
//!
//! Runs the clause pipeline over views in the written order (FROM+JOIN,
//! WHERE, GROUP BY, HAVING, SELECT, set operations, ORDER BY,
//! OFFSET/LIMIT, fix), executes recursive CTEs by iterating the working
//! view to a fixed point, and drives the DML/DDL statements over cached
//! views with internal-row-identity tracking.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{
    AddColumns, ColumnPosition, CommonTable, CreateTable, DeleteQuery, DropColumns,
    FieldReference, InsertQuery, InsertSource, QueryBody, RenameColumn, ReplaceQuery, SelectEntity,
    SelectQuery, SetOperator, TableExpr, TableUnit, UpdateQuery,
};
use crate::codec::{FileInfo, Format};
use crate::core::{Cell, Error, Header, Record, Result, Value};

use super::filter::Filter;
use super::session::Session;
use super::view::{search_file_path, View};

/// Execute a SELECT query to a fixed view
pub fn select(filter: &Filter, query: &SelectQuery) -> Result<View> {
    select_as_subquery(filter, query)
}

/// Execute a SELECT query in the scope of a parent filter (subqueries,
/// CTE bodies, cursors)
pub fn select_as_subquery(parent: &Filter, query: &SelectQuery) -> Result<View> {
    let mut filter = parent.clone();
    filter.load_common_tables(&query.with)?;

    let ctx = filter.ctx;
    let mut view = select_body(&filter, &query.body)?;

    if !query.order_by.is_empty() {
        view.order_by(ctx, &filter, &query.order_by)?;
    }
    if let Some(offset) = &query.offset {
        view.offset_clause(ctx, &filter, offset)?;
    }
    if let Some(limit) = &query.limit {
        view.limit_clause(ctx, &filter, limit)?;
    }
    view.fix(ctx)?;
    Ok(view)
}

fn select_body(filter: &Filter, body: &QueryBody) -> Result<View> {
    match body {
        QueryBody::Entity(entity) => select_entity(filter, entity),
        QueryBody::Subquery(query) => select_as_subquery(filter, query),
        QueryBody::Set {
            left,
            operator,
            all,
            right,
        } => {
            let ctx = filter.ctx;
            let mut lview = select_body_fixed(filter, left)?;
            let rview = select_body_fixed(filter, right)?;
            apply_set_operation(filter, &mut lview, rview, *operator, *all)?;
            lview.select_all_columns(ctx, filter)?;
            Ok(lview)
        }
    }
}

/// A set operand is always a finalized view
fn select_body_fixed(filter: &Filter, body: &QueryBody) -> Result<View> {
    let mut view = select_body(filter, body)?;
    view.fix(filter.ctx)?;
    Ok(view)
}

fn apply_set_operation(
    filter: &Filter,
    left: &mut View,
    right: View,
    operator: SetOperator,
    all: bool,
) -> Result<()> {
    if left.field_len() != right.field_len() {
        return Err(Error::FieldLengthNotMatch {
            operation: operator.to_string(),
        });
    }
    let ctx = filter.ctx;
    match operator {
        SetOperator::Union => left.union(ctx, right, all),
        SetOperator::Except => left.except(ctx, right, all),
        SetOperator::Intersect => left.intersect(ctx, right, all),
    }
}

fn select_entity(filter: &Filter, entity: &SelectEntity) -> Result<View> {
    let ctx = filter.ctx;
    let mut view = View::load(ctx, filter, &entity.from, false, false)?;

    if let Some(condition) = &entity.where_clause {
        view.where_filter(ctx, filter, condition)?;
    }
    if !entity.group_by.is_empty() {
        view.group_by(ctx, filter, &entity.group_by)?;
    }
    if let Some(condition) = &entity.having {
        view.having(ctx, filter, condition)?;
    }
    view.select_clause(ctx, filter, &entity.fields, entity.distinct)?;
    Ok(view)
}

/// Iterate a recursive CTE: run the anchor, then re-run the recursive
/// side against the previous iteration's rows until it produces nothing,
/// folding each delta in with the declared set operator
pub fn execute_recursive_query(filter: &Filter, table: &CommonTable) -> Result<View> {
    let ctx = filter.ctx;
    let columns = if table.columns.is_empty() {
        None
    } else {
        Some(&table.columns[..])
    };

    let QueryBody::Set {
        left,
        operator,
        all,
        right,
    } = &table.query.body
    else {
        // Declared RECURSIVE without a set body: plain execution
        let mut view = select_as_subquery(filter, &table.query)?;
        view.header.update(&table.name, columns)?;
        view.file_info = None;
        return Ok(view);
    };

    let mut accumulated = select_body_fixed(filter, left)?;
    accumulated.header.update(&table.name, columns)?;
    accumulated.file_info = None;

    let limit = filter.session.flags.read().limit_recursion;
    let mut working = accumulated.clone();
    let mut iterations: i64 = 0;
    loop {
        if 0 <= limit && limit <= iterations {
            return Err(Error::RecursionExceededLimit(limit));
        }
        iterations += 1;
        ctx.check()?;

        let child = filter.with_inline_table(&table.name, working.clone());
        let mut delta = select_body_fixed(&child, right)?;
        if delta.field_len() != accumulated.field_len() {
            return Err(Error::FieldLengthNotMatch {
                operation: operator.to_string(),
            });
        }
        if delta.records.is_empty() {
            break;
        }
        delta.header.update(&table.name, columns)?;
        working = delta.clone();
        apply_set_operation(filter, &mut accumulated, delta, *operator, *all)?;
    }

    if !table.query.order_by.is_empty() {
        accumulated.order_by(ctx, filter, &table.query.order_by)?;
    }
    if let Some(offset) = &table.query.offset {
        accumulated.offset_clause(ctx, filter, offset)?;
    }
    if let Some(limit_clause) = &table.query.limit {
        accumulated.limit_clause(ctx, filter, limit_clause)?;
    }
    accumulated.fix(ctx)?;
    accumulated.header.update(&table.name, columns)?;
    Ok(accumulated)
}

// =============================================================================
// DML
// =============================================================================

/// Write a mutated view back to whichever store owns it
fn replace_target(session: &Session, view: &View) -> Result<()> {
    let temporary = view
        .file_info
        .as_ref()
        .map(|f| f.is_temporary)
        .unwrap_or(true);
    if temporary {
        session.replace_temp_view(view.clone())
    } else {
        session.cached_views.replace(view.clone());
        Ok(())
    }
}

/// Resolve an UPDATE/DELETE target table to its cached or temp view
/// (without internal ids)
fn fetch_target_view(filter: &Filter, table: &TableExpr) -> Result<View> {
    let TableUnit::Identifier(identifier) = &table.object else {
        return Err(Error::invalid_argument(
            "update target must be a table identifier",
        ));
    };
    if filter.session.temp_view_exists(identifier) {
        return Ok(filter
            .session
            .temp_view(identifier)
            .expect("temp view existence just checked"));
    }
    let repository = filter.session.flags.read().repository.clone();
    let path = search_file_path(identifier, &repository)?;
    filter.session.cached_views.get(&path.display().to_string())
}

/// INSERT: load the target for update, append the rows, replace the
/// cached view
pub fn insert(parent: &Filter, query: &InsertQuery) -> Result<View> {
    let mut filter = parent.clone();
    filter.load_common_tables(&query.with)?;
    let ctx = filter.ctx;

    let table = TableExpr::identifier(query.table.clone());
    let mut view = View::load(ctx, &filter, &[table], false, true)?;

    let fields = declared_or_all_fields(&view, &query.fields);
    let count = match &query.source {
        InsertSource::Values(rows) => view.insert_values(ctx, &filter, &fields, rows)?,
        InsertSource::Query(select) => view.insert_from_query(ctx, &filter, &fields, select)?,
    };
    view.operated_records = count;

    replace_target(filter.session, &view)?;
    Ok(view)
}

/// INSERT OR UPDATE keyed on the declared key columns
pub fn replace(parent: &Filter, query: &ReplaceQuery) -> Result<View> {
    let mut filter = parent.clone();
    filter.load_common_tables(&query.with)?;
    let ctx = filter.ctx;

    let table = TableExpr::identifier(query.table.clone());
    let mut view = View::load(ctx, &filter, &[table], false, true)?;

    let fields = declared_or_all_fields(&view, &query.fields);
    let count = match &query.source {
        InsertSource::Values(rows) => {
            view.replace_values(ctx, &filter, &fields, &query.keys, rows)?
        }
        InsertSource::Query(select) => {
            view.replace_from_query(ctx, &filter, &fields, &query.keys, select)?
        }
    };
    view.operated_records = count;

    replace_target(filter.session, &view)?;
    Ok(view)
}

fn declared_or_all_fields(view: &View, fields: &[FieldReference]) -> Vec<FieldReference> {
    if fields.is_empty() {
        view.header
            .table_columns()
            .into_iter()
            .map(|(table, column)| FieldReference {
                view: table,
                column,
            })
            .collect()
    } else {
        fields.to_vec()
    }
}

/// UPDATE over a (possibly joined) FROM. Each assignment maps the joined
/// row back to a physical record through its internal id; a record may be
/// written at most once per statement.
pub fn update(parent: &Filter, query: &UpdateQuery) -> Result<Vec<View>> {
    let mut filter = parent.clone();
    filter.load_common_tables(&query.with)?;
    let ctx = filter.ctx;

    let from = if query.from.is_empty() {
        query.tables.clone()
    } else {
        query.from.clone()
    };
    let mut view = View::load(ctx, &filter, &from, true, true)?;
    if let Some(condition) = &query.where_clause {
        view.where_filter(ctx, &filter, condition)?;
    }

    let mut target_order: Vec<String> = Vec::new();
    let mut targets: FxHashMap<String, View> = FxHashMap::default();
    let mut updated: FxHashMap<String, Vec<usize>> = FxHashMap::default();
    for table in &query.tables {
        let name = table.name();
        let key = name.to_uppercase();
        let mut target = fetch_target_view(&filter, table)?;
        target.header.update(&name, None)?;
        target_order.push(key.clone());
        targets.insert(key.clone(), target);
        updated.insert(key, Vec::new());
    }

    for i in 0..view.records.len() {
        ctx.check()?;
        let row_filter = filter.with_record(&view, i);
        for assignment in &query.set_list {
            let value = row_filter.evaluate(&assignment.value)?;

            let qualifier = view.field_view_name(&assignment.field)?;
            let key = qualifier.to_uppercase();
            let target = targets
                .get_mut(&key)
                .ok_or_else(|| Error::UpdateTableUnspecified(qualifier.clone()))?;

            let internal_id = view
                .internal_record_id(&qualifier, i)
                .map_err(|_| Error::UpdateRecordAmbiguous)?;
            let written = updated.get_mut(&key).expect("target registered above");
            if written.contains(&internal_id) {
                return Err(Error::UpdateRecordAmbiguous);
            }

            let field_idx = target.field_index_ref(&assignment.field)?;
            target.records[internal_id][field_idx] = Cell::new(value);
            written.push(internal_id);
        }
    }

    let mut results = Vec::with_capacity(target_order.len());
    for key in target_order {
        let mut target = targets.remove(&key).expect("target registered above");
        target.select_all_columns(ctx, &filter)?;
        target.fix(ctx)?;
        target.operated_records = updated[&key].len();
        replace_target(filter.session, &target)?;
        results.push(target);
    }
    Ok(results)
}

/// DELETE: collect the internal ids of matched rows per target, then
/// rewrite each target keeping the rest
pub fn delete(parent: &Filter, query: &DeleteQuery) -> Result<Vec<View>> {
    let mut filter = parent.clone();
    filter.load_common_tables(&query.with)?;
    let ctx = filter.ctx;

    let table_names: Vec<String> = if query.tables.is_empty() {
        let [table] = &query.from[..] else {
            return Err(Error::DeleteTableUnspecified);
        };
        if !matches!(table.object, TableUnit::Identifier(_)) {
            return Err(Error::DeleteTableUnspecified);
        }
        vec![table.name()]
    } else {
        query.tables.clone()
    };

    let mut view = View::load(ctx, &filter, &query.from, true, true)?;
    if let Some(condition) = &query.where_clause {
        view.where_filter(ctx, &filter, condition)?;
    }

    let mut results = Vec::with_capacity(table_names.len());
    for name in &table_names {
        let matching = query
            .from
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| TableExpr::identifier(name.clone()));
        let mut target = fetch_target_view(&filter, &matching)?;
        target.header.update(name, None)?;

        let mut doomed: FxHashSet<usize> = FxHashSet::default();
        for i in 0..view.records.len() {
            ctx.check()?;
            if let Ok(internal_id) = view.internal_record_id(name, i) {
                doomed.insert(internal_id);
            }
        }

        let records = std::mem::take(&mut target.records);
        target.records = records
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(_, record)| record)
            .collect();

        target.select_all_columns(ctx, &filter)?;
        target.fix(ctx)?;
        target.operated_records = doomed.len();
        replace_target(filter.session, &target)?;
        results.push(target);
    }
    Ok(results)
}

// =============================================================================
// DDL
// =============================================================================

/// CREATE TABLE: register a fresh cached view; the file materializes at
/// commit
pub fn create_table(filter: &Filter, query: &CreateTable) -> Result<View> {
    let ctx = filter.ctx;
    let flags = filter.session.flags.read().clone();

    let path = if std::path::Path::new(&query.table).is_absolute() {
        std::path::PathBuf::from(&query.table)
    } else {
        flags.repository.join(&query.table)
    };
    if path.exists() {
        return Err(Error::FileAlreadyExists(path.display().to_string()));
    }
    let path_key = path.display().to_string();
    if filter.session.cached_views.exists(&path_key) {
        return Err(Error::FileAlreadyExists(path_key));
    }

    let table_name = crate::ast::table_name_of_path(&path_key);
    let mut view = match &query.query {
        Some(select_query) => {
            let mut view = select_as_subquery(filter, select_query)?;
            let columns = if query.fields.is_empty() {
                None
            } else {
                Some(&query.fields[..])
            };
            view.header.update(&table_name, columns)?;
            view
        }
        None => View {
            header: Header::new(&table_name, &query.fields)?,
            ..Default::default()
        },
    };

    let format = Format::from_extension(&path_key);
    let mut info = FileInfo::new(&path_key, format);
    info.delimiter = if format == Format::Tsv {
        '\t'
    } else {
        flags.delimiter
    };
    info.encoding = flags.write_encoding;
    info.line_break = flags.line_break.unwrap_or_default();
    view.file_info = Some(info);
    view.fix(ctx)?;
    // No load-time snapshot: the view always counts as modified, so
    // commit flushes the new file

    filter.session.cached_views.set(view.clone());
    Ok(view)
}

/// ALTER TABLE ADD columns at FIRST/LAST/BEFORE/AFTER with per-column
/// default expressions
pub fn add_columns(parent: &Filter, query: &AddColumns) -> Result<View> {
    let filter = parent.clone();
    let ctx = filter.ctx;

    let table = TableExpr::identifier(query.table.clone());
    let mut view = View::load(ctx, &filter, &[table], false, true)?;

    let insert_at = match query.position.as_ref().unwrap_or(&ColumnPosition::Last) {
        ColumnPosition::First => 0,
        ColumnPosition::Last => view.field_len(),
        ColumnPosition::Before(reference) => view.field_index_ref(reference)?,
        ColumnPosition::After(reference) => view.field_index_ref(reference)? + 1,
    };

    let existing = view.header.table_column_names();
    let mut names: Vec<String> = Vec::with_capacity(query.columns.len());
    for column in &query.columns {
        if existing
            .iter()
            .chain(names.iter())
            .any(|c| c.eq_ignore_ascii_case(&column.column))
        {
            return Err(Error::DuplicateFieldName(column.column.clone()));
        }
        names.push(column.column.clone());
    }

    // Evaluate the default of each new column for every record
    let defaults = {
        let v: &View = &view;
        let mut defaults: Vec<Vec<Value>> = Vec::with_capacity(v.records.len());
        for i in 0..v.records.len() {
            ctx.check()?;
            let row_filter = filter.with_record(v, i);
            let mut row = Vec::with_capacity(query.columns.len());
            for column in &query.columns {
                row.push(match &column.default {
                    Some(expr) => row_filter.evaluate(expr)?,
                    None => Value::Null,
                });
            }
            defaults.push(row);
        }
        defaults
    };

    let table_name = view
        .header
        .get(0)
        .map(|f| f.view.clone())
        .unwrap_or_default();
    let mut fields: Vec<crate::core::HeaderField> = view.header.iter().cloned().collect();
    for (offset, name) in names.iter().enumerate() {
        fields.insert(
            insert_at + offset,
            crate::core::HeaderField {
                view: table_name.clone(),
                column: name.clone(),
                is_from_table: true,
                ..Default::default()
            },
        );
    }
    for (i, field) in fields.iter_mut().enumerate() {
        field.number = i + 1;
    }
    view.header = Header::from_fields(fields);

    for (record, default_row) in view.records.iter_mut().zip(defaults) {
        let mut cells: Vec<Cell> = record.iter().cloned().collect();
        for (offset, value) in default_row.into_iter().enumerate() {
            cells.insert(insert_at + offset, Cell::new(value));
        }
        *record = Record::new(cells);
    }

    view.operated_fields = names.len();
    replace_target(filter.session, &view)?;
    Ok(view)
}

/// ALTER TABLE DROP columns
pub fn drop_columns(parent: &Filter, query: &DropColumns) -> Result<View> {
    let filter = parent.clone();
    let ctx = filter.ctx;

    let table = TableExpr::identifier(query.table.clone());
    let mut view = View::load(ctx, &filter, &[table], false, true)?;

    let drop_indices = view.field_indices(&query.columns)?;
    let mut select_fields = Vec::with_capacity(view.field_len());
    let mut select_labels = Vec::with_capacity(view.field_len());
    for i in 0..view.field_len() {
        if view.header[i].is_from_table && !drop_indices.contains(&i) {
            select_fields.push(i);
            select_labels.push(view.header[i].column.clone());
        }
    }
    view.select_fields = select_fields;
    view.select_labels = select_labels;
    view.fix(ctx)?;

    view.operated_fields = drop_indices.len();
    replace_target(filter.session, &view)?;
    Ok(view)
}

/// ALTER TABLE RENAME one column
pub fn rename_column(parent: &Filter, query: &RenameColumn) -> Result<View> {
    let filter = parent.clone();
    let ctx = filter.ctx;

    let table = TableExpr::identifier(query.table.clone());
    let mut view = View::load(ctx, &filter, &[table], false, true)?;

    if view
        .header
        .table_column_names()
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&query.new))
    {
        return Err(Error::DuplicateFieldName(query.new.clone()));
    }

    let idx = view.field_index_ref(&query.old)?;
    view.header[idx].column = query.new.clone();
    view.operated_fields = 1;
    replace_target(filter.session, &view)?;
    Ok(view)
}
