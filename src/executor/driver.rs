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

//! Statement driver
//!
//! Executes a program of statements: dispatches each statement, collects
//! results into the transaction's ResultSet buffer, and threads the flow
//! signals (BREAK, CONTINUE, EXIT, RETURN) through the control-flow
//! statements. Errors abort the program; the accumulated ResultSet is
//! kept for inspection but never committed, and an uncaught error rolls
//! the transaction back.

use crate::ast::{
    Expression, FetchPosition, FunctionDeclaration, If, SelectQuery, Statement,
};
use crate::codec::FileInfo;
use crate::core::{Error, Result, Ternary, Value};

use super::context::ExecContext;
use super::filter::Filter;
use super::query;
use super::session::Session;
use super::view::View;

/// How a statement or program ended
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Ran to completion
    Terminate,
    /// EXIT: stop the program, skipping the implicit commit
    Exit,
    /// BREAK out of the closest loop
    Break,
    /// CONTINUE with the closest loop's next iteration
    Continue,
    /// RETURN out of a user-defined function body
    Return(Value),
}

/// What kind of statement produced a result entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    AddColumns,
    DropColumns,
    RenameColumn,
    Print,
}

/// One entry of the transaction's result buffer
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub kind: ResultKind,
    /// The finalized result view of a SELECT
    pub view: Option<View>,
    /// The descriptor of the file a mutation touched
    pub file_info: Option<FileInfo>,
    pub operated_count: usize,
    /// Human log line emitted at commit
    pub log: String,
}

impl ExecResult {
    fn select(view: View) -> ExecResult {
        ExecResult {
            kind: ResultKind::Select,
            view: Some(view),
            file_info: None,
            operated_count: 0,
            log: String::new(),
        }
    }

    fn mutation(kind: ResultKind, view: &View, count: usize, log: String) -> ExecResult {
        ExecResult {
            kind,
            view: None,
            file_info: view.file_info.clone(),
            operated_count: count,
            log,
        }
    }

    fn print(log: String) -> ExecResult {
        ExecResult {
            kind: ResultKind::Print,
            view: None,
            file_info: None,
            operated_count: 0,
            log,
        }
    }
}

/// Executes programs against one session
pub struct Executor<'s> {
    pub session: &'s Session,
    /// Buffered results of the open transaction
    pub result_set: Vec<ExecResult>,
    /// Exit code requested by EXIT, surfaced to the host
    pub exit_code: i32,
    log: String,
}

impl<'s> Executor<'s> {
    pub(crate) fn log_mut(&mut self) -> &mut String {
        &mut self.log
    }

    pub fn new(session: &'s Session) -> Executor<'s> {
        Executor {
            session,
            result_set: Vec::new(),
            exit_code: 0,
            log: String::new(),
        }
    }

    /// Run a program with transactional semantics: commit on normal
    /// completion, roll back on error. Returns the accumulated output.
    pub fn execute(&mut self, ctx: &ExecContext, statements: &[Statement]) -> Result<String> {
        match self.execute_program(ctx, statements) {
            Ok(Flow::Terminate) => {
                self.commit(ctx)?;
            }
            Ok(_) => {}
            Err(e) => {
                self.rollback();
                return Err(e);
            }
        }
        Ok(std::mem::take(&mut self.log))
    }

    /// Run statements until one redirects the flow
    pub fn execute_program(&mut self, ctx: &ExecContext, statements: &[Statement]) -> Result<Flow> {
        for statement in statements {
            ctx.check()?;
            let flow = self.execute_statement(ctx, statement)?;
            if flow != Flow::Terminate {
                return Ok(flow);
            }
        }
        Ok(Flow::Terminate)
    }

    pub fn execute_statement(&mut self, ctx: &ExecContext, statement: &Statement) -> Result<Flow> {
        let filter = Filter::new(self.session, ctx);

        match statement {
            Statement::Select(select_query) => {
                let view = query::select(&filter, select_query)?;
                if select_query.into_variables.is_empty() {
                    self.result_set.push(ExecResult::select(view));
                } else {
                    self.select_into(&view, &select_query.into_variables)?;
                }
            }
            Statement::Insert(q) => {
                let view = query::insert(&filter, q)?;
                let log = format!(
                    "{} inserted on {:?}",
                    format_count(view.operated_records, "record"),
                    file_path(&view)
                );
                self.result_set.push(ExecResult::mutation(
                    ResultKind::Insert,
                    &view,
                    view.operated_records,
                    log,
                ));
            }
            Statement::Replace(q) => {
                let view = query::replace(&filter, q)?;
                let log = format!(
                    "{} replaced on {:?}",
                    format_count(view.operated_records, "record"),
                    file_path(&view)
                );
                self.result_set.push(ExecResult::mutation(
                    ResultKind::Insert,
                    &view,
                    view.operated_records,
                    log,
                ));
            }
            Statement::Update(q) => {
                for view in query::update(&filter, q)? {
                    let log = format!(
                        "{} updated on {:?}",
                        format_count(view.operated_records, "record"),
                        file_path(&view)
                    );
                    self.result_set.push(ExecResult::mutation(
                        ResultKind::Update,
                        &view,
                        view.operated_records,
                        log,
                    ));
                }
            }
            Statement::Delete(q) => {
                for view in query::delete(&filter, q)? {
                    let log = format!(
                        "{} deleted on {:?}",
                        format_count(view.operated_records, "record"),
                        file_path(&view)
                    );
                    self.result_set.push(ExecResult::mutation(
                        ResultKind::Delete,
                        &view,
                        view.operated_records,
                        log,
                    ));
                }
            }
            Statement::CreateTable(q) => {
                let view = query::create_table(&filter, q)?;
                let log = format!("file {:?} is created", file_path(&view));
                self.result_set
                    .push(ExecResult::mutation(ResultKind::CreateTable, &view, 0, log));
            }
            Statement::AddColumns(q) => {
                let view = query::add_columns(&filter, q)?;
                let log = format!(
                    "{} added on {:?}",
                    format_count(view.operated_fields, "field"),
                    file_path(&view)
                );
                self.result_set.push(ExecResult::mutation(
                    ResultKind::AddColumns,
                    &view,
                    view.operated_fields,
                    log,
                ));
            }
            Statement::DropColumns(q) => {
                let view = query::drop_columns(&filter, q)?;
                let log = format!(
                    "{} dropped on {:?}",
                    format_count(view.operated_fields, "field"),
                    file_path(&view)
                );
                self.result_set.push(ExecResult::mutation(
                    ResultKind::DropColumns,
                    &view,
                    view.operated_fields,
                    log,
                ));
            }
            Statement::RenameColumn(q) => {
                let view = query::rename_column(&filter, q)?;
                let log = format!(
                    "{} renamed on {:?}",
                    format_count(view.operated_fields, "field"),
                    file_path(&view)
                );
                self.result_set.push(ExecResult::mutation(
                    ResultKind::RenameColumn,
                    &view,
                    view.operated_fields,
                    log,
                ));
            }
            Statement::DeclareVariable(assignments) => {
                for assignment in assignments {
                    let value = match &assignment.value {
                        Some(expr) => filter.evaluate(expr)?,
                        None => Value::Null,
                    };
                    self.session.variables.declare(&assignment.name, value)?;
                }
            }
            Statement::SubstituteVariable { name, value } => {
                let value = filter.evaluate(value)?;
                self.session.variables.substitute(name, value)?;
            }
            Statement::DeclareTable {
                table,
                fields,
                query: table_query,
            } => self.declare_table(&filter, table, fields, table_query.as_ref())?,
            Statement::DeclareCursor {
                cursor,
                query: cursor_query,
            } => {
                self.session
                    .cursors
                    .lock()
                    .declare(cursor, cursor_query.clone())?;
            }
            Statement::OpenCursor(name) => {
                let cursor_query = self.session.cursors.lock().query_for_open(name)?;
                let view = query::select(&filter, &cursor_query)?;
                self.session.cursors.lock().open_with_view(name, view)?;
            }
            Statement::CloseCursor(name) => self.session.cursors.lock().close(name)?,
            Statement::DisposeCursor(name) => self.session.cursors.lock().dispose(name)?,
            Statement::FetchCursor {
                cursor,
                position,
                variables,
            } => {
                self.fetch_into(&filter, cursor, position, variables)?;
            }
            Statement::DeclareFunction(declaration) => {
                self.session.functions.lock().declare(declaration.clone())?;
            }
            Statement::Return(expr) => {
                let value = match expr {
                    Some(expr) => filter.evaluate(expr)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            Statement::If(branch) => return self.execute_if(ctx, branch),
            Statement::While {
                condition,
                statements,
            } => return self.execute_while(ctx, condition, statements),
            Statement::WhileInCursor {
                variables,
                cursor,
                statements,
            } => return self.execute_while_in_cursor(ctx, variables, cursor, statements),
            Statement::Break => return Ok(Flow::Break),
            Statement::Continue => return Ok(Flow::Continue),
            Statement::Exit(code) => {
                if let Some(expr) = code {
                    let value = filter.evaluate(expr)?;
                    self.exit_code = value.as_integer().unwrap_or(0) as i32;
                }
                return Ok(Flow::Exit);
            }
            Statement::Commit => self.commit(ctx)?,
            Statement::Rollback => self.rollback(),
            Statement::Print(expr) => {
                let value = filter.evaluate(expr)?;
                self.result_set.push(ExecResult::print(value.to_string()));
            }
            Statement::SetFlag { name, value } => {
                let value = filter.evaluate(value)?;
                self.session.flags.write().set(name, &value)?;
            }
            Statement::AddFlagElement { name, value } => {
                let value = filter.evaluate(value)?;
                self.session.flags.write().add_element(name, &value)?;
            }
            Statement::RemoveFlagElement { name, value } => {
                let value = filter.evaluate(value)?;
                self.session.flags.write().remove_element(name, &value)?;
            }
            Statement::Execute {
                statement: template,
                args,
            } => return self.execute_dynamic(ctx, &filter, template, args),
        }
        Ok(Flow::Terminate)
    }

    fn select_into(&mut self, view: &View, variables: &[String]) -> Result<()> {
        if view.header.len() != variables.len() {
            return Err(Error::invalid_argument(format!(
                "select into expects {} fields, query returns {}",
                variables.len(),
                view.header.len()
            )));
        }
        if 1 < view.records.len() {
            return Err(Error::SubqueryTooManyRecords);
        }
        for (i, name) in variables.iter().enumerate() {
            let value = view
                .records
                .first()
                .map(|record| record[i].value().clone())
                .unwrap_or(Value::Null);
            self.session.variables.substitute(name, value)?;
        }
        Ok(())
    }

    fn declare_table(
        &mut self,
        filter: &Filter,
        table: &str,
        fields: &[String],
        table_query: Option<&SelectQuery>,
    ) -> Result<()> {
        if self.session.temp_view_exists(table) {
            return Err(Error::TemporaryTableRedeclared(table.to_string()));
        }
        let mut view = match table_query {
            Some(q) => {
                let mut view = query::select(filter, q)?;
                let columns = if fields.is_empty() {
                    None
                } else {
                    Some(fields)
                };
                view.header.update(table, columns)?;
                view
            }
            None => View {
                header: crate::core::Header::new(table, fields)?,
                ..Default::default()
            },
        };
        let mut info = FileInfo::temporary(table);
        info.capture_snapshot(&view.header, &view.records);
        view.file_info = Some(info);
        self.session.set_temp_view(view);
        Ok(())
    }

    /// FETCH ... INTO: move the cursor, bind the row; answers false when
    /// out of range
    fn fetch_into(
        &mut self,
        filter: &Filter,
        cursor: &str,
        position: &FetchPosition,
        variables: &[String],
    ) -> Result<bool> {
        let number = match &position.number {
            Some(expr) => Some(
                filter
                    .evaluate(expr)?
                    .as_integer()
                    .ok_or_else(|| Error::InvalidFetchPosition(expr.to_string()))?,
            ),
            None => None,
        };
        let values = self.session.cursors.lock().fetch(cursor, position, number)?;
        let Some(values) = values else {
            return Ok(false);
        };
        if values.len() != variables.len() {
            return Err(Error::CursorFetchLength {
                name: cursor.to_string(),
                returned: values.len(),
                variables: variables.len(),
            });
        }
        for (name, value) in variables.iter().zip(values) {
            self.session.variables.substitute(name, value)?;
        }
        Ok(true)
    }

    fn execute_if(&mut self, ctx: &ExecContext, branch: &If) -> Result<Flow> {
        let filter = Filter::new(self.session, ctx);
        if filter.evaluate_condition(&branch.condition)? == Ternary::True {
            return self.execute_program(ctx, &branch.statements);
        }
        for else_if in &branch.else_if {
            if filter.evaluate_condition(&else_if.condition)? == Ternary::True {
                return self.execute_program(ctx, &else_if.statements);
            }
        }
        self.execute_program(ctx, &branch.else_statements)
    }

    fn execute_while(
        &mut self,
        ctx: &ExecContext,
        condition: &Expression,
        statements: &[Statement],
    ) -> Result<Flow> {
        loop {
            ctx.check()?;
            let filter = Filter::new(self.session, ctx);
            if filter.evaluate_condition(condition)? != Ternary::True {
                break;
            }
            match self.execute_program(ctx, statements)? {
                Flow::Break => return Ok(Flow::Terminate),
                Flow::Exit => return Ok(Flow::Exit),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Terminate | Flow::Continue => {}
            }
        }
        Ok(Flow::Terminate)
    }

    fn execute_while_in_cursor(
        &mut self,
        ctx: &ExecContext,
        variables: &[String],
        cursor: &str,
        statements: &[Statement],
    ) -> Result<Flow> {
        loop {
            ctx.check()?;
            let filter = Filter::new(self.session, ctx);
            if !self.fetch_into(&filter, cursor, &FetchPosition::default(), variables)? {
                break;
            }
            match self.execute_program(ctx, statements)? {
                Flow::Break => return Ok(Flow::Terminate),
                Flow::Exit => return Ok(Flow::Exit),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Terminate | Flow::Continue => {}
            }
        }
        Ok(Flow::Terminate)
    }

    /// EXECUTE: format the template, parse it through the configured
    /// external parser, run the parsed program in place
    fn execute_dynamic(
        &mut self,
        ctx: &ExecContext,
        filter: &Filter,
        template: &Expression,
        args: &[Expression],
    ) -> Result<Flow> {
        let template = match filter.evaluate(template)?.to_string_value() {
            Value::String(s) => s,
            _ => return Err(Error::invalid_argument("execute template must be a string")),
        };
        let values = args
            .iter()
            .map(|a| filter.evaluate(a))
            .collect::<Result<Vec<_>>>()?;
        let formatted = format_template(&template, &values)?;

        let parser = self.session.parser().ok_or(Error::ExecuteWithoutParser)?;
        let statements = parser.parse(&formatted)?;
        self.execute_program(ctx, &statements)
    }
}

/// Substitute `%s` placeholders with argument values; `%%` is a literal
/// percent
fn format_template(template: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    let mut used = 0;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => {
                let value = args.get(used).ok_or_else(|| {
                    Error::invalid_argument("format placeholders exceed the argument count")
                })?;
                out.push_str(&value.serialize());
                used += 1;
            }
            _ => return Err(Error::invalid_argument("invalid format placeholder")),
        }
    }
    if used < args.len() {
        return Err(Error::invalid_argument(
            "format arguments exceed the placeholder count",
        ));
    }
    Ok(out)
}

fn format_count(count: usize, noun: &str) -> String {
    match count {
        0 => format!("no {}", noun),
        1 => format!("1 {}", noun),
        n => format!("{} {}s", n, noun),
    }
}

fn file_path(view: &View) -> String {
    view.file_info
        .as_ref()
        .map(|f| f.path.clone())
        .unwrap_or_default()
}

// =============================================================================
// User-defined function execution
// =============================================================================

/// Run a scalar user-defined function body
pub fn execute_scalar_function(
    filter: &Filter,
    declaration: &FunctionDeclaration,
    args: Vec<Value>,
) -> Result<Value> {
    run_function_body(filter, declaration, None, args)
}

/// Run an aggregate user-defined function body; the grouped values back
/// the declaration's implicit cursor
pub fn execute_aggregate_function(
    filter: &Filter,
    declaration: &FunctionDeclaration,
    values: Vec<Value>,
    args: Vec<Value>,
) -> Result<Value> {
    run_function_body(filter, declaration, Some(values), args)
}

fn run_function_body(
    filter: &Filter,
    declaration: &FunctionDeclaration,
    cursor_values: Option<Vec<Value>>,
    args: Vec<Value>,
) -> Result<Value> {
    if declaration.parameters.len() < args.len() {
        return Err(Error::FunctionArgumentLength {
            name: declaration.name.clone(),
            expected: format!("at most {} arguments", declaration.parameters.len()),
            got: args.len(),
        });
    }

    let session = filter.session;
    session.variables.push_scope();
    session.cursors.lock().push_scope();

    let run = || -> Result<Value> {
        for (i, parameter) in declaration.parameters.iter().enumerate() {
            let value = match args.get(i) {
                Some(v) => v.clone(),
                None => match &parameter.value {
                    Some(default) => filter.evaluate(default)?,
                    None => {
                        return Err(Error::FunctionArgumentLength {
                            name: declaration.name.clone(),
                            expected: format!("{} arguments", declaration.parameters.len()),
                            got: args.len(),
                        })
                    }
                },
            };
            session.variables.declare(&parameter.name, value)?;
        }
        if let (Some(values), Some(cursor_name)) = (&cursor_values, &declaration.cursor) {
            session
                .cursors
                .lock()
                .declare_pseudo(cursor_name, values.clone());
        }

        let mut executor = Executor::new(session);
        let flow = executor.execute_program(filter.ctx, &declaration.statements)?;
        Ok(match flow {
            Flow::Return(value) => value,
            _ => Value::Null,
        })
    };
    let result = run();

    session.cursors.lock().pop_scope();
    session.variables.pop_scope();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_template() {
        assert_eq!(
            format_template("insert %s of %s%%", &[Value::Integer(1), Value::text("x")]).unwrap(),
            "insert 1 of x%"
        );
        assert!(format_template("%s", &[]).is_err());
        assert!(format_template("none", &[Value::Null]).is_err());
        assert!(format_template("%d", &[]).is_err());
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0, "record"), "no record");
        assert_eq!(format_count(1, "record"), "1 record");
        assert_eq!(format_count(3, "field"), "3 fields");
    }
}
