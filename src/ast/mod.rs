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

//! Abstract syntax tree
//!
//! The typed program representation the engine executes. A SQL text
//! frontend is an external collaborator: hosts either construct these
//! nodes directly or plug a parser in through
//! [`StatementParser`](crate::executor::session::StatementParser).
//!
//! Every node is a closed enum or struct; the evaluator and the statement
//! driver dispatch by match, and the `Display` implementations produce the
//! canonical labels used for projected columns and memoized expressions.

use std::fmt;

use crate::core::value::{ArithmeticOp, Value};

// =============================================================================
// Expressions
// =============================================================================

/// A column reference, optionally qualified with a view name
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReference {
    pub view: Option<String>,
    pub column: String,
}

/// A 1-based column-number reference (`t.2`)
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnNumber {
    pub view: String,
    pub number: i64,
}

/// Comparison operators. `Identical` is the `==` operator: type and value
/// must match exactly and NULLs equal NULLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Identical,
}

/// Source of an IN list
#[derive(Debug, Clone, PartialEq)]
pub enum InListSource {
    Values(Vec<Expression>),
    Subquery(Box<SelectQuery>),
}

/// One WHEN branch of a CASE expression
#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub condition: Expression,
    pub result: Expression,
}

/// Analytic (window) function call
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticFunction {
    pub name: String,
    pub distinct: bool,
    pub args: Vec<Expression>,
    pub partition: Vec<Expression>,
    pub order_by: Vec<OrderItem>,
    pub frame: Option<WindowFrame>,
}

/// Window frame attached to an analytic function
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: Option<FrameBound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    Rows,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(i64),
    CurrentRow,
    Following(i64),
    UnboundedFollowing,
}

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    FieldReference(FieldReference),
    ColumnNumber(ColumnNumber),
    Parentheses(Box<Expression>),
    Arithmetic {
        lhs: Box<Expression>,
        op: ArithmeticOp,
        rhs: Box<Expression>,
    },
    UnaryMinus(Box<Expression>),
    Concat(Vec<Expression>),
    Comparison {
        lhs: Box<Expression>,
        op: ComparisonOp,
        rhs: Box<Expression>,
    },
    /// `lhs IS [NOT] rhs` where rhs is NULL, TRUE, FALSE or UNKNOWN
    Is {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        negated: bool,
    },
    Between {
        lhs: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    In {
        lhs: Box<Expression>,
        list: InListSource,
        negated: bool,
    },
    Like {
        lhs: Box<Expression>,
        pattern: Box<Expression>,
        negated: bool,
    },
    Exists(Box<SelectQuery>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    ScalarSubquery(Box<SelectQuery>),
    /// Scalar builtin or user-defined function call. User-defined
    /// aggregates are routed by the evaluator based on the declaration.
    Function {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    /// Built-in aggregate call; `arg` of None is `COUNT(*)`
    AggregateFunction {
        name: String,
        distinct: bool,
        arg: Option<Box<Expression>>,
    },
    /// Aggregates with an extra separator argument: LISTAGG, JSON_AGG
    ListFunction {
        name: String,
        distinct: bool,
        arg: Box<Expression>,
        separator: Option<String>,
    },
    AnalyticFunction(Box<AnalyticFunction>),
    Case {
        operand: Option<Box<Expression>>,
        branches: Vec<CaseBranch>,
        else_result: Option<Box<Expression>>,
    },
    Variable(String),
    EnvironmentVariable(String),
    Flag(String),
}

impl Expression {
    /// Integer literal
    pub fn integer(value: i64) -> Expression {
        Expression::Literal(Value::Integer(value))
    }

    /// String literal
    pub fn string(value: impl AsRef<str>) -> Expression {
        Expression::Literal(Value::text(value))
    }

    /// NULL literal
    pub fn null() -> Expression {
        Expression::Literal(Value::Null)
    }

    /// Bare column reference
    pub fn field(column: impl Into<String>) -> Expression {
        Expression::FieldReference(FieldReference {
            view: None,
            column: column.into(),
        })
    }

    /// Qualified column reference
    pub fn qualified_field(view: impl Into<String>, column: impl Into<String>) -> Expression {
        Expression::FieldReference(FieldReference {
            view: Some(view.into()),
            column: column.into(),
        })
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Select field: `*` or an expression with an optional alias
#[derive(Debug, Clone, PartialEq)]
pub enum FieldObject {
    AllColumns,
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub object: FieldObject,
    pub alias: Option<String>,
}

impl SelectField {
    pub fn expr(expression: Expression) -> SelectField {
        SelectField {
            object: FieldObject::Expression(expression),
            alias: None,
        }
    }

    pub fn aliased(expression: Expression, alias: impl Into<String>) -> SelectField {
        SelectField {
            object: FieldObject::Expression(expression),
            alias: Some(alias.into()),
        }
    }

    pub fn all_columns() -> SelectField {
        SelectField {
            object: FieldObject::AllColumns,
            alias: None,
        }
    }

    /// The output column label: the alias when present, the canonical
    /// expression text otherwise (bare field references keep just the
    /// column name)
    pub fn label(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.object {
            FieldObject::AllColumns => "*".to_string(),
            FieldObject::Expression(Expression::FieldReference(f)) => f.column.clone(),
            FieldObject::Expression(e) => e.to_string(),
        }
    }
}

/// One table expression of a FROM clause
#[derive(Debug, Clone, PartialEq)]
pub struct TableExpr {
    pub object: TableUnit,
    pub alias: Option<String>,
}

impl TableExpr {
    pub fn identifier(path: impl Into<String>) -> TableExpr {
        TableExpr {
            object: TableUnit::Identifier(path.into()),
            alias: None,
        }
    }

    pub fn aliased(path: impl Into<String>, alias: impl Into<String>) -> TableExpr {
        TableExpr {
            object: TableUnit::Identifier(path.into()),
            alias: Some(alias.into()),
        }
    }

    /// The name this table binds in the query scope
    pub fn name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        self.object.default_name()
    }
}

/// The kinds of table expression FROM accepts
#[derive(Debug, Clone, PartialEq)]
pub enum TableUnit {
    /// File path or declared table name
    Identifier(String),
    Subquery(Box<SelectQuery>),
    Stdin,
    /// Synthetic single-row view used when FROM is absent
    Dual,
    Join(Box<Join>),
    /// `JSON_TABLE(query, text-or-file)`
    JsonTable {
        query: Expression,
        source: JsonTableSource,
    },
    /// `FORMAT(format-arg, path, [encoding, no-header, without-null])`,
    /// forcing a format on a file or stdin source
    TableObject {
        format: TableFormat,
        format_arg: Option<Expression>,
        path: Box<TableUnit>,
        args: Vec<Expression>,
    },
}

impl TableUnit {
    fn default_name(&self) -> String {
        match self {
            TableUnit::Identifier(path) => table_name_of_path(path),
            TableUnit::Stdin => "STDIN".to_string(),
            TableUnit::Dual => "DUAL".to_string(),
            TableUnit::TableObject { path, .. } => path.default_name(),
            _ => String::new(),
        }
    }
}

/// Strip directory and extension from a path to get the default table name
pub fn table_name_of_path(path: &str) -> String {
    let base = std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    base.to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonTableSource {
    Text(Box<Expression>),
    File(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Fixed,
    Json,
    Ltsv,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: TableExpr,
    pub right: TableExpr,
    pub join_type: JoinType,
    pub natural: bool,
    pub condition: Option<JoinCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Cross,
    Inner,
    Outer(JoinDirection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDirection {
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(Expression),
    Using(Vec<String>),
}

/// ORDER BY item
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub value: Expression,
    pub direction: Option<SortDirection>,
    pub null_position: Option<NullPosition>,
}

impl OrderItem {
    pub fn new(value: Expression) -> OrderItem {
        OrderItem {
            value,
            direction: None,
            null_position: None,
        }
    }

    pub fn descending(value: Expression) -> OrderItem {
        OrderItem {
            value,
            direction: Some(SortDirection::Descending),
            null_position: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPosition {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub value: Expression,
    pub percent: bool,
    pub with_ties: bool,
}

/// WITH clause entry
#[derive(Debug, Clone, PartialEq)]
pub struct CommonTable {
    pub recursive: bool,
    pub name: String,
    pub columns: Vec<String>,
    pub query: SelectQuery,
}

/// The body of a select query: a plain entity or a set-operation tree
#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Entity(SelectEntity),
    Set {
        left: Box<QueryBody>,
        operator: SetOperator,
        all: bool,
        right: Box<QueryBody>,
    },
    Subquery(Box<SelectQuery>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Except,
    Intersect,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOperator::Union => write!(f, "UNION"),
            SetOperator::Except => write!(f, "EXCEPT"),
            SetOperator::Intersect => write!(f, "INTERSECT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectEntity {
    pub distinct: bool,
    pub fields: Vec<SelectField>,
    pub from: Vec<TableExpr>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
}

impl SelectEntity {
    pub fn new(fields: Vec<SelectField>) -> SelectEntity {
        SelectEntity {
            distinct: false,
            fields,
            from: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub with: Vec<CommonTable>,
    pub body: QueryBody,
    pub order_by: Vec<OrderItem>,
    pub offset: Option<Expression>,
    pub limit: Option<LimitClause>,
    pub into_variables: Vec<String>,
}

impl SelectQuery {
    /// A query with just a body, no trailing clauses
    pub fn from_body(body: QueryBody) -> SelectQuery {
        SelectQuery {
            with: Vec::new(),
            body,
            order_by: Vec::new(),
            offset: None,
            limit: None,
            into_variables: Vec::new(),
        }
    }

    pub fn from_entity(entity: SelectEntity) -> SelectQuery {
        SelectQuery::from_body(QueryBody::Entity(entity))
    }
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expression>>),
    Query(Box<SelectQuery>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub with: Vec<CommonTable>,
    pub table: String,
    pub fields: Vec<FieldReference>,
    pub source: InsertSource,
}

/// INSERT OR UPDATE: insert rows, updating in place where the key columns
/// match an existing record
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceQuery {
    pub with: Vec<CommonTable>,
    pub table: String,
    pub fields: Vec<FieldReference>,
    pub keys: Vec<FieldReference>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSet {
    pub field: FieldReference,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub with: Vec<CommonTable>,
    pub tables: Vec<TableExpr>,
    pub set_list: Vec<UpdateSet>,
    pub from: Vec<TableExpr>,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub with: Vec<CommonTable>,
    /// Views to delete from; empty means the single FROM table
    pub tables: Vec<String>,
    pub from: Vec<TableExpr>,
    pub where_clause: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub fields: Vec<String>,
    pub query: Option<SelectQuery>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefault {
    pub column: String,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnPosition {
    First,
    Last,
    Before(FieldReference),
    After(FieldReference),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddColumns {
    pub table: String,
    pub columns: Vec<ColumnDefault>,
    pub position: Option<ColumnPosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropColumns {
    pub table: String,
    pub columns: Vec<FieldReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameColumn {
    pub table: String,
    pub old: FieldReference,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableAssignment {
    pub name: String,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    /// Parameters with optional defaults
    pub parameters: Vec<VariableAssignment>,
    /// Aggregate declarations name the implicit cursor over the grouped
    /// values; scalar declarations leave this empty
    pub cursor: Option<String>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub condition: Expression,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Expression,
    pub statements: Vec<Statement>,
    pub else_if: Vec<ElseIf>,
    pub else_statements: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPosition {
    Next,
    Prior,
    First,
    Last,
    Absolute,
    Relative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPosition {
    pub position: CursorPosition,
    pub number: Option<Expression>,
}

impl Default for FetchPosition {
    fn default() -> Self {
        FetchPosition {
            position: CursorPosition::Next,
            number: None,
        }
    }
}

/// A statement of a program
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectQuery),
    Insert(InsertQuery),
    Replace(ReplaceQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
    CreateTable(CreateTable),
    AddColumns(AddColumns),
    DropColumns(DropColumns),
    RenameColumn(RenameColumn),
    DeclareVariable(Vec<VariableAssignment>),
    SubstituteVariable {
        name: String,
        value: Expression,
    },
    DeclareTable {
        table: String,
        fields: Vec<String>,
        query: Option<SelectQuery>,
    },
    DeclareCursor {
        cursor: String,
        query: SelectQuery,
    },
    OpenCursor(String),
    CloseCursor(String),
    DisposeCursor(String),
    FetchCursor {
        cursor: String,
        position: FetchPosition,
        variables: Vec<String>,
    },
    DeclareFunction(FunctionDeclaration),
    Return(Option<Expression>),
    If(If),
    While {
        condition: Expression,
        statements: Vec<Statement>,
    },
    WhileInCursor {
        variables: Vec<String>,
        cursor: String,
        statements: Vec<Statement>,
    },
    Break,
    Continue,
    Exit(Option<Expression>),
    Commit,
    Rollback,
    Print(Expression),
    SetFlag {
        name: String,
        value: Expression,
    },
    AddFlagElement {
        name: String,
        value: Expression,
    },
    RemoveFlagElement {
        name: String,
        value: Expression,
    },
    /// Format a statement template with arguments and run it through the
    /// configured external parser
    Execute {
        statement: Expression,
        args: Vec<Expression>,
    },
}

// =============================================================================
// Canonical text
// =============================================================================

impl fmt::Display for FieldReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.view {
            Some(v) => write!(f, "{}.{}", v, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::Identical => "==",
        };
        write!(f, "{}", s)
    }
}

fn write_arithmetic_op(f: &mut fmt::Formatter<'_>, op: ArithmeticOp) -> fmt::Result {
    let s = match op {
        ArithmeticOp::Add => "+",
        ArithmeticOp::Subtract => "-",
        ArithmeticOp::Multiply => "*",
        ArithmeticOp::Divide => "/",
        ArithmeticOp::Modulo => "%",
    };
    write!(f, "{}", s)
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => write!(f, "NULL"),
        Value::String(s) => write!(f, "'{}'", s),
        other => write!(f, "{}", other.serialize()),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if 0 < i {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write_literal(f, v),
            Expression::FieldReference(r) => write!(f, "{}", r),
            Expression::ColumnNumber(n) => write!(f, "{}.{}", n.view, n.number),
            Expression::Parentheses(e) => write!(f, "({})", e),
            Expression::Arithmetic { lhs, op, rhs } => {
                write!(f, "{} ", lhs)?;
                write_arithmetic_op(f, *op)?;
                write!(f, " {}", rhs)
            }
            Expression::UnaryMinus(e) => write!(f, "-{}", e),
            Expression::Concat(items) => write_list(f, items, " || "),
            Expression::Comparison { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Expression::Is { lhs, rhs, negated } => {
                if *negated {
                    write!(f, "{} IS NOT {}", lhs, rhs)
                } else {
                    write!(f, "{} IS {}", lhs, rhs)
                }
            }
            Expression::Between {
                lhs,
                low,
                high,
                negated,
            } => {
                if *negated {
                    write!(f, "{} NOT BETWEEN {} AND {}", lhs, low, high)
                } else {
                    write!(f, "{} BETWEEN {} AND {}", lhs, low, high)
                }
            }
            Expression::In { lhs, list, negated } => {
                write!(f, "{}{} IN (", lhs, if *negated { " NOT" } else { "" })?;
                match list {
                    InListSource::Values(values) => write_list(f, values, ", ")?,
                    InListSource::Subquery(q) => write!(f, "{}", q)?,
                }
                write!(f, ")")
            }
            Expression::Like {
                lhs,
                pattern,
                negated,
            } => {
                if *negated {
                    write!(f, "{} NOT LIKE {}", lhs, pattern)
                } else {
                    write!(f, "{} LIKE {}", lhs, pattern)
                }
            }
            Expression::Exists(q) => write!(f, "EXISTS ({})", q),
            Expression::And(l, r) => write!(f, "{} AND {}", l, r),
            Expression::Or(l, r) => write!(f, "{} OR {}", l, r),
            Expression::Not(e) => write!(f, "NOT {}", e),
            Expression::ScalarSubquery(q) => write!(f, "({})", q),
            Expression::Function {
                name,
                args,
                distinct,
            } => {
                write!(f, "{}(", name.to_uppercase())?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
            Expression::AggregateFunction {
                name,
                distinct,
                arg,
            } => {
                write!(f, "{}(", name.to_uppercase())?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                match arg {
                    Some(a) => write!(f, "{}", a)?,
                    None => write!(f, "*")?,
                }
                write!(f, ")")
            }
            Expression::ListFunction {
                name,
                distinct,
                arg,
                separator,
            } => {
                write!(f, "{}(", name.to_uppercase())?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write!(f, "{}", arg)?;
                if let Some(sep) = separator {
                    write!(f, ", '{}'", sep)?;
                }
                write!(f, ")")
            }
            Expression::AnalyticFunction(a) => {
                write!(f, "{}(", a.name.to_uppercase())?;
                if a.distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, &a.args, ", ")?;
                write!(f, ") OVER (")?;
                if !a.partition.is_empty() {
                    write!(f, "PARTITION BY ")?;
                    write_list(f, &a.partition, ", ")?;
                }
                if !a.order_by.is_empty() {
                    if !a.partition.is_empty() {
                        write!(f, " ")?;
                    }
                    write!(f, "ORDER BY ")?;
                    for (i, item) in a.order_by.iter().enumerate() {
                        if 0 < i {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", item.value)?;
                        if item.direction == Some(SortDirection::Descending) {
                            write!(f, " DESC")?;
                        }
                    }
                }
                write!(f, ")")
            }
            Expression::Case {
                operand,
                branches,
                else_result,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for branch in branches {
                    write!(f, " WHEN {} THEN {}", branch.condition, branch.result)?;
                }
                if let Some(e) = else_result {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expression::Variable(name) => write!(f, "@{}", name),
            Expression::EnvironmentVariable(name) => write!(f, "@ENV:{}", name),
            Expression::Flag(name) => write!(f, "@@{}", name),
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body)?;
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY ")?;
            for (i, item) in self.order_by.iter().enumerate() {
                if 0 < i {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item.value)?;
            }
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit.value)?;
        }
        Ok(())
    }
}

impl fmt::Display for QueryBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryBody::Entity(e) => {
                write!(f, "SELECT ")?;
                for (i, field) in e.fields.iter().enumerate() {
                    if 0 < i {
                        write!(f, ", ")?;
                    }
                    match &field.object {
                        FieldObject::AllColumns => write!(f, "*")?,
                        FieldObject::Expression(expr) => write!(f, "{}", expr)?,
                    }
                }
                if !e.from.is_empty() {
                    write!(f, " FROM ")?;
                    for (i, t) in e.from.iter().enumerate() {
                        if 0 < i {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", t.name())?;
                    }
                }
                if let Some(w) = &e.where_clause {
                    write!(f, " WHERE {}", w)?;
                }
                if !e.group_by.is_empty() {
                    write!(f, " GROUP BY ")?;
                    write_list(f, &e.group_by, ", ")?;
                }
                if let Some(h) = &e.having {
                    write!(f, " HAVING {}", h)?;
                }
                Ok(())
            }
            QueryBody::Set {
                left,
                operator,
                all,
                right,
            } => {
                write!(f, "{} {}", left, operator)?;
                if *all {
                    write!(f, " ALL")?;
                }
                write!(f, " {}", right)
            }
            QueryBody::Subquery(q) => write!(f, "({})", q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_labels() {
        assert_eq!(Expression::field("a").to_string(), "a");
        assert_eq!(Expression::qualified_field("t", "a").to_string(), "t.a");
        assert_eq!(
            Expression::AggregateFunction {
                name: "count".to_string(),
                distinct: false,
                arg: None,
            }
            .to_string(),
            "COUNT(*)"
        );
        assert_eq!(
            Expression::Arithmetic {
                lhs: Box::new(Expression::field("a")),
                op: ArithmeticOp::Add,
                rhs: Box::new(Expression::integer(1)),
            }
            .to_string(),
            "a + 1"
        );
        assert_eq!(Expression::string("x").to_string(), "'x'");
    }

    #[test]
    fn test_select_field_label() {
        let field = SelectField::aliased(Expression::field("a"), "total");
        assert_eq!(field.label(), "total");

        let bare = SelectField::expr(Expression::qualified_field("t", "a"));
        assert_eq!(bare.label(), "a");
    }

    #[test]
    fn test_table_name_of_path() {
        assert_eq!(table_name_of_path("/data/users.csv"), "users");
        assert_eq!(table_name_of_path("users"), "users");
    }

    #[test]
    fn test_query_display_distinguishes_queries() {
        let q1 = SelectQuery::from_entity(SelectEntity::new(vec![SelectField::expr(
            Expression::integer(1),
        )]));
        let q2 = SelectQuery::from_entity(SelectEntity::new(vec![SelectField::expr(
            Expression::integer(2),
        )]));
        assert_ne!(q1.to_string(), q2.to_string());
    }
}
