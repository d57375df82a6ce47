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

//! Error types for flatsql
//!
//! A single error enum covers the whole engine, grouped by the taxonomy:
//! resolution, type, semantic, I/O, cancellation and internal errors.
//! `Parse` is reserved for errors surfaced by the external SQL parser.

use thiserror::Error;

/// Result type alias for flatsql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the query engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Resolution errors
    // =========================================================================
    /// Referenced field does not exist in any loaded header
    #[error("field '{0}' does not exist")]
    FieldNotExist(String),

    /// Bare column reference matches more than one field
    #[error("field '{0}' is ambiguous")]
    FieldAmbiguous(String),

    /// Column number reference out of range
    #[error("field number {number} of '{view}' does not exist")]
    FieldNumberNotExist { view: String, number: i64 },

    /// Duplicate column name in a freshly declared header
    #[error("field name '{0}' is a duplicate")]
    DuplicateFieldName(String),

    /// File for a table identifier could not be located
    #[error("file '{0}' does not exist")]
    FileNotFound(String),

    /// Table alias used twice in one query
    #[error("table name '{0}' is a duplicate")]
    DuplicateTableName(String),

    /// Temporary table declared twice
    #[error("temporary table '{0}' is redeclared")]
    TemporaryTableRedeclared(String),

    /// Variable referenced before declaration
    #[error("variable '{0}' is undeclared")]
    VariableNotDeclared(String),

    /// Variable declared twice in one scope
    #[error("variable '{0}' is redeclared")]
    VariableRedeclared(String),

    /// Function name resolves to nothing
    #[error("function '{0}' does not exist")]
    FunctionNotExist(String),

    /// User-defined function declared twice
    #[error("function '{0}' is redeclared")]
    FunctionRedeclared(String),

    /// Cursor name resolves to nothing
    #[error("cursor '{0}' is undeclared")]
    CursorNotExist(String),

    /// Cursor declared twice
    #[error("cursor '{0}' is redeclared")]
    CursorRedeclared(String),

    /// Environment variable does not exist
    #[error("environment variable '{0}' is not set")]
    EnvironmentVariableNotSet(String),

    // =========================================================================
    // Type errors
    // =========================================================================
    /// Wrong number of arguments for a function
    #[error("function '{name}' takes {expected}, got {got}")]
    FunctionArgumentLength {
        name: String,
        expected: String,
        got: usize,
    },

    /// An argument could not be converted to the required type
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// OFFSET value is not an integer
    #[error("offset value {0} is not an integer")]
    InvalidOffsetNumber(String),

    /// LIMIT value is not an integer
    #[error("limit value {0} is not an integer")]
    InvalidLimitNumber(String),

    /// LIMIT PERCENT value is not a number
    #[error("limit percentage {0} is not a float")]
    InvalidLimitPercentage(String),

    /// FETCH position value is not an integer
    #[error("fetch position {0} is not an integer")]
    InvalidFetchPosition(String),

    /// Flag name is not recognized by SET @@FLAG
    #[error("'{0}' is an unknown flag name")]
    InvalidFlagName(String),

    /// Flag value cannot be applied
    #[error("'{value}' is an invalid value for {name}")]
    InvalidFlagValue { name: String, value: String },

    // =========================================================================
    // Semantic errors
    // =========================================================================
    /// Aggregate or list function evaluated against an ungrouped view.
    /// The only recoverable error: HAVING and SELECT retry once after
    /// promoting the view with group-all.
    #[error("function '{0}' cannot aggregate not grouping records")]
    NotGroupingRecords(String),

    /// Non-key column read as a scalar from a grouped view
    #[error("field '{0}' is not a group key")]
    FieldNotGroupKey(String),

    /// Aggregate nested inside an aggregate argument
    #[error("aggregate functions are nested")]
    NestedAggregateFunctions,

    /// Analytic function in a clause that does not accept one
    #[error("analytic function '{0}' cannot be used in this clause")]
    AnalyticFunctionNotAllowed(String),

    /// Scalar subquery produced more than one record
    #[error("subquery returns too many records, should return only one record")]
    SubqueryTooManyRecords,

    /// Scalar subquery produced more than one field
    #[error("subquery returns too many fields, should return only one field")]
    SubqueryTooManyFields,

    /// INSERT row value arity mismatch
    #[error("row value should contain exactly {expected} values")]
    InsertRowValueLength { expected: usize },

    /// INSERT SELECT arity mismatch
    #[error("select query should return exactly {expected} fields")]
    InsertSelectFieldLength { expected: usize },

    /// Set operation over views of different widths
    #[error("{operation}: field length does not match")]
    FieldLengthNotMatch { operation: String },

    /// Recursive CTE exceeded the configured iteration limit
    #[error("iteration of recursive query exceeded the limit {0}")]
    RecursionExceededLimit(i64),

    /// A joined row maps the same physical record twice in one UPDATE
    #[error("record to update is ambiguous")]
    UpdateRecordAmbiguous,

    /// UPDATE SET targets a table that is not listed for update
    #[error("table '{0}' is not specified in tables to update")]
    UpdateTableUnspecified(String),

    /// DELETE without an explicit target over a joined FROM
    #[error("tables to delete records are not specified")]
    DeleteTableUnspecified,

    /// Internal id column requested from a view that has none
    #[error("internal record id does not exist")]
    InternalIdNotExist,

    /// Internal id cell holds no ordinal (row came from the padded side
    /// of an outer join)
    #[error("internal record id is empty")]
    InternalIdEmpty,

    /// Cursor operated in the wrong state
    #[error("cursor '{0}' is closed")]
    CursorClosed(String),

    /// Cursor opened twice
    #[error("cursor '{0}' is already open")]
    CursorOpen(String),

    /// FETCH variable arity mismatch
    #[error("fetching from cursor '{name}' returns {returned} values for {variables} variables")]
    CursorFetchLength {
        name: String,
        returned: usize,
        variables: usize,
    },

    /// STDIN referenced but nothing is piped in
    #[error("stdin is empty")]
    StdinEmpty,

    /// EXECUTE without a configured statement parser
    #[error("no statement parser is configured for EXECUTE")]
    ExecuteWithoutParser,

    // =========================================================================
    // I/O errors
    // =========================================================================
    /// Wrapped filesystem error
    #[error("file {path}: {message}")]
    Io { path: String, message: String },

    /// Lock file could not be acquired within the wait timeout
    #[error("file '{0}' is locked by another process")]
    FileLockTimeout(String),

    /// Source bytes could not be decoded as the selected format
    #[error("data parse error in file {path}: {message}")]
    DataParsing { path: String, message: String },

    /// CREATE TABLE over an existing file
    #[error("file '{0}' already exists")]
    FileAlreadyExists(String),

    /// Commit failed while flushing one file
    #[error("commit failed on file {path}: {message}")]
    CommitFailed { path: String, message: String },

    // =========================================================================
    // Cancellation
    // =========================================================================
    /// Statement cancelled through the execution context
    #[error("query execution cancelled")]
    Cancelled,

    // =========================================================================
    // External parser & internal errors
    // =========================================================================
    /// Error surfaced by the external SQL text parser
    #[error("parse error: {0}")]
    Parse(String),

    /// Unexpected invariant violation
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new Io error
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new DataParsing error
    pub fn data_parsing(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::DataParsing {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Check if this is a "not found" resolution error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::FieldNotExist(_)
                | Error::FileNotFound(_)
                | Error::VariableNotDeclared(_)
                | Error::FunctionNotExist(_)
                | Error::CursorNotExist(_)
        )
    }

    /// Check if this is the grouping error that HAVING/SELECT may recover
    /// from by promoting the view with group-all
    pub fn is_not_grouping(&self) -> bool {
        matches!(self, Error::NotGroupingRecords(_))
    }

    /// Check if this error was raised by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Process exit code for a program that terminated with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Parse(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::FieldNotExist("price".to_string()).to_string(),
            "field 'price' does not exist"
        );
        assert_eq!(
            Error::UpdateRecordAmbiguous.to_string(),
            "record to update is ambiguous"
        );
        assert_eq!(
            Error::NotGroupingRecords("count".to_string()).to_string(),
            "function 'count' cannot aggregate not grouping records"
        );
        assert_eq!(
            Error::FieldLengthNotMatch {
                operation: "UNION".to_string()
            }
            .to_string(),
            "UNION: field length does not match"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::FieldNotExist("c".to_string()).is_not_found());
        assert!(Error::FileNotFound("t.csv".to_string()).is_not_found());
        assert!(!Error::UpdateRecordAmbiguous.is_not_found());

        assert!(Error::NotGroupingRecords("sum".to_string()).is_not_grouping());
        assert!(!Error::FieldAmbiguous("c".to_string()).is_not_grouping());

        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Parse("bad token".to_string()).exit_code(), 2);
        assert_eq!(Error::Cancelled.exit_code(), 1);
        assert_eq!(Error::internal("boom").exit_code(), 1);
    }
}
