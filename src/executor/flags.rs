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

//! Session flags
//!
//! Read at startup, mutable through `SET @@FLAG = value` and
//! `ADD/REMOVE FLAG ELEMENT`, readable as `@@FLAG` expressions.

use std::path::PathBuf;
use std::time::Duration;

use crate::codec::{Encoding, Format, LineBreak};
use crate::core::{Error, Result, Value};

/// Runtime configuration of a session
#[derive(Debug, Clone)]
pub struct Flags {
    /// Base directory for relative table paths
    pub repository: PathBuf,
    /// Forced import format; None selects by extension
    pub import_format: Option<Format>,
    /// CSV field delimiter
    pub delimiter: char,
    /// Fixed-format column end positions
    pub delimiter_positions: Vec<usize>,
    /// Fixed-format single-line mode
    pub single_line: bool,
    /// Default JSON table query
    pub json_query: String,
    /// Forced read encoding; None detects by BOM
    pub encoding: Option<Encoding>,
    /// Encoding for newly created files and exports
    pub write_encoding: Encoding,
    /// Forced line break on write; None preserves the source convention
    pub line_break: Option<LineBreak>,
    /// Read tables as headerless (columns named c1, c2, ...)
    pub no_header: bool,
    /// Read empty fields as empty strings instead of NULLs
    pub without_null: bool,
    /// Enclose every text field on write
    pub enclose_all: bool,
    /// Case-insensitive string comparison
    pub ignore_case: bool,
    /// Escape non-ASCII characters in JSON output
    pub json_escape: bool,
    /// Parser collaborators: treat double-quoted tokens as identifiers
    pub ansi_quotes: bool,
    /// Display collaborators: assume ambiguous-width characters are wide
    pub east_asian_encoding: bool,
    /// Display collaborators: count diacritical signs as width
    pub count_diacritical_sign: bool,
    /// Display collaborators: count format codes as width
    pub count_format_code: bool,
    /// Export format for SELECT results emitted at commit
    pub export_format: Format,
    /// Export delimiter
    pub write_delimiter: char,
    /// Datetime formats tried before the built-in list
    pub datetime_formats: Vec<String>,
    /// Iteration cap for recursive queries
    pub limit_recursion: i64,
    /// Worker count for data-parallel passes
    pub cpu: usize,
    /// How long to wait for a file lock
    pub wait_timeout: Duration,
    /// Delay between lock acquisition attempts
    pub retry_delay: Duration,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            repository: PathBuf::from("."),
            import_format: None,
            delimiter: ',',
            delimiter_positions: Vec::new(),
            single_line: false,
            json_query: String::new(),
            encoding: None,
            write_encoding: Encoding::Utf8,
            line_break: None,
            no_header: false,
            without_null: false,
            enclose_all: false,
            ignore_case: false,
            json_escape: false,
            ansi_quotes: false,
            east_asian_encoding: false,
            count_diacritical_sign: false,
            count_format_code: false,
            export_format: Format::Csv,
            write_delimiter: ',',
            datetime_formats: Vec::new(),
            limit_recursion: 1000,
            cpu: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            wait_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_millis(10),
        }
    }
}

impl Flags {
    /// Apply `SET @@name = value`
    pub fn set(&mut self, name: &str, value: &Value) -> Result<()> {
        let name_upper = name.to_uppercase();
        let invalid = || Error::InvalidFlagValue {
            name: name_upper.clone(),
            value: value.serialize(),
        };

        match name_upper.as_str() {
            "REPOSITORY" => {
                self.repository = PathBuf::from(as_string(value).ok_or_else(invalid)?);
            }
            "DELIMITER" => {
                let s = as_string(value).ok_or_else(invalid)?;
                let unescaped = unescape(&s);
                let mut chars = unescaped.chars();
                let (Some(c), None) = (chars.next(), chars.next()) else {
                    return Err(invalid());
                };
                self.delimiter = c;
            }
            "IMPORT_FORMAT" => {
                self.import_format = Some(parse_format(value).ok_or_else(invalid)?);
            }
            "EXPORT_FORMAT" => {
                self.export_format = parse_format(value).ok_or_else(invalid)?;
            }
            "WRITE_DELIMITER" => {
                let s = as_string(value).ok_or_else(invalid)?;
                let unescaped = unescape(&s);
                let mut chars = unescaped.chars();
                let (Some(c), None) = (chars.next(), chars.next()) else {
                    return Err(invalid());
                };
                self.write_delimiter = c;
            }
            "JSON_QUERY" => {
                self.json_query = as_string(value).ok_or_else(invalid)?;
            }
            "ENCODING" => {
                let s = as_string(value).ok_or_else(invalid)?;
                if s.eq_ignore_ascii_case("AUTO") {
                    self.encoding = None;
                } else {
                    self.encoding = Some(Encoding::parse(&s).ok_or_else(invalid)?);
                }
            }
            "WRITE_ENCODING" => {
                let s = as_string(value).ok_or_else(invalid)?;
                self.write_encoding = Encoding::parse(&s).ok_or_else(invalid)?;
            }
            "LINE_BREAK" => {
                let s = as_string(value).ok_or_else(invalid)?;
                self.line_break = Some(LineBreak::parse(&s).ok_or_else(invalid)?);
            }
            "NO_HEADER" => self.no_header = as_bool(value).ok_or_else(invalid)?,
            "WITHOUT_NULL" => self.without_null = as_bool(value).ok_or_else(invalid)?,
            "ENCLOSE_ALL" => self.enclose_all = as_bool(value).ok_or_else(invalid)?,
            "IGNORE_CASE" => self.ignore_case = as_bool(value).ok_or_else(invalid)?,
            "JSON_ESCAPE" => self.json_escape = as_bool(value).ok_or_else(invalid)?,
            "ANSI_QUOTES" => self.ansi_quotes = as_bool(value).ok_or_else(invalid)?,
            "EAST_ASIAN_ENCODING" => {
                self.east_asian_encoding = as_bool(value).ok_or_else(invalid)?
            }
            "COUNT_DIACRITICAL_SIGN" => {
                self.count_diacritical_sign = as_bool(value).ok_or_else(invalid)?
            }
            "COUNT_FORMAT_CODE" => {
                self.count_format_code = as_bool(value).ok_or_else(invalid)?
            }
            "DATETIME_FORMAT" => {
                self.datetime_formats = vec![as_string(value).ok_or_else(invalid)?];
            }
            "LIMIT_RECURSION" => {
                self.limit_recursion = value.as_integer().ok_or_else(invalid)?;
            }
            "CPU" => {
                let n = value.as_integer().filter(|&n| 0 < n).ok_or_else(invalid)?;
                self.cpu = n as usize;
            }
            "WAIT_TIMEOUT" => {
                let secs = value.as_float().filter(|s| 0.0 <= *s).ok_or_else(invalid)?;
                self.wait_timeout = Duration::from_secs_f64(secs);
            }
            "RETRY_DELAY" => {
                let millis = value.as_integer().filter(|&n| 0 <= n).ok_or_else(invalid)?;
                self.retry_delay = Duration::from_millis(millis as u64);
            }
            _ => return Err(Error::InvalidFlagName(name.to_string())),
        }
        Ok(())
    }

    /// Append an element to a list flag (`ADD ... TO @@FLAG`)
    pub fn add_element(&mut self, name: &str, value: &Value) -> Result<()> {
        match name.to_uppercase().as_str() {
            "DATETIME_FORMAT" => {
                let s = as_string(value).ok_or_else(|| Error::InvalidFlagValue {
                    name: name.to_uppercase(),
                    value: value.serialize(),
                })?;
                if !self.datetime_formats.contains(&s) {
                    self.datetime_formats.push(s);
                }
                Ok(())
            }
            _ => Err(Error::InvalidFlagName(name.to_string())),
        }
    }

    /// Remove an element from a list flag (`REMOVE ... FROM @@FLAG`)
    pub fn remove_element(&mut self, name: &str, value: &Value) -> Result<()> {
        match name.to_uppercase().as_str() {
            "DATETIME_FORMAT" => {
                if let Some(s) = as_string(value) {
                    self.datetime_formats.retain(|f| f != &s);
                }
                Ok(())
            }
            _ => Err(Error::InvalidFlagName(name.to_string())),
        }
    }

    /// Read `@@name`
    pub fn get(&self, name: &str) -> Result<Value> {
        let v = match name.to_uppercase().as_str() {
            "REPOSITORY" => Value::text(self.repository.display().to_string()),
            "DELIMITER" => Value::text(self.delimiter.to_string()),
            "WRITE_DELIMITER" => Value::text(self.write_delimiter.to_string()),
            "JSON_QUERY" => Value::text(&self.json_query),
            "NO_HEADER" => Value::Boolean(self.no_header),
            "WITHOUT_NULL" => Value::Boolean(self.without_null),
            "ENCLOSE_ALL" => Value::Boolean(self.enclose_all),
            "IGNORE_CASE" => Value::Boolean(self.ignore_case),
            "JSON_ESCAPE" => Value::Boolean(self.json_escape),
            "ANSI_QUOTES" => Value::Boolean(self.ansi_quotes),
            "EAST_ASIAN_ENCODING" => Value::Boolean(self.east_asian_encoding),
            "COUNT_DIACRITICAL_SIGN" => Value::Boolean(self.count_diacritical_sign),
            "COUNT_FORMAT_CODE" => Value::Boolean(self.count_format_code),
            "DATETIME_FORMAT" => Value::text(self.datetime_formats.join(",")),
            "LIMIT_RECURSION" => Value::Integer(self.limit_recursion),
            "CPU" => Value::Integer(self.cpu as i64),
            "WAIT_TIMEOUT" => Value::Float(self.wait_timeout.as_secs_f64()),
            "RETRY_DELAY" => Value::Integer(self.retry_delay.as_millis() as i64),
            _ => return Err(Error::InvalidFlagName(name.to_string())),
        };
        Ok(v)
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value.to_string_value() {
        Value::String(s) => Some(s.to_string()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value.to_boolean() {
        Value::Boolean(b) => Some(b),
        _ => None,
    }
}

fn unescape(s: &str) -> String {
    match s {
        "\\t" => "\t".to_string(),
        _ => s.to_string(),
    }
}

fn parse_format(value: &Value) -> Option<Format> {
    match as_string(value)?.to_uppercase().as_str() {
        "CSV" => Some(Format::Csv),
        "TSV" => Some(Format::Tsv),
        "FIXED" => Some(Format::Fixed),
        "LTSV" => Some(Format::Ltsv),
        "JSON" => Some(Format::Json),
        _ => None,
    }
}
