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

//! Source descriptors
//!
//! A FileInfo describes where a view came from and how to write it back:
//! format, delimiter, encoding, line break, plus the header/record snapshot
//! captured at load time that commit uses to detect actual modification.

use std::path::Path;

use crate::core::{Header, RecordSet};

/// Table file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Csv,
    Tsv,
    Fixed,
    Ltsv,
    Json,
}

impl Format {
    /// Select a format from a file extension; unknown extensions read as
    /// CSV with the session delimiter.
    pub fn from_extension(path: &str) -> Format {
        match Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") => Format::Tsv,
            Some("ltsv") => Format::Ltsv,
            Some("json") => Format::Json,
            _ => Format::Csv,
        }
    }
}

/// Text encoding of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf8Bom,
    Utf16Be,
    Utf16Le,
}

impl Encoding {
    pub fn parse(s: &str) -> Option<Encoding> {
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "UTF8" => Some(Encoding::Utf8),
            "UTF8M" | "UTF8BOM" => Some(Encoding::Utf8Bom),
            "UTF16" | "UTF16BE" => Some(Encoding::Utf16Be),
            "UTF16LE" => Some(Encoding::Utf16Le),
            _ => None,
        }
    }
}

/// Record separator of a source file, preserved on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreak {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineBreak::Lf => "\n",
            LineBreak::CrLf => "\r\n",
            LineBreak::Cr => "\r",
        }
    }

    pub fn parse(s: &str) -> Option<LineBreak> {
        match s.to_ascii_uppercase().as_str() {
            "LF" => Some(LineBreak::Lf),
            "CRLF" => Some(LineBreak::CrLf),
            "CR" => Some(LineBreak::Cr),
            _ => None,
        }
    }
}

/// Descriptor of the file backing a view
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    /// Normalized absolute path, or the temporary-view name
    pub path: String,
    pub format: Format,
    /// Field delimiter for CSV; TSV implies a tab
    pub delimiter: char,
    /// Fixed-format column end positions; empty means auto-detect
    pub delimiter_positions: Vec<usize>,
    /// Fixed-format single-line mode
    pub single_line: bool,
    /// JSON path query selecting the table array
    pub json_query: String,
    pub encoding: Encoding,
    pub line_break: LineBreak,
    pub no_header: bool,
    pub enclose_all: bool,
    /// Escape non-ASCII characters when writing JSON
    pub json_escape: bool,
    /// Temporary views (stdin, declared tables, JSON_TABLE results) are
    /// never flushed by commit
    pub is_temporary: bool,
    /// Header snapshot taken when the view was loaded
    pub initial_header: Option<Header>,
    /// Record snapshot taken when the view was loaded
    pub initial_record_set: Option<RecordSet>,
}

impl FileInfo {
    pub fn new(path: impl Into<String>, format: Format) -> FileInfo {
        let delimiter = if format == Format::Tsv { '\t' } else { ',' };
        FileInfo {
            path: path.into(),
            format,
            delimiter,
            ..Default::default()
        }
    }

    /// A descriptor for a view with no backing file
    pub fn temporary(path: impl Into<String>) -> FileInfo {
        FileInfo {
            path: path.into(),
            is_temporary: true,
            delimiter: ',',
            ..Default::default()
        }
    }

    /// Record the load-time snapshot used by commit diffing
    pub fn capture_snapshot(&mut self, header: &Header, records: &RecordSet) {
        self.initial_header = Some(header.clone());
        self.initial_record_set = Some(records.clone());
    }

    /// True when the given state differs from the load-time snapshot
    pub fn is_modified(&self, header: &Header, records: &RecordSet) -> bool {
        match (&self.initial_header, &self.initial_record_set) {
            (Some(h), Some(r)) => h != header || r != records,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Record, Value};

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_extension("a.csv"), Format::Csv);
        assert_eq!(Format::from_extension("a.TSV"), Format::Tsv);
        assert_eq!(Format::from_extension("a.ltsv"), Format::Ltsv);
        assert_eq!(Format::from_extension("a.json"), Format::Json);
        assert_eq!(Format::from_extension("a.txt"), Format::Csv);
    }

    #[test]
    fn test_encoding_parse() {
        assert_eq!(Encoding::parse("utf8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::parse("UTF-16LE"), Some(Encoding::Utf16Le));
        assert_eq!(Encoding::parse("latin1"), None);
    }

    #[test]
    fn test_snapshot_diffing() {
        let header = Header::new("t", &["a".to_string()]).unwrap();
        let records = vec![Record::from_values(vec![Value::Integer(1)])];

        let mut info = FileInfo::new("t.csv", Format::Csv);
        info.capture_snapshot(&header, &records);
        assert!(!info.is_modified(&header, &records));

        let changed = vec![Record::from_values(vec![Value::Integer(2)])];
        assert!(info.is_modified(&header, &changed));
    }
}
