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

//! File format codecs
//!
//! Decoding and encoding for the supported table formats (CSV, TSV,
//! fixed-width, LTSV, JSON), byte-level text handling, and the locking
//! file handler. The executor talks to this module only through
//! [`load_table`], [`encode_table`], [`FileHandler`] and [`FileInfo`], so
//! formats stay replaceable.

pub mod delimited;
pub mod file_info;
pub mod fixed;
pub mod handler;
pub mod json;
pub mod ltsv;
pub mod text;

pub use file_info::{Encoding, FileInfo, Format, LineBreak};
pub use handler::{create_new_file, FileHandler};

use crate::core::{Error, Result, Value};

/// A raw decoded field; None is NULL (e.g. an unquoted empty CSV field)
pub type RawField = Option<String>;

/// Streaming source of raw records
pub trait RecordReader {
    /// Read the next record, or None at end of input
    fn read(&mut self) -> Result<Option<Vec<RawField>>>;
}

/// A decoded table before it becomes a view
#[derive(Debug)]
pub struct LoadedTable {
    pub columns: Vec<String>,
    pub records: Vec<Vec<Value>>,
    /// Effective fixed-format positions, echoed back so auto-detected
    /// ones can be reused on write
    pub delimiter_positions: Vec<usize>,
}

/// Decode text into a table according to the descriptor. `without_null`
/// turns missing fields into empty strings instead of NULLs.
pub fn load_table(info: &FileInfo, content: &str, without_null: bool) -> Result<LoadedTable> {
    match info.format {
        Format::Csv | Format::Tsv => {
            let delimiter = if info.format == Format::Tsv {
                '\t'
            } else {
                info.delimiter
            };
            let mut reader = delimited::DelimitedReader::new(&info.path, content, delimiter);
            let mut raw_rows: Vec<Vec<RawField>> = Vec::new();
            while let Some(record) = reader.read()? {
                raw_rows.push(record);
            }
            let (columns, rows) = split_header(&info.path, info.no_header, raw_rows)?;
            Ok(LoadedTable {
                columns,
                records: materialize(rows, without_null),
                delimiter_positions: Vec::new(),
            })
        }
        Format::Fixed => {
            let (positions, raw_rows) = fixed::read(
                &info.path,
                content,
                &info.delimiter_positions,
                info.single_line,
            )?;
            let (columns, rows) = split_header(&info.path, info.no_header, raw_rows)?;
            Ok(LoadedTable {
                columns,
                records: materialize(rows, without_null),
                delimiter_positions: positions,
            })
        }
        Format::Ltsv => {
            let (columns, rows) = ltsv::read(&info.path, content)?;
            Ok(LoadedTable {
                columns,
                records: materialize(rows, without_null),
                delimiter_positions: Vec::new(),
            })
        }
        Format::Json => {
            let (columns, records) = json::read(&info.path, content, &info.json_query)?;
            Ok(LoadedTable {
                columns,
                records,
                delimiter_positions: Vec::new(),
            })
        }
    }
}

fn split_header(
    path: &str,
    no_header: bool,
    mut rows: Vec<Vec<RawField>>,
) -> Result<(Vec<String>, Vec<Vec<RawField>>)> {
    let columns: Vec<String> = if no_header {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        (1..=width).map(|i| format!("c{}", i)).collect()
    } else {
        if rows.is_empty() {
            return Err(Error::data_parsing(path, "the file is empty"));
        }
        rows.remove(0)
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.unwrap_or_else(|| format!("c{}", i + 1)))
            .collect()
    };

    for (i, row) in rows.iter().enumerate() {
        if columns.len() < row.len() {
            return Err(Error::data_parsing(
                path,
                format!("record {}: field count exceeds the header", i + 1),
            ));
        }
    }
    Ok((columns, rows))
}

fn materialize(rows: Vec<Vec<RawField>>, without_null: bool) -> Vec<Vec<Value>> {
    rows.into_iter()
        .map(|row| {
            let values: Vec<Value> = row
                .into_iter()
                .map(|f| match f {
                    Some(s) => Value::text(s),
                    None if without_null => Value::text(""),
                    None => Value::Null,
                })
                .collect();
            values
        })
        .collect()
}

/// Encode a table for writing according to the descriptor
pub fn encode_table(info: &FileInfo, columns: &[String], records: &[Vec<Value>]) -> Result<String> {
    let header = if info.no_header { None } else { Some(columns) };
    match info.format {
        Format::Csv | Format::Tsv => {
            let delimiter = if info.format == Format::Tsv {
                '\t'
            } else {
                info.delimiter
            };
            Ok(delimited::encode(
                header.map(|h| &h[..]),
                records,
                delimiter,
                info.enclose_all,
                info.line_break,
            ))
        }
        Format::Fixed => {
            let positions = if info.delimiter_positions.is_empty() {
                natural_positions(columns, records, info.no_header)
            } else {
                info.delimiter_positions.clone()
            };
            fixed::encode(
                &info.path,
                header.map(|h| &h[..]),
                records,
                &positions,
                info.line_break.as_str(),
                info.single_line,
            )
        }
        Format::Ltsv => Ok(ltsv::encode(columns, records, info.line_break.as_str())),
        Format::Json => Ok(json::encode(columns, records, info.json_escape)),
    }
}

/// Column end positions sized to the widest value of each column, with one
/// space of padding between columns
fn natural_positions(columns: &[String], records: &[Vec<Value>], no_header: bool) -> Vec<usize> {
    let mut widths: Vec<usize> = if no_header {
        vec![0; columns.len()]
    } else {
        columns.iter().map(String::len).collect()
    };
    for record in records {
        for (i, v) in record.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(v.serialize().len());
            }
        }
    }
    let mut positions = Vec::with_capacity(widths.len());
    let mut total = 0;
    for (i, w) in widths.iter().enumerate() {
        total += w + usize::from(i + 1 < widths.len());
        positions.push(total);
    }
    positions
}
