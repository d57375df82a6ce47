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

//! Fixed-width text
//!
//! Columns are cut at byte positions, either given explicitly
//! (JSON-encoded position list) or auto-detected from runs of spaces
//! shared by every line (`SPACES`). Single-line mode treats the whole
//! content as one record.

use crate::codec::text::split_lines;
use crate::core::{Error, Result, Value};

/// Column spans derived from cumulative end positions
fn spans_from_positions(positions: &[usize]) -> Vec<(usize, usize)> {
    let mut spans = Vec::with_capacity(positions.len());
    let mut start = 0;
    for &end in positions {
        spans.push((start, end));
        start = end;
    }
    spans
}

/// Detect column end positions from the byte columns that hold a space in
/// every line
pub fn detect_positions(lines: &[&str]) -> Vec<usize> {
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0);
    if width == 0 {
        return Vec::new();
    }

    let all_space = |col: usize| {
        lines
            .iter()
            .all(|l| l.as_bytes().get(col).map_or(true, |&b| b == b' '))
    };

    let mut positions = Vec::new();
    let mut in_field = false;
    for col in 0..width {
        if all_space(col) {
            if in_field {
                positions.push(col);
                in_field = false;
            }
        } else {
            in_field = true;
        }
    }
    if in_field {
        positions.push(width);
    }
    positions
}

/// Read fixed-width records. Returns the effective positions (detected
/// ones when none were given) alongside the raw rows; fields are
/// space-trimmed, empties read as NULL.
pub fn read(
    path: &str,
    text: &str,
    positions: &[usize],
    single_line: bool,
) -> Result<(Vec<usize>, Vec<Vec<Option<String>>>)> {
    let lines: Vec<&str> = if single_line {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![text]
        }
    } else {
        split_lines(text)
    };

    let positions: Vec<usize> = if positions.is_empty() {
        detect_positions(&lines)
    } else {
        let mut prev = 0;
        for &p in positions {
            if p < prev {
                return Err(Error::data_parsing(path, "invalid delimiter positions"));
            }
            prev = p;
        }
        positions.to_vec()
    };
    let spans = spans_from_positions(&positions);

    let mut rows = Vec::with_capacity(lines.len());
    for line in &lines {
        let bytes = line.as_bytes();
        let mut fields = Vec::with_capacity(spans.len());
        for &(start, end) in &spans {
            let start = start.min(bytes.len());
            let end = end.min(bytes.len());
            let raw = std::str::from_utf8(&bytes[start..end])
                .map_err(|_| Error::data_parsing(path, "position splits a multibyte character"))?;
            let trimmed = raw.trim();
            fields.push(if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            });
        }
        rows.push(fields);
    }
    Ok((positions, rows))
}

/// Encode records as fixed-width text, padding each field with spaces to
/// its column width
pub fn encode(
    path: &str,
    header: Option<&[String]>,
    records: &[Vec<Value>],
    positions: &[usize],
    line_break: &str,
    single_line: bool,
) -> Result<String> {
    let spans = spans_from_positions(positions);
    let mut out = String::new();
    let mut first = true;

    let mut write_row = |out: &mut String, fields: Vec<String>, first: &mut bool| -> Result<()> {
        if !*first {
            out.push_str(line_break);
        }
        *first = false;
        for (i, field) in fields.iter().enumerate() {
            let width = spans
                .get(i)
                .map(|&(s, e)| e - s)
                .ok_or_else(|| Error::data_parsing(path, "more fields than positions"))?;
            if width < field.len() {
                return Err(Error::data_parsing(
                    path,
                    format!("value '{}' exceeds the field width {}", field, width),
                ));
            }
            out.push_str(field);
            for _ in field.len()..width {
                out.push(' ');
            }
        }
        Ok(())
    };

    if let Some(columns) = header {
        write_row(&mut out, columns.to_vec(), &mut first)?;
    }
    for record in records {
        let fields: Vec<String> = record
            .iter()
            .map(|v| {
                if v.is_unknown() {
                    String::new()
                } else {
                    v.serialize()
                }
            })
            .collect();
        write_row(&mut out, fields, &mut first)?;
    }

    if single_line && out.contains(line_break) {
        return Err(Error::data_parsing(
            path,
            "single-line format cannot hold multiple records",
        ));
    }
    Ok(out)
}
