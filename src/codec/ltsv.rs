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

//! LTSV (labeled tab-separated values)
//!
//! Each line holds `label:value` pairs joined by tabs. The header is the
//! union of labels in first-seen order; records missing a label read NULL
//! for it.

use rustc_hash::FxHashMap;

use crate::codec::text::split_lines;
use crate::core::{Error, Result, Value};

/// Read LTSV text into a header (first-seen label order) and raw rows
pub fn read(path: &str, text: &str) -> Result<(Vec<String>, Vec<Vec<Option<String>>>)> {
    let lines = split_lines(text);

    let mut labels: Vec<String> = Vec::new();
    let mut label_index: FxHashMap<String, usize> = FxHashMap::default();
    let mut pairs_per_line: Vec<Vec<(usize, String)>> = Vec::with_capacity(lines.len());

    for (lineno, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut pairs = Vec::new();
        for part in line.split('\t') {
            let (label, value) = part.split_once(':').ok_or_else(|| {
                Error::data_parsing(path, format!("line {}: missing label separator", lineno + 1))
            })?;
            let idx = match label_index.get(label) {
                Some(&idx) => idx,
                None => {
                    labels.push(label.to_string());
                    label_index.insert(label.to_string(), labels.len() - 1);
                    labels.len() - 1
                }
            };
            pairs.push((idx, value.to_string()));
        }
        pairs_per_line.push(pairs);
    }

    let rows = pairs_per_line
        .into_iter()
        .map(|pairs| {
            let mut row: Vec<Option<String>> = vec![None; labels.len()];
            for (idx, value) in pairs {
                row[idx] = Some(value);
            }
            row
        })
        .collect();

    Ok((labels, rows))
}

/// Encode records as LTSV, skipping NULL fields
pub fn encode(columns: &[String], records: &[Vec<Value>], line_break: &str) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if 0 < i {
            out.push_str(line_break);
        }
        let mut first = true;
        for (label, value) in columns.iter().zip(record.iter()) {
            if value.is_null() || value.is_unknown() {
                continue;
            }
            if !first {
                out.push('\t');
            }
            first = false;
            out.push_str(label);
            out.push(':');
            out.push_str(&value.serialize());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_union_header() {
        let (labels, rows) = read("t.ltsv", "a:1\tb:2\nb:3\tc:4").unwrap();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(
            rows[0],
            vec![Some("1".to_string()), Some("2".to_string()), None]
        );
        assert_eq!(
            rows[1],
            vec![None, Some("3".to_string()), Some("4".to_string())]
        );
    }

    #[test]
    fn test_read_rejects_bare_value() {
        assert!(read("t.ltsv", "a:1\tnope").is_err());
    }

    #[test]
    fn test_encode_skips_null() {
        let out = encode(
            &["a".to_string(), "b".to_string()],
            &[vec![Value::Integer(1), Value::Null]],
            "\n",
        );
        assert_eq!(out, "a:1");
    }

    #[test]
    fn test_roundtrip() {
        let columns = vec!["x".to_string(), "y".to_string()];
        let rows = vec![
            vec![Value::text("1"), Value::text("2")],
            vec![Value::text("3"), Value::text("4")],
        ];
        let text = encode(&columns, &rows, "\n");
        let (labels, raw) = read("t.ltsv", &text).unwrap();
        assert_eq!(labels, columns);
        assert_eq!(raw[1], vec![Some("3".to_string()), Some("4".to_string())]);
    }
}
