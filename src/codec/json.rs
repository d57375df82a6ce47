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

//! JSON tables
//!
//! A JSON source is a document plus a path query selecting an array of
//! objects. The header is the union of object keys in first-seen order;
//! values keep their JSON types, nested structures read as JSON text.

use rustc_hash::FxHashMap;
use serde_json as json;

use crate::core::{Error, Result, Value};

/// Load a JSON table. The query is a dot-separated key path with optional
/// `[n]` index steps; the empty query selects the document root.
pub fn read(path: &str, text: &str, query: &str) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let doc: json::Value =
        json::from_str(text).map_err(|e| Error::data_parsing(path, e.to_string()))?;

    let selected = select(path, &doc, query)?;
    let rows: Vec<json::Value> = match selected {
        json::Value::Array(items) => items.clone(),
        json::Value::Object(_) => vec![selected.clone()],
        _ => {
            return Err(Error::data_parsing(
                path,
                format!("json query '{}' does not select a table", query),
            ))
        }
    };

    let mut columns: Vec<String> = Vec::new();
    let mut column_index: FxHashMap<String, usize> = FxHashMap::default();
    let mut sparse_rows: Vec<Vec<(usize, Value)>> = Vec::with_capacity(rows.len());

    for row in &rows {
        let object = match row {
            json::Value::Object(map) => map,
            _ => {
                return Err(Error::data_parsing(
                    path,
                    "json table rows must be objects",
                ))
            }
        };
        let mut cells = Vec::with_capacity(object.len());
        for (key, value) in object {
            let idx = match column_index.get(key.as_str()) {
                Some(&idx) => idx,
                None => {
                    columns.push(key.clone());
                    column_index.insert(key.clone(), columns.len() - 1);
                    columns.len() - 1
                }
            };
            cells.push((idx, from_json(value)));
        }
        sparse_rows.push(cells);
    }

    let records = sparse_rows
        .into_iter()
        .map(|cells| {
            let mut row = vec![Value::Null; columns.len()];
            for (idx, value) in cells {
                row[idx] = value;
            }
            row
        })
        .collect();

    Ok((columns, records))
}

fn select<'a>(path: &str, doc: &'a json::Value, query: &str) -> Result<&'a json::Value> {
    let mut current = doc;
    for segment in query.split('.').filter(|s| !s.is_empty()) {
        let (key, indexes) = parse_segment(path, segment)?;
        if !key.is_empty() {
            current = current
                .get(key)
                .ok_or_else(|| Error::data_parsing(path, format!("json key '{}' not found", key)))?;
        }
        for idx in indexes {
            current = current.get(idx).ok_or_else(|| {
                Error::data_parsing(path, format!("json index {} out of range", idx))
            })?;
        }
    }
    Ok(current)
}

fn parse_segment<'a>(path: &str, segment: &'a str) -> Result<(&'a str, Vec<usize>)> {
    match segment.find('[') {
        None => Ok((segment, Vec::new())),
        Some(bracket) => {
            let key = &segment[..bracket];
            let mut indexes = Vec::new();
            for part in segment[bracket..].split('[').filter(|s| !s.is_empty()) {
                let number = part.strip_suffix(']').ok_or_else(|| {
                    Error::data_parsing(path, format!("malformed json query segment '{}'", segment))
                })?;
                indexes.push(number.parse::<usize>().map_err(|_| {
                    Error::data_parsing(path, format!("malformed json query segment '{}'", segment))
                })?);
            }
            Ok((key, indexes))
        }
    }
}

fn from_json(value: &json::Value) -> Value {
    match value {
        json::Value::Null => Value::Null,
        json::Value::Bool(b) => Value::Boolean(*b),
        json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                n.as_f64().map(Value::Float).unwrap_or(Value::Null)
            }
        }
        json::Value::String(s) => Value::text(s),
        nested => Value::text(nested.to_string()),
    }
}

fn to_json(value: &Value) -> json::Value {
    if value.is_unknown() {
        return json::Value::Null;
    }
    match value {
        Value::Null => json::Value::Null,
        Value::Boolean(b) => json::Value::Bool(*b),
        Value::Integer(i) => json::Value::from(*i),
        Value::Float(f) => json::Number::from_f64(*f)
            .map(json::Value::Number)
            .unwrap_or(json::Value::Null),
        other => json::Value::String(other.serialize()),
    }
}

/// Encode records as a JSON array of objects. With `escape`, non-ASCII
/// characters write as `\u` sequences.
pub fn encode(columns: &[String], records: &[Vec<Value>], escape: bool) -> String {
    let rows: Vec<json::Value> = records
        .iter()
        .map(|record| {
            let mut object = json::Map::with_capacity(columns.len());
            for (column, value) in columns.iter().zip(record.iter()) {
                object.insert(column.clone(), to_json(value));
            }
            json::Value::Object(object)
        })
        .collect();
    let text =
        json::to_string_pretty(&json::Value::Array(rows)).unwrap_or_else(|_| "[]".to_string());
    if escape {
        escape_non_ascii(&text)
    } else {
        text
    }
}

fn escape_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut [0u16; 2]) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Build a JSON array from a list of values, for JSON_AGG
pub fn aggregate_array(values: &[Value]) -> String {
    let items: Vec<json::Value> = values.iter().map(to_json).collect();
    json::Value::Array(items).to_string()
}
