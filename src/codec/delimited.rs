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

//! Delimited text (CSV/TSV)
//!
//! Reader and encoder for delimiter-separated records with double-quote
//! enclosure. An unquoted empty field reads as NULL; a quoted empty field
//! reads as the empty string. The encoder quotes minimally unless
//! enclose-all is set.

use crate::codec::file_info::LineBreak;
use crate::codec::{RawField, RecordReader};
use crate::core::{Error, Result, Value};

/// Streaming reader over delimited text
pub struct DelimitedReader<'a> {
    path: String,
    text: &'a [u8],
    pos: usize,
    delimiter: u8,
    line: usize,
}

impl<'a> DelimitedReader<'a> {
    pub fn new(path: &str, text: &'a str, delimiter: char) -> DelimitedReader<'a> {
        DelimitedReader {
            path: path.to_string(),
            text: text.as_bytes(),
            pos: 0,
            delimiter: delimiter as u8,
            line: 1,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Read one field; returns (field, record_done)
    fn read_field(&mut self) -> Result<(RawField, bool)> {
        if self.text.get(self.pos) == Some(&b'"') {
            self.pos += 1;
            let mut value = Vec::new();
            loop {
                match self.text.get(self.pos) {
                    None => {
                        return Err(Error::data_parsing(
                            &self.path,
                            format!("line {}: unterminated enclosure", self.line),
                        ))
                    }
                    Some(b'"') => {
                        if self.text.get(self.pos + 1) == Some(&b'"') {
                            value.push(b'"');
                            self.pos += 2;
                        } else {
                            self.pos += 1;
                            break;
                        }
                    }
                    Some(&b) => {
                        if b == b'\n' {
                            self.line += 1;
                        }
                        value.push(b);
                        self.pos += 1;
                    }
                }
            }
            let text = String::from_utf8(value)
                .map_err(|e| Error::data_parsing(&self.path, e.to_string()))?;
            let done = self.consume_separator()?;
            Ok((Some(text), done))
        } else {
            let start = self.pos;
            while let Some(&b) = self.text.get(self.pos) {
                if b == self.delimiter || b == b'\n' || b == b'\r' {
                    break;
                }
                self.pos += 1;
            }
            let raw = std::str::from_utf8(&self.text[start..self.pos])
                .map_err(|e| Error::data_parsing(&self.path, e.to_string()))?;
            let field = if raw.is_empty() {
                None
            } else {
                Some(raw.to_string())
            };
            let done = self.consume_separator()?;
            Ok((field, done))
        }
    }

    /// Consume the delimiter or line break after a field; returns true
    /// when the record ended
    fn consume_separator(&mut self) -> Result<bool> {
        match self.text.get(self.pos) {
            None => Ok(true),
            Some(&b) if b == self.delimiter => {
                self.pos += 1;
                Ok(false)
            }
            Some(b'\n') => {
                self.pos += 1;
                self.line += 1;
                Ok(true)
            }
            Some(b'\r') => {
                self.pos += 1;
                if self.text.get(self.pos) == Some(&b'\n') {
                    self.pos += 1;
                }
                self.line += 1;
                Ok(true)
            }
            Some(_) => Err(Error::data_parsing(
                &self.path,
                format!("line {}: character after enclosure", self.line),
            )),
        }
    }
}

impl RecordReader for DelimitedReader<'_> {
    fn read(&mut self) -> Result<Option<Vec<RawField>>> {
        if self.at_end() {
            return Ok(None);
        }
        let mut fields = Vec::new();
        loop {
            let (field, done) = self.read_field()?;
            fields.push(field);
            if done {
                break;
            }
        }
        Ok(Some(fields))
    }
}

/// Render a field for delimited output. NULL writes nothing; the empty
/// string is enclosed so it reads back as a string.
fn encode_field(out: &mut String, value: &Value, delimiter: char, enclose_all: bool) {
    if value.is_null() || value.is_unknown() {
        return;
    }
    let text = value.serialize();
    let is_text = matches!(value, Value::String(_));
    let needs_quotes = enclose_all && is_text
        || text.is_empty()
        || text.contains(delimiter)
        || text.contains('"')
        || text.contains('\n')
        || text.contains('\r');
    if needs_quotes {
        out.push('"');
        for c in text.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(&text);
    }
}

/// Encode records as delimited text
pub fn encode(
    header: Option<&[String]>,
    records: &[Vec<Value>],
    delimiter: char,
    enclose_all: bool,
    line_break: LineBreak,
) -> String {
    let br = line_break.as_str();
    let mut out = String::new();
    let mut first_line = true;

    if let Some(columns) = header {
        for (i, c) in columns.iter().enumerate() {
            if 0 < i {
                out.push(delimiter);
            }
            encode_field(&mut out, &Value::text(c), delimiter, enclose_all);
        }
        first_line = false;
    }

    for record in records {
        if !first_line {
            out.push_str(br);
        }
        first_line = false;
        for (i, v) in record.iter().enumerate() {
            if 0 < i {
                out.push(delimiter);
            }
            encode_field(&mut out, v, delimiter, enclose_all);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(text: &str, delimiter: char) -> Vec<Vec<RawField>> {
        let mut reader = DelimitedReader::new("t.csv", text, delimiter);
        let mut out = Vec::new();
        while let Some(record) = reader.read().unwrap() {
            out.push(record);
        }
        out
    }

    #[test]
    fn test_read_plain() {
        let records = read_all("a,b\n1,2\n3,4", ',');
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[1],
            vec![Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[test]
    fn test_unquoted_empty_is_null() {
        let records = read_all("a,,c\n", ',');
        assert_eq!(
            records[0],
            vec![Some("a".to_string()), None, Some("c".to_string())]
        );
    }

    #[test]
    fn test_quoted_fields() {
        let records = read_all("\"a,b\",\"x\"\"y\",\"\"\n", ',');
        assert_eq!(
            records[0],
            vec![
                Some("a,b".to_string()),
                Some("x\"y".to_string()),
                Some("".to_string()),
            ]
        );
    }

    #[test]
    fn test_quoted_newline() {
        let records = read_all("\"a\nb\",c\nd,e", ',');
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], Some("a\nb".to_string()));
    }

    #[test]
    fn test_unterminated_enclosure() {
        let mut reader = DelimitedReader::new("t.csv", "\"abc", ',');
        assert!(reader.read().is_err());
    }

    #[test]
    fn test_tsv() {
        let records = read_all("a\tb\n1\t2", '\t');
        assert_eq!(
            records[1],
            vec![Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[test]
    fn test_encode_minimal_quoting() {
        let out = encode(
            Some(&["a".to_string(), "b".to_string()]),
            &[
                vec![Value::text("x,y"), Value::Integer(1)],
                vec![Value::Null, Value::text("")],
            ],
            ',',
            false,
            LineBreak::Lf,
        );
        assert_eq!(out, "a,b\n\"x,y\",1\n,\"\"");
    }

    #[test]
    fn test_encode_roundtrip() {
        let rows = vec![
            vec![Value::text("a\"b"), Value::Null],
            vec![Value::text(""), Value::text("line\nbreak")],
        ];
        let text = encode(None, &rows, ',', false, LineBreak::Lf);
        let records = read_all(&text, ',');
        assert_eq!(records[0], vec![Some("a\"b".to_string()), None]);
        assert_eq!(
            records[1],
            vec![Some("".to_string()), Some("line\nbreak".to_string())]
        );
    }

    #[test]
    fn test_encode_enclose_all() {
        let out = encode(
            None,
            &[vec![Value::text("plain"), Value::Integer(3)]],
            ',',
            true,
            LineBreak::Lf,
        );
        assert_eq!(out, "\"plain\",3");
    }
}
