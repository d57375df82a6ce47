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

//! Text-level decoding
//!
//! Byte-to-text conversion with BOM-based encoding detection, and
//! line-break detection so writes can preserve the source convention.

use crate::codec::file_info::{Encoding, LineBreak};
use crate::core::{Error, Result};

/// Decode file bytes into text. A BOM pins the encoding; without one the
/// bytes must be valid UTF-8.
pub fn decode(path: &str, bytes: &[u8]) -> Result<(String, Encoding)> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        let s = std::str::from_utf8(&bytes[3..])
            .map_err(|e| Error::data_parsing(path, e.to_string()))?;
        return Ok((s.to_string(), Encoding::Utf8Bom));
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Ok((decode_utf16(path, &bytes[2..], true)?, Encoding::Utf16Be));
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Ok((decode_utf16(path, &bytes[2..], false)?, Encoding::Utf16Le));
    }
    let s = std::str::from_utf8(bytes).map_err(|e| Error::data_parsing(path, e.to_string()))?;
    Ok((s.to_string(), Encoding::Utf8))
}

/// Decode with an explicitly selected encoding. UTF-16 without a BOM is
/// read big-endian.
pub fn decode_as(path: &str, bytes: &[u8], encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Utf8 | Encoding::Utf8Bom => {
            let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
            std::str::from_utf8(body)
                .map(|s| s.to_string())
                .map_err(|e| Error::data_parsing(path, e.to_string()))
        }
        Encoding::Utf16Be | Encoding::Utf16Le => {
            let (body, big_endian) = if bytes.starts_with(&[0xFE, 0xFF]) {
                (&bytes[2..], true)
            } else if bytes.starts_with(&[0xFF, 0xFE]) {
                (&bytes[2..], false)
            } else {
                (bytes, encoding == Encoding::Utf16Be)
            };
            decode_utf16(path, body, big_endian)
        }
    }
}

fn decode_utf16(path: &str, bytes: &[u8], big_endian: bool) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::data_parsing(path, "odd byte length for UTF-16"));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| {
            if big_endian {
                u16::from_be_bytes([c[0], c[1]])
            } else {
                u16::from_le_bytes([c[0], c[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|e| Error::data_parsing(path, e.to_string()))
}

/// Encode text for writing with the given encoding, emitting the matching
/// BOM where the encoding calls for one
pub fn encode(text: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Utf8Bom => {
            let mut out = vec![0xEF, 0xBB, 0xBF];
            out.extend_from_slice(text.as_bytes());
            out
        }
        Encoding::Utf16Be => {
            let mut out = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            out
        }
        Encoding::Utf16Le => {
            let mut out = vec![0xFF, 0xFE];
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
    }
}

/// Detect the dominant line-break convention of a text
pub fn detect_line_break(text: &str) -> LineBreak {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            return LineBreak::Lf;
        }
        if b == b'\r' {
            if bytes.get(i + 1) == Some(&b'\n') {
                return LineBreak::CrLf;
            }
            return LineBreak::Cr;
        }
    }
    LineBreak::Lf
}

/// Split text into lines under any line-break convention
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += 1;
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_bom_roundtrip() {
        let bytes = encode("a,b\n1,2", Encoding::Utf8Bom);
        let (text, enc) = decode("t.csv", &bytes).unwrap();
        assert_eq!(enc, Encoding::Utf8Bom);
        assert_eq!(text, "a,b\n1,2");
    }

    #[test]
    fn test_utf16_roundtrip() {
        for encoding in [Encoding::Utf16Be, Encoding::Utf16Le] {
            let bytes = encode("héllo,wörld", encoding);
            let (text, enc) = decode("t.csv", &bytes).unwrap();
            assert_eq!(enc, encoding);
            assert_eq!(text, "héllo,wörld");
        }
    }

    #[test]
    fn test_detect_line_break() {
        assert_eq!(detect_line_break("a\nb"), LineBreak::Lf);
        assert_eq!(detect_line_break("a\r\nb"), LineBreak::CrLf);
        assert_eq!(detect_line_break("a\rb"), LineBreak::Cr);
        assert_eq!(detect_line_break("no breaks"), LineBreak::Lf);
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\r\nb\r\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\rb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines(""), Vec::<&str>::new());
    }
}
