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

//! Scalar builtins
//!
//! The small utility set the evaluator dispatches by name: null handling
//! (COALESCE, IFNULL, NULLIF), math (ABS, CEIL, FLOOR, ROUND), strings
//! (UPPER, LOWER, TRIM, LENGTH, SUBSTRING) and NOW. Unconvertible
//! arguments yield NULL rather than erroring, matching the cast rules.

use chrono::Utc;

use crate::core::{Error, Result, Value};

/// Evaluate a scalar builtin. Returns None for unknown names so the
/// caller can fall through to user-defined functions.
pub fn dispatch(name: &str, args: &[Value]) -> Option<Result<Value>> {
    let name = name.to_uppercase();
    let result = match name.as_str() {
        "COALESCE" => {
            if args.is_empty() {
                return Some(Err(arity(&name, "at least 1 argument", 0)));
            }
            Ok(args
                .iter()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null))
        }
        "IFNULL" => match args {
            [a, b] => Ok(if a.is_null() { b.clone() } else { a.clone() }),
            _ => Err(arity(&name, "2 arguments", args.len())),
        },
        "NULLIF" => match args {
            [a, b] => {
                if crate::core::compare::equal(a, b, false).is_true() {
                    Ok(Value::Null)
                } else {
                    Ok(a.clone())
                }
            }
            _ => Err(arity(&name, "2 arguments", args.len())),
        },
        "ABS" => unary_float(&name, args, |f| Value::from_f64(f.abs())),
        "CEIL" | "CEILING" => unary_float(&name, args, |f| Value::from_f64(f.ceil())),
        "FLOOR" => unary_float(&name, args, |f| Value::from_f64(f.floor())),
        "ROUND" => match args {
            [v] => Ok(v
                .as_float()
                .map(|f| Value::from_f64(f.round()))
                .unwrap_or(Value::Null)),
            [v, places] => {
                let (Some(f), Some(p)) = (v.as_float(), places.as_integer()) else {
                    return Some(Ok(Value::Null));
                };
                let factor = 10f64.powi(p as i32);
                Ok(Value::from_f64((f * factor).round() / factor))
            }
            _ => Err(arity(&name, "1 or 2 arguments", args.len())),
        },
        "UPPER" => unary_text(&name, args, |s| Value::text(s.to_uppercase())),
        "LOWER" => unary_text(&name, args, |s| Value::text(s.to_lowercase())),
        "TRIM" => unary_text(&name, args, |s| Value::text(s.trim())),
        "LTRIM" => unary_text(&name, args, |s| Value::text(s.trim_start())),
        "RTRIM" => unary_text(&name, args, |s| Value::text(s.trim_end())),
        "LENGTH" => unary_text(&name, args, |s| {
            Value::Integer(s.chars().count() as i64)
        }),
        "SUBSTRING" => match args {
            [v] => Ok(v.to_string_value()),
            [v, start] | [v, start, _] => {
                let text = match v.to_string_value() {
                    Value::String(s) => s,
                    _ => return Some(Ok(Value::Null)),
                };
                let Some(start) = start.as_integer() else {
                    return Some(Ok(Value::Null));
                };
                let length = if args.len() == 3 {
                    match args[2].as_integer() {
                        Some(l) if 0 <= l => Some(l as usize),
                        _ => return Some(Ok(Value::Null)),
                    }
                } else {
                    None
                };
                Ok(substring(&text, start, length))
            }
            _ => Err(arity(&name, "1 to 3 arguments", args.len())),
        },
        "NOW" => {
            if args.is_empty() {
                Ok(Value::Datetime(Utc::now()))
            } else {
                Err(arity(&name, "no arguments", args.len()))
            }
        }
        _ => return None,
    };
    Some(result)
}

fn arity(name: &str, expected: &str, got: usize) -> Error {
    Error::FunctionArgumentLength {
        name: name.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn unary_float(name: &str, args: &[Value], f: impl Fn(f64) -> Value) -> Result<Value> {
    match args {
        [v] => Ok(v.as_float().map(f).unwrap_or(Value::Null)),
        _ => Err(arity(name, "1 argument", args.len())),
    }
}

fn unary_text(name: &str, args: &[Value], f: impl Fn(&str) -> Value) -> Result<Value> {
    match args {
        [v] => match v.to_string_value() {
            Value::String(s) => Ok(f(&s)),
            _ => Ok(Value::Null),
        },
        _ => Err(arity(name, "1 argument", args.len())),
    }
}

/// 1-based substring; negative start counts from the end
fn substring(text: &str, start: i64, length: Option<usize>) -> Value {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let begin = if 0 < start {
        start - 1
    } else if start < 0 {
        len + start
    } else {
        0
    };
    if begin < 0 || len <= begin {
        return Value::Null;
    }
    let begin = begin as usize;
    let end = match length {
        Some(l) => (begin + l).min(chars.len()),
        None => chars.len(),
    };
    Value::text(chars[begin..end].iter().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(name: &str, args: &[Value]) -> Value {
        dispatch(name, args).unwrap().unwrap()
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(
            eval("COALESCE", &[Value::Null, Value::Integer(2), Value::Integer(3)]),
            Value::Integer(2)
        );
        assert_eq!(eval("COALESCE", &[Value::Null]), Value::Null);
    }

    #[test]
    fn test_nullif() {
        assert_eq!(
            eval("NULLIF", &[Value::Integer(1), Value::Integer(1)]),
            Value::Null
        );
        assert_eq!(
            eval("NULLIF", &[Value::Integer(1), Value::Integer(2)]),
            Value::Integer(1)
        );
    }

    #[test]
    fn test_math() {
        assert_eq!(eval("ABS", &[Value::Integer(-3)]), Value::Integer(3));
        assert_eq!(eval("CEIL", &[Value::Float(1.2)]), Value::Integer(2));
        assert_eq!(eval("FLOOR", &[Value::Float(-1.2)]), Value::Integer(-2));
        assert_eq!(
            eval("ROUND", &[Value::Float(1.256), Value::Integer(2)]),
            Value::Float(1.26)
        );
        assert_eq!(eval("ABS", &[Value::text("x")]), Value::Null);
    }

    #[test]
    fn test_strings() {
        assert_eq!(eval("UPPER", &[Value::text("ab")]), Value::text("AB"));
        assert_eq!(eval("LENGTH", &[Value::text("héllo")]), Value::Integer(5));
        assert_eq!(
            eval("SUBSTRING", &[Value::text("abcdef"), Value::Integer(2), Value::Integer(3)]),
            Value::text("bcd")
        );
        assert_eq!(
            eval("SUBSTRING", &[Value::text("abcdef"), Value::Integer(-2)]),
            Value::text("ef")
        );
    }

    #[test]
    fn test_unknown_name_falls_through() {
        assert!(dispatch("NO_SUCH_FN", &[]).is_none());
    }

    #[test]
    fn test_arity_errors() {
        assert!(dispatch("ABS", &[]).unwrap().is_err());
        assert!(dispatch("IFNULL", &[Value::Null]).unwrap().is_err());
    }
}
