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

//! Three-valued logic
//!
//! Every predicate in the engine evaluates to one of `TRUE`, `FALSE` or
//! `UNKNOWN`, with Kleene truth tables for the connectives. NULL operands
//! surface as `UNKNOWN` unless an operation explicitly absorbs them.

use std::fmt;

/// A three-valued truth value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ternary {
    True,
    False,
    #[default]
    Unknown,
}

impl Ternary {
    /// Lift a two-valued boolean
    pub fn of(value: bool) -> Self {
        if value {
            Ternary::True
        } else {
            Ternary::False
        }
    }

    /// Parse a textual truth value. Accepts boolean spellings and the
    /// literal `UNKNOWN`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("t") || s == "1" {
            Some(Ternary::True)
        } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("f") || s == "0" {
            Some(Ternary::False)
        } else if s.eq_ignore_ascii_case("unknown") {
            Some(Ternary::Unknown)
        } else {
            None
        }
    }

    /// Kleene conjunction
    pub fn and(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::False, _) | (_, Ternary::False) => Ternary::False,
            (Ternary::True, Ternary::True) => Ternary::True,
            _ => Ternary::Unknown,
        }
    }

    /// Kleene disjunction
    pub fn or(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::True, _) | (_, Ternary::True) => Ternary::True,
            (Ternary::False, Ternary::False) => Ternary::False,
            _ => Ternary::Unknown,
        }
    }

    /// Kleene negation
    pub fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Unknown => Ternary::Unknown,
        }
    }

    /// True only for `TRUE`. This is the row-keeping test used by WHERE
    /// and HAVING.
    pub fn is_true(self) -> bool {
        self == Ternary::True
    }

    /// Collapse to a two-valued boolean; `UNKNOWN` has no boolean value.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Ternary::True => Some(true),
            Ternary::False => Some(false),
            Ternary::Unknown => None,
        }
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        Ternary::of(value)
    }
}

impl fmt::Display for Ternary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ternary::True => write!(f, "TRUE"),
            Ternary::False => write!(f, "FALSE"),
            Ternary::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
