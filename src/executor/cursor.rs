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

//! Cursors
//!
//! A cursor binds a name to an unexecuted SELECT. OPEN materializes the
//! result set (the driver runs the query and hands the view in), FETCH
//! walks it, CLOSE drops the result keeping the declaration, DISPOSE
//! removes it. Fetching out of range answers "no row" without erroring.
//! Scopes mirror the variable scopes: aggregate-function bodies see a
//! pseudo cursor over the grouped values in a child scope.

use rustc_hash::FxHashMap;

use crate::ast::{CursorPosition, FetchPosition, SelectQuery};
use crate::core::{Error, Header, Record, Result, Value};

use super::view::View;

/// One declared cursor
#[derive(Debug, Clone)]
pub struct Cursor {
    query: Option<SelectQuery>,
    view: Option<View>,
    /// -1 before the first row, record count after the last
    position: i64,
}

impl Cursor {
    fn declared(query: SelectQuery) -> Cursor {
        Cursor {
            query: Some(query),
            view: None,
            position: -1,
        }
    }

    /// A pseudo cursor over a list of values, already open. Backs the
    /// implicit cursor of user-defined aggregate functions.
    pub fn over_values(values: Vec<Value>) -> Cursor {
        let mut view = View::default();
        view.header = Header::new("", &["c1".to_string()]).unwrap_or_default();
        view.records = values
            .into_iter()
            .map(|v| Record::from_values(vec![v]))
            .collect();
        Cursor {
            query: None,
            view: Some(view),
            position: -1,
        }
    }

    pub fn is_open(&self) -> bool {
        self.view.is_some()
    }
}

/// Scoped cursor store
#[derive(Debug, Default)]
pub struct CursorScopes {
    scopes: Vec<FxHashMap<String, Cursor>>,
}

fn key_of(name: &str) -> String {
    name.to_uppercase()
}

impl CursorScopes {
    pub fn new() -> CursorScopes {
        CursorScopes {
            scopes: vec![FxHashMap::default()],
        }
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Cursor> {
        let key = key_of(name);
        for scope in self.scopes.iter_mut().rev() {
            if let Some(cursor) = scope.get_mut(&key) {
                return Ok(cursor);
            }
        }
        Err(Error::CursorNotExist(name.to_string()))
    }

    /// DECLARE name CURSOR FOR query
    pub fn declare(&mut self, name: &str, query: SelectQuery) -> Result<()> {
        let scope = self.scopes.last_mut().expect("cursor scope stack is empty");
        let key = key_of(name);
        if scope.contains_key(&key) {
            return Err(Error::CursorRedeclared(name.to_string()));
        }
        scope.insert(key, Cursor::declared(query));
        Ok(())
    }

    /// Register an already-open pseudo cursor in the innermost scope
    pub fn declare_pseudo(&mut self, name: &str, values: Vec<Value>) {
        let scope = self.scopes.last_mut().expect("cursor scope stack is empty");
        scope.insert(key_of(name), Cursor::over_values(values));
    }

    /// The query to run for OPEN; errors when already open
    pub fn query_for_open(&mut self, name: &str) -> Result<SelectQuery> {
        let cursor = self.find_mut(name)?;
        if cursor.is_open() {
            return Err(Error::CursorOpen(name.to_string()));
        }
        cursor
            .query
            .clone()
            .ok_or_else(|| Error::CursorNotExist(name.to_string()))
    }

    /// Attach the materialized result set, completing OPEN
    pub fn open_with_view(&mut self, name: &str, view: View) -> Result<()> {
        let cursor = self.find_mut(name)?;
        if cursor.is_open() {
            return Err(Error::CursorOpen(name.to_string()));
        }
        cursor.view = Some(view);
        cursor.position = -1;
        Ok(())
    }

    /// CLOSE drops the result set, keeping the declaration
    pub fn close(&mut self, name: &str) -> Result<()> {
        let cursor = self.find_mut(name)?;
        cursor.view = None;
        cursor.position = -1;
        Ok(())
    }

    /// DISPOSE removes the declaration entirely
    pub fn dispose(&mut self, name: &str) -> Result<()> {
        let key = key_of(name);
        for scope in self.scopes.iter_mut().rev() {
            if scope.remove(&key).is_some() {
                return Ok(());
            }
        }
        Err(Error::CursorNotExist(name.to_string()))
    }

    /// Move the cursor and read one row; None out of range
    pub fn fetch(
        &mut self,
        name: &str,
        position: &FetchPosition,
        number: Option<i64>,
    ) -> Result<Option<Vec<Value>>> {
        let cursor = self.find_mut(name)?;
        let view = cursor
            .view
            .as_ref()
            .ok_or_else(|| Error::CursorClosed(name.to_string()))?;
        let len = view.records.len() as i64;

        let target = match position.position {
            CursorPosition::Next => cursor.position + 1,
            CursorPosition::Prior => cursor.position - 1,
            CursorPosition::First => 0,
            CursorPosition::Last => len - 1,
            CursorPosition::Absolute => number.unwrap_or(0),
            CursorPosition::Relative => cursor.position + number.unwrap_or(0),
        };

        if target < 0 {
            cursor.position = -1;
            return Ok(None);
        }
        if len <= target {
            cursor.position = len;
            return Ok(None);
        }

        cursor.position = target;
        let view = cursor.view.as_ref().expect("cursor view just checked");
        let record = &view.records[target as usize];
        Ok(Some(record.iter().map(|c| c.value().clone()).collect()))
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        if 1 < self.scopes.len() {
            self.scopes.pop();
        }
    }
}
