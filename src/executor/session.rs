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

//! Session state
//!
//! One Session owns everything that outlives a single statement: flags,
//! the view cache, the temp-view scope stack, variables, cursors,
//! user-defined functions, held file handlers and the optional external
//! statement parser. Each shared structure carries its own lock so a
//! statement never holds more than one at a time; file handlers are
//! acquired before cache entries are inserted.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::ast::Statement;
use crate::codec::FileHandler;
use crate::core::{Error, Result};

use super::cache::ViewMap;
use super::cursor::CursorScopes;
use super::flags::Flags;
use super::function_map::FunctionMap;
use super::variables::VariableMap;
use super::view::View;

/// Pluggable SQL text frontend, used by EXECUTE
pub trait StatementParser: Send + Sync {
    fn parse(&self, input: &str) -> Result<Vec<Statement>>;
}

/// Process-wide engine state
pub struct Session {
    pub flags: RwLock<Flags>,
    /// File-backed views, keyed by upper-cased absolute path
    pub cached_views: ViewMap,
    /// Temp-view scopes: stdin, DECLARE TABLE, JSON_TABLE results
    temp_views: Mutex<Vec<FxHashMap<String, View>>>,
    pub variables: VariableMap,
    pub cursors: Mutex<CursorScopes>,
    pub functions: Mutex<FunctionMap>,
    /// Exclusive file handlers held until commit or rollback
    pub handlers: Mutex<FxHashMap<String, FileHandler>>,
    /// Piped input backing the STDIN table
    stdin_text: Mutex<Option<String>>,
    parser: Option<Box<dyn StatementParser>>,
}

impl Session {
    pub fn new(flags: Flags) -> Session {
        Session {
            flags: RwLock::new(flags),
            cached_views: ViewMap::new(),
            temp_views: Mutex::new(vec![FxHashMap::default()]),
            variables: VariableMap::new(),
            cursors: Mutex::new(CursorScopes::new()),
            functions: Mutex::new(FunctionMap::new()),
            handlers: Mutex::new(FxHashMap::default()),
            stdin_text: Mutex::new(None),
            parser: None,
        }
    }

    pub fn with_parser(flags: Flags, parser: Box<dyn StatementParser>) -> Session {
        let mut session = Session::new(flags);
        session.parser = Some(parser);
        session
    }

    pub fn parser(&self) -> Option<&dyn StatementParser> {
        self.parser.as_deref()
    }

    /// Shorthand for the case-insensitivity flag
    pub fn ignore_case(&self) -> bool {
        self.flags.read().ignore_case
    }

    // =========================================================================
    // Piped input
    // =========================================================================

    /// Provide the text the STDIN table reads
    pub fn set_stdin(&self, text: impl Into<String>) {
        *self.stdin_text.lock() = Some(text.into());
    }

    pub fn has_stdin(&self) -> bool {
        self.stdin_text.lock().is_some() || self.temp_view_exists("STDIN")
    }

    pub fn stdin_text(&self) -> Option<String> {
        self.stdin_text.lock().clone()
    }

    // =========================================================================
    // Temp-view scopes
    // =========================================================================

    pub fn push_temp_scope(&self) {
        self.temp_views.lock().push(FxHashMap::default());
    }

    pub fn pop_temp_scope(&self) {
        let mut scopes = self.temp_views.lock();
        if 1 < scopes.len() {
            scopes.pop();
        }
    }

    pub fn temp_view_exists(&self, name: &str) -> bool {
        let key = name.to_uppercase();
        self.temp_views
            .lock()
            .iter()
            .any(|scope| scope.contains_key(&key))
    }

    /// Innermost-scope-first lookup, cloning the view out
    pub fn temp_view(&self, name: &str) -> Option<View> {
        let key = name.to_uppercase();
        let scopes = self.temp_views.lock();
        scopes.iter().rev().find_map(|scope| scope.get(&key).cloned())
    }

    pub fn temp_view_with_internal_id(&self, name: &str) -> Option<Result<View>> {
        self.temp_view(name).map(|v| v.with_internal_id())
    }

    /// Register a temp view in the innermost scope, keyed by its path
    pub fn set_temp_view(&self, view: View) {
        let key = view
            .file_info
            .as_ref()
            .map(|f| f.path.to_uppercase())
            .unwrap_or_default();
        let mut scopes = self.temp_views.lock();
        scopes
            .last_mut()
            .expect("temp view scope stack is empty")
            .insert(key, view);
    }

    /// Write a mutated temp view back into whichever scope holds it
    pub fn replace_temp_view(&self, view: View) -> Result<()> {
        let key = view
            .file_info
            .as_ref()
            .map(|f| f.path.to_uppercase())
            .unwrap_or_default();
        let mut scopes = self.temp_views.lock();
        for scope in scopes.iter_mut().rev() {
            if scope.contains_key(&key) {
                scope.insert(key, view);
                return Ok(());
            }
        }
        Err(Error::FileNotFound(key))
    }

    pub fn dispose_temp_view(&self, name: &str) -> bool {
        let key = name.to_uppercase();
        let mut scopes = self.temp_views.lock();
        for scope in scopes.iter_mut().rev() {
            if scope.remove(&key).is_some() {
                return true;
            }
        }
        false
    }

    /// Reset every transaction-scoped store: cache, temp scopes, held
    /// handlers and the stdin view
    pub fn clear_transaction_state(&self) {
        self.cached_views.clear();
        *self.temp_views.lock() = vec![FxHashMap::default()];
        self.handlers.lock().clear();
    }
}
