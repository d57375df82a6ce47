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

//! Variables
//!
//! `@name` variables live in a scope stack: the base scope is
//! process-wide, and user-defined function bodies push a child scope.
//! Declaration binds in the innermost scope; reads and substitutions
//! search inner to outer. Names are case-insensitive. Substitution is
//! atomic under the map lock.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::core::{Error, Result, Value};

/// Scoped variable store
#[derive(Debug)]
pub struct VariableMap {
    scopes: Mutex<Vec<FxHashMap<String, Value>>>,
}

fn key_of(name: &str) -> String {
    name.to_uppercase()
}

impl Default for VariableMap {
    fn default() -> Self {
        VariableMap {
            scopes: Mutex::new(vec![FxHashMap::default()]),
        }
    }
}

impl VariableMap {
    pub fn new() -> VariableMap {
        VariableMap::default()
    }

    /// Declare a variable in the innermost scope
    pub fn declare(&self, name: &str, value: Value) -> Result<()> {
        let mut scopes = self.scopes.lock();
        let scope = scopes.last_mut().expect("variable scope stack is empty");
        let key = key_of(name);
        if scope.contains_key(&key) {
            return Err(Error::VariableRedeclared(name.to_string()));
        }
        scope.insert(key, value);
        Ok(())
    }

    /// Assign to a declared variable, searching inner to outer
    pub fn substitute(&self, name: &str, value: Value) -> Result<()> {
        let mut scopes = self.scopes.lock();
        let key = key_of(name);
        for scope in scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(&key) {
                *slot = value;
                return Ok(());
            }
        }
        Err(Error::VariableNotDeclared(name.to_string()))
    }

    /// Read a declared variable
    pub fn get(&self, name: &str) -> Result<Value> {
        let scopes = self.scopes.lock();
        let key = key_of(name);
        for scope in scopes.iter().rev() {
            if let Some(value) = scope.get(&key) {
                return Ok(value.clone());
            }
        }
        Err(Error::VariableNotDeclared(name.to_string()))
    }

    /// Enter a function-body scope
    pub fn push_scope(&self) {
        self.scopes.lock().push(FxHashMap::default());
    }

    /// Leave a function-body scope
    pub fn pop_scope(&self) {
        let mut scopes = self.scopes.lock();
        if 1 < scopes.len() {
            scopes.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_substitute() {
        let vars = VariableMap::new();
        vars.declare("x", Value::Integer(1)).unwrap();
        assert_eq!(vars.get("X").unwrap(), Value::Integer(1));

        vars.substitute("x", Value::Integer(2)).unwrap();
        assert_eq!(vars.get("x").unwrap(), Value::Integer(2));

        assert!(matches!(
            vars.declare("X", Value::Null),
            Err(Error::VariableRedeclared(_))
        ));
        assert!(matches!(
            vars.get("missing"),
            Err(Error::VariableNotDeclared(_))
        ));
    }

    #[test]
    fn test_scopes_shadow_and_fall_through() {
        let vars = VariableMap::new();
        vars.declare("outer", Value::Integer(1)).unwrap();

        vars.push_scope();
        // Redeclaration is legal in a child scope and shadows
        vars.declare("outer", Value::Integer(10)).unwrap();
        assert_eq!(vars.get("outer").unwrap(), Value::Integer(10));

        // Substitution of an outer-only name writes through
        vars.declare("inner", Value::Integer(5)).unwrap();
        vars.pop_scope();

        assert_eq!(vars.get("outer").unwrap(), Value::Integer(1));
        assert!(vars.get("inner").is_err());
    }
}
