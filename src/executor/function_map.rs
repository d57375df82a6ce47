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

//! User-defined functions
//!
//! DECLARE FUNCTION stores the declaration; invocation is handled by the
//! driver, which runs the body in child variable/cursor scopes. Aggregate
//! declarations carry the name of the implicit cursor the body iterates.

use rustc_hash::FxHashMap;

use crate::ast::FunctionDeclaration;
use crate::core::{Error, Result};

/// Store of user-declared functions, case-insensitive by name
#[derive(Debug, Default)]
pub struct FunctionMap {
    functions: FxHashMap<String, FunctionDeclaration>,
}

impl FunctionMap {
    pub fn new() -> FunctionMap {
        FunctionMap::default()
    }

    pub fn declare(&mut self, declaration: FunctionDeclaration) -> Result<()> {
        let key = declaration.name.to_uppercase();
        if self.functions.contains_key(&key) {
            return Err(Error::FunctionRedeclared(declaration.name));
        }
        self.functions.insert(key, declaration);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<FunctionDeclaration> {
        self.functions.get(&name.to_uppercase()).cloned()
    }

    /// True when the name is declared as an aggregate
    pub fn is_aggregate(&self, name: &str) -> bool {
        self.functions
            .get(&name.to_uppercase())
            .map(|f| f.cursor.is_some())
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.functions.clear();
    }
}
