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

//! View cache
//!
//! A ViewMap keys loaded views by upper-cased path (file cache) or name
//! (temp-table scopes). Lookups take the shared lock and hand out clones;
//! mutations take the exclusive lock. A table is loaded at most once per
//! transaction: later references hit the cache, and a read-only entry is
//! discarded and reloaded when a statement needs it for update.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::core::{Error, Result};

use super::view::View;

/// Keyed store of loaded views
#[derive(Debug, Default)]
pub struct ViewMap {
    views: RwLock<FxHashMap<String, View>>,
}

fn key_of(name: &str) -> String {
    name.to_uppercase()
}

impl ViewMap {
    pub fn new() -> ViewMap {
        ViewMap::default()
    }

    /// Case-insensitive existence test
    pub fn exists(&self, name: &str) -> bool {
        self.views.read().contains_key(&key_of(name))
    }

    /// Clone the stored view out
    pub fn get(&self, name: &str) -> Result<View> {
        self.views
            .read()
            .get(&key_of(name))
            .cloned()
            .ok_or_else(|| Error::FileNotFound(name.to_string()))
    }

    /// Clone the stored view out with the internal-id column materialized
    pub fn get_with_internal_id(&self, name: &str) -> Result<View> {
        self.get(name).and_then(|v| v.with_internal_id())
    }

    /// True when the stored entry was loaded for update
    pub fn is_for_update(&self, name: &str) -> bool {
        self.views
            .read()
            .get(&key_of(name))
            .map(|v| v.for_update)
            .unwrap_or(false)
    }

    /// Insert a freshly loaded view, keyed by its FileInfo path
    pub fn set(&self, view: View) {
        let key = view
            .file_info
            .as_ref()
            .map(|f| key_of(&f.path))
            .unwrap_or_default();
        self.views.write().insert(key, view);
    }

    /// Replace an existing entry with a mutated view
    pub fn replace(&self, view: View) {
        self.set(view);
    }

    /// Drop an entry; true when something was removed
    pub fn dispose(&self, name: &str) -> bool {
        self.views.write().remove(&key_of(name)).is_some()
    }

    /// Keys currently cached, for commit iteration
    pub fn keys(&self) -> Vec<String> {
        self.views.read().keys().cloned().collect()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.views.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FileInfo, Format};
    use crate::core::{Header, Record, Value};

    fn sample_view(path: &str) -> View {
        let mut view = View::default();
        view.header = Header::new("t", &["a".to_string()]).unwrap();
        view.records = vec![Record::from_values(vec![Value::Integer(1)])];
        view.file_info = Some(FileInfo::new(path, Format::Csv));
        view
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let cache = ViewMap::new();
        cache.set(sample_view("/data/Users.csv"));
        assert!(cache.exists("/data/users.CSV"));
        assert!(cache.get("/DATA/USERS.CSV").is_ok());
        assert!(cache.get("/data/other.csv").is_err());
    }

    #[test]
    fn test_get_returns_clone() {
        let cache = ViewMap::new();
        cache.set(sample_view("t.csv"));
        let mut copy = cache.get("t.csv").unwrap();
        copy.records.clear();
        // The cached instance is untouched until replace
        assert_eq!(cache.get("t.csv").unwrap().records.len(), 1);
        cache.replace(copy);
        assert_eq!(cache.get("t.csv").unwrap().records.len(), 0);
    }

    #[test]
    fn test_dispose_and_clear() {
        let cache = ViewMap::new();
        cache.set(sample_view("a.csv"));
        cache.set(sample_view("b.csv"));
        assert!(cache.dispose("A.CSV"));
        assert!(!cache.dispose("A.CSV"));
        cache.clear();
        assert!(cache.keys().is_empty());
    }
}
