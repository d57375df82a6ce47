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

//! Column metadata
//!
//! A Header is the ordered list of field descriptors of a view. Reference
//! resolution tries an exact qualifier+column match first, then falls back
//! to a bare-column scan with ambiguity detection. The reserved internal-id
//! column carries the stable physical row ordinal used by UPDATE/DELETE.

use std::ops::{Index, IndexMut};

use super::error::{Error, Result};

/// Reserved column holding the 0-based physical row ordinal of a view
/// loaded for update
pub const INTERNAL_ID_COLUMN: &str = "@__internal_id";

/// Descriptor of one field of a view
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeaderField {
    /// Qualifier: the view (table or alias) this field belongs to.
    /// Empty for computed fields and collapsed join columns.
    pub view: String,
    /// Column name
    pub column: String,
    /// Select-clause aliases attached during evaluation
    pub aliases: Vec<String>,
    /// 1-based column ordinal within its view; 0 = unnumbered
    pub number: usize,
    /// True for fields that came from a source table (`*` expands to these)
    pub is_from_table: bool,
    /// True for the collapsed output column of USING/NATURAL joins
    pub is_join_column: bool,
    /// True for GROUP BY key columns
    pub is_group_key: bool,
}

impl HeaderField {
    fn matches_label(&self, label: &str) -> bool {
        self.column.eq_ignore_ascii_case(label)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(label))
    }

    fn is_internal_id(&self) -> bool {
        self.column == INTERNAL_ID_COLUMN
    }
}

/// Ordered field descriptors of a view
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    fields: Vec<HeaderField>,
}

impl Header {
    /// Create a header for a freshly declared or loaded table. Duplicate
    /// column names are a declaration error.
    pub fn new(view: &str, columns: &[String]) -> Result<Header> {
        check_duplicates(columns)?;
        Ok(Header {
            fields: columns
                .iter()
                .enumerate()
                .map(|(i, c)| HeaderField {
                    view: view.to_string(),
                    column: c.clone(),
                    number: i + 1,
                    is_from_table: true,
                    ..Default::default()
                })
                .collect(),
        })
    }

    /// Like [`Header::new`] with the internal-id column prepended
    pub fn with_internal_id(view: &str, columns: &[String]) -> Result<Header> {
        let mut header = Header::new(view, columns)?;
        header.fields.insert(
            0,
            HeaderField {
                view: view.to_string(),
                column: INTERNAL_ID_COLUMN.to_string(),
                ..Default::default()
            },
        );
        Ok(header)
    }

    /// Build a header from explicit fields (join merges, Fix)
    pub fn from_fields(fields: Vec<HeaderField>) -> Header {
        Header { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderField> {
        self.fields.iter()
    }

    pub fn get(&self, index: usize) -> Option<&HeaderField> {
        self.fields.get(index)
    }

    /// Append a computed (non-table) field, returning its index. The label
    /// is the formatted source expression; the alias, if any, is recorded
    /// for later reference resolution.
    pub fn add_field(&mut self, label: String, alias: Option<String>) -> usize {
        let mut field = HeaderField {
            column: label,
            ..Default::default()
        };
        if let Some(alias) = alias {
            if !field.column.eq_ignore_ascii_case(&alias) {
                field.aliases.push(alias);
            }
        }
        self.fields.push(field);
        self.fields.len() - 1
    }

    /// Resolve a column reference. With a qualifier only that view's
    /// fields are considered; without one, the column must be unique
    /// across the header.
    pub fn contains(&self, view: Option<&str>, column: &str) -> Result<usize> {
        let mut found: Option<usize> = None;
        for (i, field) in self.fields.iter().enumerate() {
            let matched = match view {
                Some(v) => field.view.eq_ignore_ascii_case(v) && field.matches_label(column),
                None => !field.is_internal_id() && field.matches_label(column),
            };
            if matched {
                if found.is_some() {
                    return Err(Error::FieldAmbiguous(qualified_name(view, column)));
                }
                found = Some(i);
            }
        }
        found.ok_or_else(|| Error::FieldNotExist(qualified_name(view, column)))
    }

    /// Resolve a 1-based column-number reference (`view.2`)
    pub fn contains_number(&self, view: &str, number: i64) -> Result<usize> {
        if 0 < number {
            for (i, field) in self.fields.iter().enumerate() {
                if field.view.eq_ignore_ascii_case(view) && field.number == number as usize {
                    return Ok(i);
                }
            }
        }
        Err(Error::FieldNumberNotExist {
            view: view.to_string(),
            number,
        })
    }

    /// Locate the internal-id column of the named view
    pub fn contains_internal_id(&self, view: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.is_internal_id() && f.view.eq_ignore_ascii_case(view))
            .ok_or(Error::InternalIdNotExist)
    }

    /// Locate a memoized computed column by its formatted label
    pub fn contains_label(&self, label: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| !f.is_from_table && f.matches_label(label))
    }

    /// The fields `*` expands to: join columns and table columns, in
    /// header order, as (qualifier, column) pairs
    pub fn table_columns(&self) -> Vec<(Option<String>, String)> {
        self.fields
            .iter()
            .filter(|f| (f.is_from_table || f.is_join_column) && !f.is_internal_id())
            .map(|f| {
                let view = if f.view.is_empty() {
                    None
                } else {
                    Some(f.view.clone())
                };
                (view, f.column.clone())
            })
            .collect()
    }

    /// Column names of the table fields
    pub fn table_column_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| (f.is_from_table || f.is_join_column) && !f.is_internal_id())
            .map(|f| f.column.clone())
            .collect()
    }

    /// Re-qualify every field with a new view name, optionally renaming
    /// the columns (alias column lists, CTE column lists). Aliases are
    /// dropped; the internal-id column keeps its name.
    pub fn update(&mut self, view: &str, columns: Option<&[String]>) -> Result<()> {
        if let Some(columns) = columns {
            check_duplicates(columns)?;
            let applicable = self.fields.iter().filter(|f| !f.is_internal_id()).count();
            if columns.len() != applicable {
                return Err(Error::FieldLengthNotMatch {
                    operation: "header update".to_string(),
                });
            }
        }

        let mut nth = 0;
        for field in &mut self.fields {
            field.view = view.to_string();
            field.aliases.clear();
            if field.is_internal_id() {
                continue;
            }
            if let Some(columns) = columns {
                field.column = columns[nth].clone();
            }
            nth += 1;
        }
        Ok(())
    }

    /// Drop fields appended during a clause that is being rolled back
    pub fn truncate(&mut self, len: usize) {
        self.fields.truncate(len);
    }

    /// Concatenate two headers for a join
    pub fn merge(left: Header, right: Header) -> Header {
        let mut fields = left.fields;
        fields.extend(right.fields);
        Header { fields }
    }

    /// Take the fields out of this header
    pub fn into_fields(self) -> Vec<HeaderField> {
        self.fields
    }
}

impl Index<usize> for Header {
    type Output = HeaderField;

    fn index(&self, index: usize) -> &HeaderField {
        &self.fields[index]
    }
}

impl IndexMut<usize> for Header {
    fn index_mut(&mut self, index: usize) -> &mut HeaderField {
        &mut self.fields[index]
    }
}

fn check_duplicates(columns: &[String]) -> Result<()> {
    for (i, c) in columns.iter().enumerate() {
        if columns[..i].iter().any(|p| p.eq_ignore_ascii_case(c)) {
            return Err(Error::DuplicateFieldName(c.clone()));
        }
    }
    Ok(())
}

fn qualified_name(view: Option<&str>, column: &str) -> String {
    match view {
        Some(v) => format!("{}.{}", v, column),
        None => column.to_string(),
    }
}
