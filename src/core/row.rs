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

//! Cells, records and record sets
//!
//! A Cell holds either a single value or, after GROUP BY, a group of
//! values with one entry per grouped row. A singleton cell behaves as a
//! group of length one when read positionally. Records may grow past the
//! header length during clause evaluation; the extra slots memoize
//! computed expressions until `Fix` trims them.

use std::ops::{Index, IndexMut};

use smallvec::SmallVec;

use super::compare::serialize_key;
use super::value::Value;

static NULL_VALUE: Value = Value::Null;

/// One slot of a record: a single value, or a group of values
#[derive(Debug, Clone, PartialEq)]
pub struct Cell(SmallVec<[Value; 1]>);

impl Cell {
    /// Create a singleton cell
    pub fn new(value: Value) -> Self {
        let mut v = SmallVec::new();
        v.push(value);
        Cell(v)
    }

    /// Create a grouped cell holding one value per grouped row
    pub fn grouped(values: Vec<Value>) -> Self {
        Cell(SmallVec::from_vec(values))
    }

    /// Scalar read: the first value. An empty group reads as NULL.
    pub fn value(&self) -> &Value {
        self.0.first().unwrap_or(&NULL_VALUE)
    }

    /// Positional read into the group. Singleton cells answer every
    /// position with their single value.
    pub fn grouped_value(&self, index: usize) -> &Value {
        if self.0.len() < 2 {
            self.value()
        } else {
            self.0.get(index).unwrap_or(&NULL_VALUE)
        }
    }

    /// Group size (1 for singleton cells)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All values in the group
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Take the scalar out of a singleton cell
    pub fn into_value(mut self) -> Value {
        if self.0.is_empty() {
            Value::Null
        } else {
            self.0.swap_remove(0)
        }
    }
}

/// An ordered sequence of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    cells: Vec<Cell>,
}

impl Record {
    pub fn new(cells: Vec<Cell>) -> Self {
        Record { cells }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Record {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Build a record of singleton cells from values
    pub fn from_values(values: Vec<Value>) -> Self {
        Record {
            cells: values.into_iter().map(Cell::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn truncate(&mut self, len: usize) {
        self.cells.truncate(len);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }

    /// Group size of this record: the group length of its first cell.
    /// After GROUP BY every cell in a record has the same group length.
    pub fn group_len(&self) -> usize {
        self.cells.first().map_or(0, Cell::len)
    }

    /// Comparison key over the scalar reads of the given fields, or of
    /// every cell when no field list is given
    pub fn comparison_key(&self, fields: Option<&[usize]>) -> String {
        let mut buf = String::new();
        match fields {
            Some(indices) => {
                for (i, &idx) in indices.iter().enumerate() {
                    if 0 < i {
                        buf.push(':');
                    }
                    serialize_key(&mut buf, self.cells[idx].value());
                }
            }
            None => {
                for (i, cell) in self.cells.iter().enumerate() {
                    if 0 < i {
                        buf.push(':');
                    }
                    serialize_key(&mut buf, cell.value());
                }
            }
        }
        buf
    }
}

impl Index<usize> for Record {
    type Output = Cell;

    fn index(&self, index: usize) -> &Cell {
        &self.cells[index]
    }
}

impl IndexMut<usize> for Record {
    fn index_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }
}

impl FromIterator<Cell> for Record {
    fn from_iter<T: IntoIterator<Item = Cell>>(iter: T) -> Self {
        Record {
            cells: iter.into_iter().collect(),
        }
    }
}

/// The body of a view
pub type RecordSet = Vec<Record>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_cell_reads_as_group_of_one() {
        let cell = Cell::new(Value::Integer(7));
        assert_eq!(cell.len(), 1);
        assert_eq!(cell.value(), &Value::Integer(7));
        assert_eq!(cell.grouped_value(0), &Value::Integer(7));
        assert_eq!(cell.grouped_value(5), &Value::Integer(7));
    }

    #[test]
    fn test_grouped_cell() {
        let cell = Cell::grouped(vec![Value::Integer(1), Value::Integer(2), Value::Null]);
        assert_eq!(cell.len(), 3);
        assert_eq!(cell.value(), &Value::Integer(1));
        assert_eq!(cell.grouped_value(1), &Value::Integer(2));
        assert_eq!(cell.grouped_value(2), &Value::Null);
    }

    #[test]
    fn test_record_extension() {
        let mut record = Record::from_values(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(record.len(), 2);
        record.push(Cell::new(Value::text("memo")));
        assert_eq!(record.len(), 3);
        record.truncate(2);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_record_group_len() {
        let grouped = Record::new(vec![
            Cell::grouped(vec![Value::Integer(1), Value::Integer(2)]),
            Cell::grouped(vec![Value::text("a"), Value::text("b")]),
        ]);
        assert_eq!(grouped.group_len(), 2);

        let plain = Record::from_values(vec![Value::Integer(1)]);
        assert_eq!(plain.group_len(), 1);
    }

    #[test]
    fn test_record_comparison_key_selected_fields() {
        let record =
            Record::from_values(vec![Value::Integer(1), Value::text("x"), Value::Integer(2)]);
        let all = record.comparison_key(None);
        let some = record.comparison_key(Some(&[0, 2]));
        assert_ne!(all, some);
        assert_eq!(
            some,
            Record::from_values(vec![Value::Integer(1), Value::Integer(2)]).comparison_key(None)
        );
    }
}
