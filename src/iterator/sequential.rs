//! Sequential iterator — one logical row per physical dataset row.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::value::{Row, Value};

/// Iterates a [`DataSet`](crate::value::DataSet) row by row.
///
/// The dataset lives inside a shared [`Value`] handle and is never
/// mutated: erasure edits an index vector (`order`) instead, so other
/// iterators over the same handle are unaffected.
#[derive(Debug, Clone)]
pub struct SequentialIter {
    value: Arc<Value>,

    /// Logical row order: indices into the dataset's row vector.
    order: Vec<usize>,

    /// Position within `order`.
    cursor: usize,

    /// Column name → column index, built once at construction.
    col_idx: HashMap<String, usize>,

    /// Column names, in declared order.
    col_names: Vec<String>,
}

impl SequentialIter {
    /// Wraps a dataset value.
    ///
    /// A value that is not a uniform dataset yields a zero-row iterator
    /// (`valid() == false` immediately); no error escapes.
    pub fn new(value: Arc<Value>) -> Self {
        let (order, col_idx, col_names) = match &*value {
            Value::DataSet(ds) if ds.is_uniform() => {
                let col_idx = ds
                    .col_names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), i))
                    .collect();
                ((0..ds.rows.len()).collect(), col_idx, ds.col_names.clone())
            }
            other => {
                warn!(value = %other, "sequential iterator over a non-dataset value");
                (Vec::new(), HashMap::new(), Vec::new())
            }
        };

        Self {
            value,
            order,
            cursor: 0,
            col_idx,
            col_names,
        }
    }

    pub fn valid(&self) -> bool {
        self.cursor < self.order.len()
    }

    pub fn next(&mut self) {
        if self.valid() {
            self.cursor += 1;
        }
    }

    /// Rewinds to the given logical position (clamped to the end).
    pub fn reset(&mut self, start: usize) {
        self.cursor = start.min(self.order.len());
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }

    /// The current physical row, if the cursor is on one.
    pub fn row(&self) -> Option<&Row> {
        let ds = self.value.as_dataset()?;
        ds.rows.get(*self.order.get(self.cursor)?)
    }

    /// Reads a column of the current row. Unknown names and an exhausted
    /// cursor both resolve to empty.
    pub fn get_column(&self, name: &str) -> Value {
        let Some(idx) = self.col_idx.get(name) else {
            return Value::Empty;
        };
        match self.row() {
            Some(row) => row.values.get(*idx).cloned().unwrap_or_default(),
            None => Value::Empty,
        }
    }

    /// Logically deletes the current row; the cursor lands on the row that
    /// followed it.
    pub fn erase(&mut self) {
        if self.valid() {
            self.order.remove(self.cursor);
        }
    }

    /// Deletes the current row by swapping the last row into its place.
    /// O(1); the cursor lands on a previously unseen row.
    pub fn unstable_erase(&mut self) {
        if self.valid() {
            self.order.swap_remove(self.cursor);
        }
    }

    /// Deletes logical rows in `[first, last)`, clamped to the current
    /// length. The cursor is pulled back so traversal continues at the
    /// first surviving row after the gap.
    pub fn erase_range(&mut self, first: usize, last: usize) {
        let last = last.min(self.order.len());
        if first >= last {
            return;
        }
        self.order.drain(first..last);
        if self.cursor >= last {
            self.cursor -= last - first;
        } else if self.cursor > first {
            self.cursor = first;
        }
    }
}
