//! Join iterator — logical rows composed from other iterators' rows.
//!
//! A join does not copy its inputs into one wide dataset. Each logical row
//! holds one row per child segment, and column lookup goes through an
//! index map from column name to `(segment, column)` built when the
//! iterator is created. Duplicate column names across segments resolve to
//! the later segment. Because a join exposes the same `col_names()` /
//! `get_column()` surface as every other iterator, joins nest.

use std::collections::HashMap;

use tracing::warn;

use crate::value::{Row, Value};

/// Iterator over rows assembled from two (or more, via nesting) child
/// iterators.
#[derive(Debug, Clone, Default)]
pub struct JoinIter {
    col_names: Vec<String>,
    /// Column name → (segment index, column index within the segment).
    /// Later segments win duplicate names.
    col_idx: HashMap<String, (usize, usize)>,
    seg_widths: Vec<usize>,
    rows: Vec<Vec<Row>>,
    cursor: usize,
}

impl JoinIter {
    /// Builds an empty join over the given column-name segments, merging
    /// their name spaces.
    pub fn new(segments: Vec<Vec<String>>) -> Self {
        let mut col_names = Vec::new();
        let mut col_idx = HashMap::new();
        let mut seg_widths = Vec::new();

        for (seg, names) in segments.iter().enumerate() {
            seg_widths.push(names.len());
            for (idx, name) in names.iter().enumerate() {
                col_names.push(name.clone());
                // Later wins.
                col_idx.insert(name.clone(), (seg, idx));
            }
        }

        Self {
            col_names,
            col_idx,
            seg_widths,
            rows: Vec::new(),
            cursor: 0,
        }
    }

    /// Builds an empty join over the column spaces of existing iterators.
    pub fn from_children(children: &[&super::RowIter]) -> Self {
        Self::new(
            children
                .iter()
                .map(|child| child.col_names().to_vec())
                .collect(),
        )
    }

    /// Appends a logical row: one child row per segment, widths checked.
    ///
    /// Returns `false` (dropping the row) on a segment-count or width
    /// mismatch.
    pub fn add_row(&mut self, segments: Vec<Row>) -> bool {
        if segments.len() != self.seg_widths.len() {
            warn!(
                got = segments.len(),
                expected = self.seg_widths.len(),
                "join row with wrong segment count"
            );
            return false;
        }
        for (seg, row) in segments.iter().enumerate() {
            if row.len() != self.seg_widths[seg] {
                warn!(
                    seg,
                    got = row.len(),
                    expected = self.seg_widths[seg],
                    "join row segment with wrong width"
                );
                return false;
            }
        }
        self.rows.push(segments);
        true
    }

    // --------------------------------------------------------------------------------------------
    // Navigation
    // --------------------------------------------------------------------------------------------

    pub fn valid(&self) -> bool {
        self.cursor < self.rows.len()
    }

    pub fn next(&mut self) {
        if self.valid() {
            self.cursor += 1;
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }

    pub fn erase(&mut self) {
        if self.valid() {
            self.rows.remove(self.cursor);
        }
    }

    pub fn unstable_erase(&mut self) {
        if self.valid() {
            self.rows.swap_remove(self.cursor);
        }
    }

    // --------------------------------------------------------------------------------------------
    // Cell access
    // --------------------------------------------------------------------------------------------

    /// Reads a column of the current row; duplicates resolve to the later
    /// segment, unknown names to empty.
    pub fn get_column(&self, name: &str) -> Value {
        let Some((seg, idx)) = self.col_idx.get(name) else {
            return Value::Empty;
        };
        match self.rows.get(self.cursor) {
            Some(segments) => segments
                .get(*seg)
                .and_then(|row| row.values.get(*idx))
                .cloned()
                .unwrap_or_default(),
            None => Value::Empty,
        }
    }

    /// The current row flattened into declared column order.
    pub fn row(&self) -> Option<Row> {
        let segments = self.rows.get(self.cursor)?;
        let mut values = Vec::with_capacity(self.col_names.len());
        for row in segments {
            values.extend(row.values.iter().cloned());
        }
        Some(Row::new(values))
    }
}
