//! Neighbors iterator — logical vertex-edge rows over neighbor-response
//! datasets.
//!
//! The storage layer answers a get-neighbors RPC with one dataset per
//! partition batch, each following the reserved column convention:
//!
//! ```text
//! | _vid | _stats | _tag:<tag>:<p1>:<p2> | _edge:<+|-><name>:<p1>:..:_dst:_type:_rank | _expr |
//! ```
//!
//! This iterator validates that convention for every dataset, then splits
//! each physical vertex row into one *logical row per contained edge* (or
//! a single logical row when a dataset carries no edge columns at all).
//! Tag properties hang off the vertex, edge properties off the edge, and
//! the accessors synthesize full [`Vertex`]/[`Edge`] values on demand.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::value::{
    COL_DST, COL_EXPR, COL_RANK, COL_STATS, COL_TYPE, COL_VID, DataSet, EDGE_COL_PREFIX, Edge,
    NullKind, TAG_COL_PREFIX, Tag, Value, Vertex,
};

use super::IteratorError;

// ------------------------------------------------------------------------------------------------
// Per-dataset indices
// ------------------------------------------------------------------------------------------------

/// Parsed `_tag:` column: which column, which properties, where each
/// property sits in the cell list.
#[derive(Debug, Clone)]
struct TagIndex {
    name: String,
    col: usize,
    props: Vec<String>,
    prop_pos: HashMap<String, usize>,
}

/// Parsed `_edge:` column.
#[derive(Debug, Clone)]
struct EdgeIndex {
    name: String,
    col: usize,
    /// `true` for `+` (as stored), `false` for `-` (reverse view).
    forward: bool,
    props: Vec<String>,
    prop_pos: HashMap<String, usize>,
}

/// Everything the accessors need to know about one response dataset.
#[derive(Debug, Clone)]
struct DataSetIndex {
    cols: HashMap<String, usize>,
    tags: Vec<TagIndex>,
    tag_pos: HashMap<String, usize>,
    edges: Vec<EdgeIndex>,
}

/// One logical vertex-edge row.
#[derive(Debug, Clone, Copy)]
struct LogicalRow {
    ds: usize,
    row: usize,
    /// Index into the dataset's edge list; `None` for edge-less datasets.
    edge: Option<usize>,
    /// Index within the edge cell's list of edge instances.
    item: usize,
}

// ------------------------------------------------------------------------------------------------
// NeighborsIter
// ------------------------------------------------------------------------------------------------

/// Iterator over a list of neighbor-response datasets.
///
/// Construction validates every dataset header; any violation yields an
/// iterator with `valid() == false` and zero rows (the rejection reason is
/// logged, never thrown).
#[derive(Debug, Clone)]
pub struct NeighborsIter {
    value: Arc<Value>,
    valid: bool,
    indices: Vec<DataSetIndex>,
    rows: Vec<LogicalRow>,
    cursor: usize,
    /// Column names of the first dataset, for `col_names()`.
    col_names: Vec<String>,
}

impl NeighborsIter {
    /// Wraps a `Value::List` of neighbor-response datasets.
    pub fn new(value: Arc<Value>) -> Self {
        let mut iter = Self {
            value,
            valid: false,
            indices: Vec::new(),
            rows: Vec::new(),
            cursor: 0,
            col_names: Vec::new(),
        };

        match iter.process_list() {
            Ok(()) => iter.valid = true,
            Err(err) => {
                warn!(error = %err, "rejecting neighbor response");
                iter.indices.clear();
                iter.rows.clear();
            }
        }
        iter
    }

    /// Structural validation of a single response dataset header.
    ///
    /// Exposed so callers can pre-check a response without building the
    /// full iterator.
    pub fn validate_dataset(ds: &DataSet) -> Result<(), IteratorError> {
        parse_dataset(ds).map(|_| ())
    }

    fn process_list(&mut self) -> Result<(), IteratorError> {
        let Value::List(datasets) = &*self.value else {
            return Err(IteratorError::BadShape {
                expected: "a list of neighbor-response datasets",
            });
        };

        for (ds_idx, item) in datasets.iter().enumerate() {
            let Value::DataSet(ds) = item else {
                return Err(IteratorError::BadShape {
                    expected: "a dataset in every list element",
                });
            };
            if !ds.is_uniform() {
                return Err(IteratorError::Ragged);
            }

            let index = parse_dataset(ds)?;
            if self.col_names.is_empty() {
                self.col_names = ds.col_names.clone();
            }

            for (row_idx, row) in ds.rows.iter().enumerate() {
                if index.edges.is_empty() {
                    // A dataset with no edge columns contributes one
                    // logical row per vertex row.
                    self.rows.push(LogicalRow {
                        ds: ds_idx,
                        row: row_idx,
                        edge: None,
                        item: 0,
                    });
                    continue;
                }
                for (edge_idx, edge) in index.edges.iter().enumerate() {
                    let Some(Value::List(items)) = row.values.get(edge.col) else {
                        continue;
                    };
                    for item in 0..items.len() {
                        self.rows.push(LogicalRow {
                            ds: ds_idx,
                            row: row_idx,
                            edge: Some(edge_idx),
                            item,
                        });
                    }
                }
            }
            self.indices.push(index);
        }
        Ok(())
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

    /// Whether construction accepted the input. A structurally valid but
    /// empty response still reports `true` here while `valid()` is false.
    pub fn accepted(&self) -> bool {
        self.valid
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

    /// Reads a physical column of the current row by full column name.
    pub fn get_column(&self, name: &str) -> Value {
        let Some(logical) = self.rows.get(self.cursor) else {
            return Value::Empty;
        };
        self.column_at(logical, name)
    }

    fn column_at(&self, logical: &LogicalRow, name: &str) -> Value {
        let Some(index) = self.indices.get(logical.ds) else {
            return Value::Empty;
        };
        let Some(col) = index.cols.get(name) else {
            return Value::Empty;
        };
        match dataset_at(&self.value, logical.ds)
            .and_then(|ds| ds.rows.get(logical.row))
            .and_then(|row| row.values.get(*col))
        {
            Some(cell) => cell.clone(),
            None => Value::Empty,
        }
    }

    /// Reads a tag property of the current row's vertex.
    ///
    /// Returns plain null when the current dataset does not carry the tag
    /// (a mixed-schema batch), and an unknown-prop null when the tag is
    /// present but the property is not declared.
    pub fn get_tag_prop(&self, tag: &str, prop: &str) -> Value {
        let Some(logical) = self.rows.get(self.cursor) else {
            return Value::Empty;
        };
        let Some(index) = self.indices.get(logical.ds) else {
            return Value::Empty;
        };
        let Some(tag_idx) = index.tag_pos.get(tag) else {
            return Value::NULL;
        };
        let tag_index = &index.tags[*tag_idx];
        let Some(pos) = tag_index.prop_pos.get(prop) else {
            return Value::Null(NullKind::UnknownProp);
        };
        let cell = self.cell_at(logical, tag_index.col);
        match cell {
            Value::List(items) => items.get(*pos).cloned().unwrap_or_default(),
            _ => Value::Empty,
        }
    }

    /// Reads an edge property of the current logical edge.
    ///
    /// Returns plain null when the current logical row belongs to a
    /// different edge, and empty when the row carries no edge at all.
    pub fn get_edge_prop(&self, edge: &str, prop: &str) -> Value {
        let Some(logical) = self.rows.get(self.cursor) else {
            return Value::Empty;
        };
        let Some(index) = self.indices.get(logical.ds) else {
            return Value::Empty;
        };
        let Some(edge_idx) = logical.edge else {
            return Value::Empty;
        };
        let edge_index = &index.edges[edge_idx];
        if edge_index.name != edge {
            return Value::NULL;
        }
        let Some(pos) = edge_index.prop_pos.get(prop) else {
            return Value::Null(NullKind::UnknownProp);
        };
        match self.edge_cell(logical, edge_index) {
            Some(values) => values.get(*pos).cloned().unwrap_or_default(),
            None => Value::Empty,
        }
    }

    fn cell_at(&self, logical: &LogicalRow, col: usize) -> Value {
        dataset_at(&self.value, logical.ds)
            .and_then(|ds| ds.rows.get(logical.row))
            .and_then(|row| row.values.get(col))
            .cloned()
            .unwrap_or_default()
    }

    /// The prop-value list of the current logical edge instance.
    fn edge_cell(&self, logical: &LogicalRow, edge: &EdgeIndex) -> Option<Vec<Value>> {
        let cell = dataset_at(&self.value, logical.ds)?
            .rows
            .get(logical.row)?
            .values
            .get(edge.col)?;
        let Value::List(items) = cell else {
            return None;
        };
        match items.get(logical.item)? {
            Value::List(values) => Some(values.clone()),
            _ => None,
        }
    }

    // --------------------------------------------------------------------------------------------
    // Entity synthesis
    // --------------------------------------------------------------------------------------------

    /// Synthesizes the current row's vertex from every tag column of its
    /// dataset. Tag cells that are absent contribute no tag.
    pub fn get_vertex(&self) -> Value {
        let Some(logical) = self.rows.get(self.cursor) else {
            return Value::Empty;
        };
        self.vertex_at(logical)
    }

    fn vertex_at(&self, logical: &LogicalRow) -> Value {
        let Some(index) = self.indices.get(logical.ds) else {
            return Value::Empty;
        };
        let vid = self.column_at(logical, COL_VID);
        if vid.is_empty() {
            return Value::Empty;
        }

        let mut vertex = Vertex {
            vid,
            tags: Vec::new(),
        };
        for tag_index in &index.tags {
            let Value::List(items) = self.cell_at(logical, tag_index.col) else {
                continue;
            };
            let mut tag = Tag::new(tag_index.name.clone());
            for (pos, prop) in tag_index.props.iter().enumerate() {
                tag.props
                    .insert(prop.clone(), items.get(pos).cloned().unwrap_or_default());
            }
            vertex.tags.push(tag);
        }
        Value::from(vertex)
    }

    /// Synthesizes the current logical edge.
    ///
    /// A `+`-signed column keeps `src`/`dst` as stored; a `-`-signed
    /// column is the reverse view, so `src`/`dst` swap and the type sign
    /// flips. Rows without an edge yield empty.
    pub fn get_edge(&self) -> Value {
        let Some(logical) = self.rows.get(self.cursor) else {
            return Value::Empty;
        };
        self.edge_at(logical)
    }

    fn edge_at(&self, logical: &LogicalRow) -> Value {
        let Some(index) = self.indices.get(logical.ds) else {
            return Value::Empty;
        };
        let Some(edge_idx) = logical.edge else {
            return Value::Empty;
        };
        let edge_index = &index.edges[edge_idx];
        let Some(values) = self.edge_cell(logical, edge_index) else {
            return Value::Empty;
        };

        let prop_value = |name: &str| -> Value {
            edge_index
                .prop_pos
                .get(name)
                .and_then(|pos| values.get(*pos).cloned())
                .unwrap_or_default()
        };

        let vid = self.column_at(logical, COL_VID);
        let dst = prop_value(COL_DST);
        let stored_type = prop_value(COL_TYPE).as_int().unwrap_or(0) as i32;
        let ranking = prop_value(COL_RANK).as_int().unwrap_or(0);

        let mut edge = Edge {
            name: edge_index.name.clone(),
            ranking,
            ..Edge::default()
        };
        if edge_index.forward {
            edge.src = vid;
            edge.dst = dst;
            edge.etype = stored_type;
        } else {
            edge.src = dst;
            edge.dst = vid;
            edge.etype = -stored_type;
        }

        for (pos, prop) in edge_index.props.iter().enumerate() {
            if prop == COL_DST || prop == COL_TYPE || prop == COL_RANK {
                continue;
            }
            edge.props
                .insert(prop.clone(), values.get(pos).cloned().unwrap_or_default());
        }
        Value::from(edge)
    }

    /// Every distinct vertex across the whole iterator, deduplicated by
    /// vid in first-seen order. Ignores the cursor.
    pub fn get_vertices(&self) -> Value {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for logical in &self.rows {
            let vid = self.column_at(logical, COL_VID);
            if vid.is_empty() || !seen.insert(vid.to_string()) {
                continue;
            }
            let vertex = self.vertex_at(logical);
            if !vertex.is_empty() {
                out.push(vertex);
            }
        }
        Value::List(out)
    }

    /// Every logical edge across the whole iterator, in traversal order.
    /// Ignores the cursor.
    pub fn get_edges(&self) -> Value {
        let mut out = Vec::new();
        for logical in &self.rows {
            let edge = self.edge_at(logical);
            if !edge.is_empty() {
                out.push(edge);
            }
        }
        Value::List(out)
    }
}

// ------------------------------------------------------------------------------------------------
// Header parsing
// ------------------------------------------------------------------------------------------------

fn dataset_at(value: &Value, idx: usize) -> Option<&DataSet> {
    match value {
        Value::List(items) => match items.get(idx)? {
            Value::DataSet(ds) => Some(ds),
            _ => None,
        },
        _ => None,
    }
}

/// Checks the reserved column layout and builds the per-dataset index.
fn parse_dataset(ds: &DataSet) -> Result<DataSetIndex, IteratorError> {
    let cols = &ds.col_names;
    if cols.len() < 3 {
        return Err(IteratorError::BadHeader(format!(
            "expected at least 3 columns, got {}",
            cols.len()
        )));
    }
    if cols[0] != COL_VID {
        return Err(IteratorError::BadHeader(format!(
            "first column must be {COL_VID}, got \"{}\"",
            cols[0]
        )));
    }
    if cols[1] != COL_STATS {
        return Err(IteratorError::BadHeader(format!(
            "second column must be {COL_STATS}, got \"{}\"",
            cols[1]
        )));
    }
    let last = cols.len() - 1;
    if cols[last] != COL_EXPR {
        return Err(IteratorError::BadHeader(format!(
            "last column must be {COL_EXPR}, got \"{}\"",
            cols[last]
        )));
    }

    let mut index = DataSetIndex {
        cols: cols
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect(),
        tags: Vec::new(),
        tag_pos: HashMap::new(),
        edges: Vec::new(),
    };

    for (col, name) in cols.iter().enumerate().take(last).skip(2) {
        if let Some(rest) = name.strip_prefix(TAG_COL_PREFIX) {
            let mut parts = rest.split(':');
            let tag_name = parts.next().unwrap_or_default();
            if tag_name.is_empty() {
                return Err(IteratorError::BadHeader(format!(
                    "tag column \"{name}\" has an empty tag name"
                )));
            }
            // An empty property list is legal: "does this vertex carry
            // this tag" queries need no props.
            let props: Vec<String> = parts
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            let prop_pos = props
                .iter()
                .enumerate()
                .map(|(i, p)| (p.clone(), i))
                .collect();
            index.tag_pos.insert(tag_name.to_string(), index.tags.len());
            index.tags.push(TagIndex {
                name: tag_name.to_string(),
                col,
                props,
                prop_pos,
            });
        } else if let Some(rest) = name.strip_prefix(EDGE_COL_PREFIX) {
            let mut parts = rest.split(':');
            let signed = parts.next().unwrap_or_default();
            let forward = match signed.chars().next() {
                Some('+') => true,
                Some('-') => false,
                _ => {
                    return Err(IteratorError::BadHeader(format!(
                        "edge column \"{name}\" lacks a +/- direction sign"
                    )));
                }
            };
            let edge_name = &signed[1..];
            if edge_name.is_empty() {
                return Err(IteratorError::BadHeader(format!(
                    "edge column \"{name}\" has an empty edge name"
                )));
            }
            let mut props: Vec<String> = parts
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if props.is_empty() {
                // Bare edge columns still carry the implicit meta triple.
                props = vec![COL_DST.into(), COL_TYPE.into(), COL_RANK.into()];
            }
            let prop_pos = props
                .iter()
                .enumerate()
                .map(|(i, p)| (p.clone(), i))
                .collect();
            index.edges.push(EdgeIndex {
                name: edge_name.to_string(),
                col,
                forward,
                props,
                prop_pos,
            });
        } else {
            return Err(IteratorError::BadHeader(format!(
                "column \"{name}\" is neither a tag nor an edge column"
            )));
        }
    }

    Ok(index)
}
