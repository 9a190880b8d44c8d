//! Property iterator — flat tagged-property datasets.
//!
//! The get-properties RPC returns one dataset whose columns are either
//! reserved metas (`_vid`, `_src`, `_dst`, `_type`, `_rank`) or
//! `<entity>.<prop>` pairs, where the entity is a tag or an edge name.
//! An entity that declares any of the edge metas among its properties is
//! an edge entity; everything else is a tag entity.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::value::{COL_DST, COL_RANK, COL_SRC, COL_TYPE, COL_VID, Edge, Row, Tag, Value, Vertex};

// ------------------------------------------------------------------------------------------------
// Entity grouping
// ------------------------------------------------------------------------------------------------

/// The columns belonging to one `<entity>.` prefix, in declared order.
#[derive(Debug, Clone)]
struct EntityIndex {
    name: String,
    /// `(prop name, column index)` pairs in declared order.
    props: Vec<(String, usize)>,
    prop_cols: HashMap<String, usize>,
    is_edge: bool,
}

// ------------------------------------------------------------------------------------------------
// PropIter
// ------------------------------------------------------------------------------------------------

/// Iterates a flat property dataset row by row, synthesizing vertices and
/// edges from the dotted column groups.
#[derive(Debug, Clone)]
pub struct PropIter {
    value: Arc<Value>,
    order: Vec<usize>,
    cursor: usize,
    col_idx: HashMap<String, usize>,
    col_names: Vec<String>,
    entities: Vec<EntityIndex>,
}

impl PropIter {
    /// Wraps a dataset value; non-dataset or ragged input yields a
    /// zero-row iterator.
    pub fn new(value: Arc<Value>) -> Self {
        let mut iter = Self {
            value: Arc::clone(&value),
            order: Vec::new(),
            cursor: 0,
            col_idx: HashMap::new(),
            col_names: Vec::new(),
            entities: Vec::new(),
        };

        let Value::DataSet(ds) = &*value else {
            warn!(value = %*value, "property iterator over a non-dataset value");
            return iter;
        };
        if !ds.is_uniform() {
            warn!("property iterator over a ragged dataset");
            return iter;
        }

        iter.order = (0..ds.rows.len()).collect();
        iter.col_names = ds.col_names.clone();
        iter.col_idx = ds
            .col_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        // Group dotted columns by entity, preserving first-seen order.
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (col, name) in ds.col_names.iter().enumerate() {
            let Some((entity, prop)) = name.split_once('.') else {
                continue;
            };
            if entity.is_empty() || prop.is_empty() {
                continue;
            }
            let slot = *by_name.entry(entity.to_string()).or_insert_with(|| {
                iter.entities.push(EntityIndex {
                    name: entity.to_string(),
                    props: Vec::new(),
                    prop_cols: HashMap::new(),
                    is_edge: false,
                });
                iter.entities.len() - 1
            });
            let entry = &mut iter.entities[slot];
            entry.props.push((prop.to_string(), col));
            entry.prop_cols.insert(prop.to_string(), col);
            if matches!(prop, COL_SRC | COL_DST | COL_TYPE | COL_RANK) {
                entry.is_edge = true;
            }
        }

        iter
    }

    // --------------------------------------------------------------------------------------------
    // Navigation
    // --------------------------------------------------------------------------------------------

    pub fn valid(&self) -> bool {
        self.cursor < self.order.len()
    }

    pub fn next(&mut self) {
        if self.valid() {
            self.cursor += 1;
        }
    }

    pub fn reset(&mut self, start: usize) {
        self.cursor = start.min(self.order.len());
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }

    pub fn erase(&mut self) {
        if self.valid() {
            self.order.remove(self.cursor);
        }
    }

    pub fn unstable_erase(&mut self) {
        if self.valid() {
            self.order.swap_remove(self.cursor);
        }
    }

    fn row(&self) -> Option<&Row> {
        let ds = self.value.as_dataset()?;
        ds.rows.get(*self.order.get(self.cursor)?)
    }

    fn row_at(&self, logical: usize) -> Option<&Row> {
        let ds = self.value.as_dataset()?;
        ds.rows.get(*self.order.get(logical)?)
    }

    // --------------------------------------------------------------------------------------------
    // Cell access
    // --------------------------------------------------------------------------------------------

    pub fn get_column(&self, name: &str) -> Value {
        let Some(col) = self.col_idx.get(name) else {
            return Value::Empty;
        };
        match self.row() {
            Some(row) => row.values.get(*col).cloned().unwrap_or_default(),
            None => Value::Empty,
        }
    }

    /// `<tag>.<prop>` lookup; unknown tags resolve to plain null.
    pub fn get_tag_prop(&self, tag: &str, prop: &str) -> Value {
        self.entity_prop(tag, prop, false)
    }

    /// `<edge>.<prop>` lookup; unknown edges resolve to plain null.
    pub fn get_edge_prop(&self, edge: &str, prop: &str) -> Value {
        self.entity_prop(edge, prop, true)
    }

    fn entity_prop(&self, entity: &str, prop: &str, want_edge: bool) -> Value {
        let Some(index) = self
            .entities
            .iter()
            .find(|e| e.name == entity && e.is_edge == want_edge)
        else {
            return Value::NULL;
        };
        let Some(col) = index.prop_cols.get(prop) else {
            return Value::NULL;
        };
        match self.row() {
            Some(row) => row.values.get(*col).cloned().unwrap_or_default(),
            None => Value::Empty,
        }
    }

    // --------------------------------------------------------------------------------------------
    // Entity synthesis
    // --------------------------------------------------------------------------------------------

    /// Builds the current row's vertex from every tag entity, skipping
    /// properties (and whole tags) whose cells are absent.
    pub fn get_vertex(&self) -> Value {
        self.vertex_at(self.cursor)
    }

    fn vertex_at(&self, logical: usize) -> Value {
        let Some(row) = self.row_at(logical) else {
            return Value::Empty;
        };
        let vid = self
            .col_idx
            .get(COL_VID)
            .and_then(|col| row.values.get(*col).cloned())
            .unwrap_or_default();
        if vid.is_empty() {
            return Value::Empty;
        }

        let mut vertex = Vertex {
            vid,
            tags: Vec::new(),
        };
        for entity in self.entities.iter().filter(|e| !e.is_edge) {
            let mut tag = Tag::new(entity.name.clone());
            for (prop, col) in &entity.props {
                let cell = row.values.get(*col).cloned().unwrap_or_default();
                if cell.is_empty() {
                    continue;
                }
                tag.props.insert(prop.clone(), cell);
            }
            if !tag.props.is_empty() {
                vertex.tags.push(tag);
            }
        }
        Value::from(vertex)
    }

    /// Builds an edge from the first edge entity whose `_src` cell is
    /// present on the current row.
    pub fn get_edge(&self) -> Value {
        self.edge_at(self.cursor)
    }

    fn edge_at(&self, logical: usize) -> Value {
        let Some(row) = self.row_at(logical) else {
            return Value::Empty;
        };
        let cell = |col: &usize| row.values.get(*col).cloned().unwrap_or_default();

        for entity in self.entities.iter().filter(|e| e.is_edge) {
            let src = entity.prop_cols.get(COL_SRC).map(cell).unwrap_or_default();
            if src.is_empty() {
                continue;
            }
            let mut edge = Edge {
                src,
                dst: entity.prop_cols.get(COL_DST).map(cell).unwrap_or_default(),
                etype: entity
                    .prop_cols
                    .get(COL_TYPE)
                    .map(cell)
                    .and_then(|v| v.as_int())
                    .unwrap_or(0) as i32,
                ranking: entity
                    .prop_cols
                    .get(COL_RANK)
                    .map(cell)
                    .and_then(|v| v.as_int())
                    .unwrap_or(0),
                name: entity.name.clone(),
                ..Edge::default()
            };
            for (prop, col) in &entity.props {
                if matches!(prop.as_str(), COL_SRC | COL_DST | COL_TYPE | COL_RANK) {
                    continue;
                }
                let value = cell(col);
                if value.is_empty() {
                    continue;
                }
                edge.props.insert(prop.clone(), value);
            }
            return Value::from(edge);
        }
        Value::Empty
    }

    /// Every row's vertex, deduplicated by vid in first-seen order.
    pub fn get_vertices(&self) -> Value {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for logical in 0..self.order.len() {
            let vertex = self.vertex_at(logical);
            let Value::Vertex(v) = &vertex else {
                continue;
            };
            if seen.insert(v.vid.to_string()) {
                out.push(vertex);
            }
        }
        Value::List(out)
    }

    /// Every row's edge, in traversal order.
    pub fn get_edges(&self) -> Value {
        let mut out = Vec::new();
        for logical in 0..self.order.len() {
            let edge = self.edge_at(logical);
            if !edge.is_empty() {
                out.push(edge);
            }
        }
        Value::List(out)
    }
}
