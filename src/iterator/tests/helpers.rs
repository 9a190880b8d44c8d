//! Shared builders for iterator tests: canonical neighbor-response
//! datasets with mixed tag/edge schemas.

#![cfg(test)]

use std::sync::Arc;

use crate::value::{DataSet, Row, Value};

/// A two-column dataset `col1: int, col2: string` with rows `0..n`.
pub fn int_str_dataset(n: i64) -> DataSet {
    let mut ds = DataSet::new(vec!["col1".into(), "col2".into()]);
    for i in 0..n {
        ds.append_row(Row::new(vec![Value::from(i), Value::from(i.to_string())]));
    }
    ds
}

/// A neighbor-response dataset with one tag column and one edge column.
///
/// - vids are `vid_start..vid_end`, rendered as strings.
/// - The tag cell is `[0, 1]` for `(prop1, prop2)`.
/// - Each row carries `edges_per_row` edges with cells
///   `[0, 1, "2", etype, rank]` for `(prop1, prop2, _dst, _type, _rank)`,
///   where rank counts up from 0.
pub fn neighbor_dataset(
    tag: &str,
    edge_col: &str,
    etype: i64,
    vid_start: i64,
    vid_end: i64,
    edges_per_row: usize,
) -> DataSet {
    let mut ds = DataSet::new(vec![
        "_vid".into(),
        "_stats".into(),
        format!("_tag:{tag}:prop1:prop2"),
        format!("_edge:{edge_col}:prop1:prop2:_dst:_type:_rank"),
        "_expr".into(),
    ]);

    for i in vid_start..vid_end {
        let tag_cell = Value::List(vec![Value::from(0i64), Value::from(1i64)]);
        let mut edges = Vec::with_capacity(edges_per_row);
        for rank in 0..edges_per_row as i64 {
            edges.push(Value::List(vec![
                Value::from(0i64),
                Value::from(1i64),
                Value::from("2"),
                Value::from(etype),
                Value::from(rank),
            ]));
        }
        ds.append_row(Row::new(vec![
            Value::from(i.to_string()),
            Value::Empty,
            tag_cell,
            Value::List(edges),
            Value::Empty,
        ]));
    }
    ds
}

/// A neighbor-response dataset with a tag column but no edge columns.
pub fn neighbor_dataset_no_edges(tag: &str, vid_start: i64, vid_end: i64) -> DataSet {
    let mut ds = DataSet::new(vec![
        "_vid".into(),
        "_stats".into(),
        format!("_tag:{tag}:prop1:prop2"),
        "_expr".into(),
    ]);
    for i in vid_start..vid_end {
        ds.append_row(Row::new(vec![
            Value::from(i.to_string()),
            Value::Empty,
            Value::List(vec![Value::from(0i64), Value::from(1i64)]),
            Value::Empty,
        ]));
    }
    ds
}

/// The canonical two-batch response used across the neighbor tests:
/// `tag1`/`+edge1` over vids 0..10 and `tag2`/`-edge2` over vids 10..20,
/// two edges per vertex row.
pub fn mixed_neighbor_value() -> Arc<Value> {
    let ds1 = neighbor_dataset("tag1", "+edge1", 1, 0, 10, 2);
    let ds2 = neighbor_dataset("tag2", "-edge2", -2, 10, 20, 2);
    Arc::new(Value::List(vec![Value::from(ds1), Value::from(ds2)]))
}
