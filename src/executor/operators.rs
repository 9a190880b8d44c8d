//! The operator bodies: filter, project, limit, get-neighbors.
//!
//! Each operator is a plain function over iterators; the plan driver
//! decides where it runs (inline or on the [`OperatorPool`]) and what
//! deadline applies.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::expr::Expr;
use crate::iterator::{NeighborsIter, RowIter, SequentialIter};
use crate::storage::{GetNeighborsRequest, StorageClient};
use crate::value::{DataSet, Row, Value};

use super::ExecutorError;

/// Keeps the rows where `predicate` evaluates to a definite `true`.
///
/// Null (any subtype) and empty both drop the row, via the canonical
/// erase loop: after an erase the cursor already rests on the next row.
pub fn filter(mut input: RowIter, predicate: &Expr) -> Result<RowIter, ExecutorError> {
    let before = input.size();
    while input.valid() {
        if predicate.eval(&input) == Value::Bool(true) {
            input.next();
        } else {
            input.erase();
        }
    }
    input.reset();
    debug!(before, after = input.size(), "filter applied");
    Ok(input)
}

/// Projects the named columns into a fresh sequential iterator.
///
/// Unknown columns yield empty cells; the input's traversal order is
/// preserved.
pub fn project(mut input: RowIter, columns: &[String]) -> Result<RowIter, ExecutorError> {
    if columns.is_empty() {
        return Err(ExecutorError::Invalid("projection without columns".into()));
    }

    let mut out = DataSet::new(columns.to_vec());
    input.reset();
    while input.valid() {
        let row: Vec<Value> = columns.iter().map(|name| input.get_column(name)).collect();
        out.append_row(Row::new(row));
        input.next();
    }
    Ok(RowIter::Sequential(SequentialIter::new(Arc::new(
        Value::from(out),
    ))))
}

/// Keeps `count` rows starting at `offset`, erasing everything else
/// in place.
pub fn limit(mut input: RowIter, offset: usize, count: usize) -> Result<RowIter, ExecutorError> {
    let size = input.size();
    let end = offset.saturating_add(count);

    match &mut input {
        RowIter::Sequential(iter) => {
            iter.erase_range(end, size);
            iter.erase_range(0, offset);
        }
        _ => {
            // Generic path: walk and erase outside the window.
            input.reset();
            let mut idx = 0usize;
            while input.valid() {
                if idx < offset || idx >= end {
                    input.erase();
                } else {
                    input.next();
                }
                idx += 1;
            }
        }
    }
    input.reset();
    Ok(input)
}

/// Issues a get-neighbors RPC and wraps the response as a neighbors
/// iterator.
///
/// - `timeout` bounds the wait; expiry is an operator-level error.
/// - A partial response passes through only when
///   `accept_partial_success` is set; otherwise it fails the operator.
pub fn get_neighbors(
    client: &dyn StorageClient,
    req: GetNeighborsRequest,
    timeout: Option<Duration>,
    accept_partial_success: bool,
) -> Result<RowIter, ExecutorError> {
    let future = client.get_neighbors(req);
    let resp = match timeout {
        Some(deadline) => future.wait_timeout(deadline)?,
        None => future.wait()?,
    };

    if resp.is_partial() {
        if accept_partial_success {
            warn!(
                failed = resp.failed_parts.len(),
                "continuing with a partial neighbor response"
            );
        } else {
            return Err(ExecutorError::Partial {
                failed_parts: resp.failed_parts,
            });
        }
    }

    let datasets = match resp.vertices {
        Some(ds) => vec![Value::from(ds)],
        None => Vec::new(),
    };
    Ok(RowIter::Neighbors(NeighborsIter::new(Arc::new(
        Value::List(datasets),
    ))))
}
