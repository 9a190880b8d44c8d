//! Cache read-through wrapper for get-neighbors.
//!
//! Serves topology-only neighbor requests entirely from the edge cache
//! (a "short-circuit"), falling back to the wrapped client for anything
//! the cache cannot answer faithfully:
//!
//! - requests carrying a filter expression, random sampling, or a limit
//!   (the cache stores complete, unfiltered dst lists);
//! - requests without a vertex-props constraint;
//! - requests asking for any edge property beyond `_dst`;
//! - any single cache miss across the requested keys.
//!
//! Responses coming back from the fallback path repopulate the cache.
//! The cache is advisory: there is no ordering between a repopulation
//! and a concurrent storage write, and writers invalidate the keys they
//! touch.

use std::sync::Arc;

use tracing::info;

use crate::cache::{GraphCache, edge_key};
use crate::value::{COL_DST, COL_EXPR, COL_STATS, COL_VID, DataSet, Row, Value};

use super::{
    GetNeighborsRequest, GetNeighborsResponse, RpcFuture, StorageClient, StorageError,
    TraverseSpec,
};

/// Decorates a [`StorageClient`] with the edge-topology short-circuit.
pub struct CachedStorageClient {
    inner: Arc<dyn StorageClient>,
    cache: Arc<GraphCache>,
}

impl std::fmt::Debug for CachedStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedStorageClient").finish_non_exhaustive()
    }
}

impl CachedStorageClient {
    pub fn new(inner: Arc<dyn StorageClient>, cache: Arc<GraphCache>) -> Self {
        Self { inner, cache }
    }

    /// Whether the request semantics allow serving from cache at all.
    ///
    /// Exposed for tests; `get_neighbors` applies it internally.
    pub fn check_condition(req: &GetNeighborsRequest) -> Result<(), StorageError> {
        if req.spec.filter.is_some() {
            return Err(StorageError::Invalid(
                "get neighbors request contains a filter expression".into(),
            ));
        }
        if req.spec.random {
            return Err(StorageError::Invalid(
                "get neighbors request contains random sampling".into(),
            ));
        }
        if req.spec.limit.is_some() {
            return Err(StorageError::Invalid(
                "get neighbors request contains a limit".into(),
            ));
        }
        if req.spec.vertex_props.is_none() {
            return Err(StorageError::Invalid(
                "get neighbors request does not constrain vertex props".into(),
            ));
        }
        Ok(())
    }

    /// Derives the edge context: requested edge types and the response
    /// column names. Rejects requests wanting more than topology.
    fn build_edge_context(spec: &TraverseSpec) -> Result<(Vec<i32>, Vec<String>), StorageError> {
        let Some(edge_props) = spec.edge_props.as_ref() else {
            return Err(StorageError::Invalid(
                "get neighbors request does not name edge props".into(),
            ));
        };

        let mut etypes = Vec::with_capacity(edge_props.len());
        let mut col_names = Vec::with_capacity(edge_props.len() + 3);
        col_names.push(COL_VID.to_string());
        col_names.push(COL_STATS.to_string());

        for edge in edge_props {
            if edge.props.is_empty() {
                return Err(StorageError::Invalid(format!(
                    "edge {} requests no props, need {COL_DST}",
                    edge.name
                )));
            }
            if edge.props.iter().any(|p| p != COL_DST) {
                return Err(StorageError::Invalid(format!(
                    "edge {} requests props beyond {COL_DST}",
                    edge.name
                )));
            }
            let sign = if edge.etype > 0 { '+' } else { '-' };
            col_names.push(format!("_edge:{sign}{}:{COL_DST}", edge.name));
            etypes.push(edge.etype);
        }
        col_names.push(COL_EXPR.to_string());
        Ok((etypes, col_names))
    }

    /// Builds the full response from cache, or reports why it cannot.
    fn serve_from_cache(&self, req: &GetNeighborsRequest) -> Result<GetNeighborsResponse, StorageError> {
        Self::check_condition(req)?;
        let (etypes, col_names) = Self::build_edge_context(&req.spec)?;

        let mut result = DataSet::new(col_names);
        for rows in req.parts.values() {
            for vertex_row in rows {
                let vid = vertex_row
                    .values
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        StorageError::Invalid("vertex row without a string vid".into())
                    })?;

                let mut row = Vec::with_capacity(etypes.len() + 3);
                row.push(Value::from(vid));
                row.push(Value::Empty);

                for &etype in &etypes {
                    let key = edge_key(vid, etype);
                    let dsts = self.cache.get_edges(&key).map_err(|_| {
                        StorageError::NotFound(format!("edge cache miss for vid {vid}"))
                    })?;
                    // One edge instance per dst, each aligned with the
                    // declared prop list [_dst].
                    let edges: Vec<Value> = dsts
                        .into_iter()
                        .map(|dst| Value::List(vec![Value::from(dst)]))
                        .collect();
                    row.push(Value::List(edges));
                }
                row.push(Value::Empty);
                result.append_row(Row::new(row));
            }
        }

        Ok(GetNeighborsResponse {
            vertices: Some(result),
            failed_parts: Vec::new(),
        })
    }

    /// Memoizes a fallback response's dst lists back into the cache.
    fn insert_response(cache: &GraphCache, etypes: &[i32], resp: &GetNeighborsResponse) {
        let Some(dataset) = resp.vertices.as_ref() else {
            info!("neighbor response carries no dataset, nothing to cache");
            return;
        };
        if dataset.col_names.len() != etypes.len() + 3 {
            info!(
                cols = dataset.col_names.len(),
                etypes = etypes.len(),
                "neighbor response shape does not match the request, not caching"
            );
            return;
        }

        for row in &dataset.rows {
            let Some(vid) = row.values.first().and_then(Value::as_str) else {
                continue;
            };
            for (slot, cell) in row.values.iter().enumerate().skip(2).take(etypes.len()) {
                let etype = etypes[slot - 2];
                let Value::List(edges) = cell else {
                    continue;
                };
                let dsts: Vec<String> = edges
                    .iter()
                    .filter_map(|edge| match edge {
                        Value::List(props) => {
                            props.first().and_then(Value::as_str).map(str::to_string)
                        }
                        Value::Str(dst) => Some(dst.clone()),
                        _ => None,
                    })
                    .collect();
                if cache.put_edges(&edge_key(vid, etype), &dsts).is_err() {
                    info!(vid, etype, "failed to cache a dst list");
                }
            }
        }
    }
}

impl StorageClient for CachedStorageClient {
    fn get_neighbors(&self, req: GetNeighborsRequest) -> RpcFuture<GetNeighborsResponse> {
        match self.serve_from_cache(&req) {
            Ok(resp) => {
                info!(
                    rows = resp.vertices.as_ref().map(DataSet::len).unwrap_or(0),
                    "get_neighbors served from the edge cache"
                );
                return RpcFuture::ready(Ok(resp));
            }
            Err(reason) => {
                // Recoverable by policy: note it and take the RPC path.
                info!(%reason, "edge cache short-circuit not applicable");
            }
        }

        let etypes: Vec<i32> = req
            .spec
            .edge_props
            .as_ref()
            .map(|props| props.iter().map(|p| p.etype).collect())
            .unwrap_or_default();
        let cache = Arc::clone(&self.cache);

        self.inner.get_neighbors(req).inspect(move |result| {
            if let Ok(resp) = result {
                Self::insert_response(&cache, &etypes, resp);
            }
        })
    }
}
