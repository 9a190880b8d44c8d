//! # Query Iterator Model
//!
//! The uniform lazy-sequence abstraction the executor streams intermediate
//! results through. Every operator consumes and produces a [`RowIter`]: a
//! tagged variant over five iterator kinds, each wrapping a shared,
//! immutable [`Value`] handle.
//!
//! | Kind | Wraps | Logical row |
//! |------|-------|-------------|
//! | [`DefaultIter`] | a single value | the value itself, once |
//! | [`SequentialIter`] | a dataset | one physical dataset row |
//! | [`NeighborsIter`] | a list of neighbor-response datasets | one vertex-edge pair |
//! | [`PropIter`] | a flat tagged-property dataset | one physical dataset row |
//! | [`JoinIter`] | rows of other iterators | one composed row |
//!
//! ## Design Invariants
//!
//! - Iterators never mutate the wrapped value. Erasure is logical: each
//!   kind keeps an index vector (or logical-row vector) that `erase`,
//!   `unstable_erase`, and `erase_range` edit, so copies of the same value
//!   handle stay intact.
//! - Invalid input produces an iterator that is *constructed* but reports
//!   `valid() == false` and yields zero rows. Construction never panics
//!   and never returns an error to the caller.
//! - Column lookup is case-sensitive exact match, resolved through a
//!   per-iterator index built once at construction.
//! - After `erase` the cursor rests on the row that followed the erased
//!   one; after `unstable_erase` it rests on the row swapped in from the
//!   tail (a previously unseen row).
//! - Iterators are single-threaded: one worker drives an iterator at a
//!   time.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Submodules
// ------------------------------------------------------------------------------------------------

mod default;
mod join;
mod neighbors;
mod prop;
mod sequential;

pub use default::DefaultIter;
pub use join::JoinIter;
pub use neighbors::NeighborsIter;
pub use prop::PropIter;
pub use sequential::SequentialIter;

use crate::expr::ExprContext;
use crate::value::Value;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Why an iterator input was rejected.
///
/// These are reported by the validation helpers (and logged by the
/// constructors); the constructors themselves swallow the error and
/// produce a zero-row iterator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IteratorError {
    /// The wrapped value is not the shape this iterator kind expects.
    #[error("unexpected value shape: expected {expected}")]
    BadShape {
        /// Human-readable expected shape.
        expected: &'static str,
    },

    /// A neighbor-response dataset violated the column-name convention.
    #[error("invalid neighbor dataset header: {0}")]
    BadHeader(String),

    /// A dataset row does not match the declared column width.
    #[error("ragged dataset: row width differs from column count")]
    Ragged,
}

// ------------------------------------------------------------------------------------------------
// RowIter
// ------------------------------------------------------------------------------------------------

/// Iterator kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterKind {
    Default,
    Sequential,
    Neighbors,
    Prop,
    Join,
}

/// The tagged iterator variant passed between executor operators.
///
/// Common operations dispatch on the tag; kind-specific accessors (tag and
/// edge property reads, vertex/edge synthesis, join row construction) live
/// on the concrete types, reachable through the `as_*` accessors or by
/// matching.
#[derive(Debug, Clone)]
pub enum RowIter {
    Default(DefaultIter),
    Sequential(SequentialIter),
    Neighbors(NeighborsIter),
    Prop(PropIter),
    Join(JoinIter),
}

impl RowIter {
    pub fn kind(&self) -> IterKind {
        match self {
            RowIter::Default(_) => IterKind::Default,
            RowIter::Sequential(_) => IterKind::Sequential,
            RowIter::Neighbors(_) => IterKind::Neighbors,
            RowIter::Prop(_) => IterKind::Prop,
            RowIter::Join(_) => IterKind::Join,
        }
    }

    /// Whether the cursor rests on a row.
    pub fn valid(&self) -> bool {
        match self {
            RowIter::Default(it) => it.valid(),
            RowIter::Sequential(it) => it.valid(),
            RowIter::Neighbors(it) => it.valid(),
            RowIter::Prop(it) => it.valid(),
            RowIter::Join(it) => it.valid(),
        }
    }

    /// Advances the cursor one logical row.
    pub fn next(&mut self) {
        match self {
            RowIter::Default(it) => it.next(),
            RowIter::Sequential(it) => it.next(),
            RowIter::Neighbors(it) => it.next(),
            RowIter::Prop(it) => it.next(),
            RowIter::Join(it) => it.next(),
        }
    }

    /// Rewinds the cursor to the first remaining row.
    pub fn reset(&mut self) {
        match self {
            RowIter::Default(it) => it.reset(),
            RowIter::Sequential(it) => it.reset(0),
            RowIter::Neighbors(it) => it.reset(),
            RowIter::Prop(it) => it.reset(0),
            RowIter::Join(it) => it.reset(),
        }
    }

    /// Number of remaining logical rows.
    pub fn size(&self) -> usize {
        match self {
            RowIter::Default(it) => it.size(),
            RowIter::Sequential(it) => it.size(),
            RowIter::Neighbors(it) => it.size(),
            RowIter::Prop(it) => it.size(),
            RowIter::Join(it) => it.size(),
        }
    }

    /// Reads a column of the current row by exact name.
    ///
    /// Unknown columns resolve to [`Value::Empty`].
    pub fn get_column(&self, name: &str) -> Value {
        match self {
            RowIter::Default(_) => Value::Empty,
            RowIter::Sequential(it) => it.get_column(name),
            RowIter::Neighbors(it) => it.get_column(name),
            RowIter::Prop(it) => it.get_column(name),
            RowIter::Join(it) => it.get_column(name),
        }
    }

    /// The column names this iterator exposes (empty for [`DefaultIter`]).
    pub fn col_names(&self) -> &[String] {
        match self {
            RowIter::Default(_) => &[],
            RowIter::Sequential(it) => it.col_names(),
            RowIter::Neighbors(it) => it.col_names(),
            RowIter::Prop(it) => it.col_names(),
            RowIter::Join(it) => it.col_names(),
        }
    }

    /// Logically deletes the current row, leaving the cursor on the row
    /// that followed it. Order-preserving, O(n).
    pub fn erase(&mut self) {
        match self {
            RowIter::Default(it) => it.erase(),
            RowIter::Sequential(it) => it.erase(),
            RowIter::Neighbors(it) => it.erase(),
            RowIter::Prop(it) => it.erase(),
            RowIter::Join(it) => it.erase(),
        }
    }

    /// Deletes the current row by swapping the last row in. O(1),
    /// reorders; the cursor rests on the swapped-in row.
    pub fn unstable_erase(&mut self) {
        match self {
            RowIter::Default(it) => it.erase(),
            RowIter::Sequential(it) => it.unstable_erase(),
            RowIter::Neighbors(it) => it.unstable_erase(),
            RowIter::Prop(it) => it.unstable_erase(),
            RowIter::Join(it) => it.unstable_erase(),
        }
    }

    /// A fresh-cursor copy over the same value handle. Prior erasures are
    /// preserved; the underlying value is shared, not cloned.
    pub fn copy(&self) -> RowIter {
        let mut out = self.clone();
        out.reset();
        out
    }

    pub fn as_sequential(&self) -> Option<&SequentialIter> {
        match self {
            RowIter::Sequential(it) => Some(it),
            _ => None,
        }
    }

    pub fn as_neighbors(&self) -> Option<&NeighborsIter> {
        match self {
            RowIter::Neighbors(it) => Some(it),
            _ => None,
        }
    }
}

/// Filter expressions read the current row through the iterator.
impl ExprContext for RowIter {
    fn get_column(&self, name: &str) -> Value {
        RowIter::get_column(self, name)
    }
}
