//! Default iterator — a single value as a one-row sequence.

use std::sync::Arc;

use crate::value::Value;

/// Wraps one value; `size() == 1`, `next()` invalidates.
///
/// Used for constant results and for operators whose output is a scalar
/// rather than a table.
#[derive(Debug, Clone)]
pub struct DefaultIter {
    value: Arc<Value>,
    counter: usize,
}

impl DefaultIter {
    pub fn new(value: Arc<Value>) -> Self {
        Self { value, counter: 0 }
    }

    pub fn valid(&self) -> bool {
        self.counter < 1
    }

    pub fn next(&mut self) {
        if self.valid() {
            self.counter += 1;
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    pub fn size(&self) -> usize {
        1
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Erasing a scalar is meaningless; the request is ignored.
    pub fn erase(&mut self) {
        tracing::debug!("erase() called on a default iterator; ignored");
    }
}
