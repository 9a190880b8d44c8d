//! Sequential iterator: traversal, copies, erase family, default wrap.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::iterator::tests::helpers::int_str_dataset;
    use crate::iterator::{DefaultIter, RowIter, SequentialIter};
    use crate::value::Value;

    // ----------------------------------------------------------------
    // Default iterator
    // ----------------------------------------------------------------

    /// A default iterator is a one-row sequence over its value.
    #[test]
    fn default_iter_single_row() {
        let constant = Arc::new(Value::from(1i64));
        let mut iter = DefaultIter::new(Arc::clone(&constant));
        assert_eq!(iter.size(), 1);

        let mut visits = 0;
        while iter.valid() {
            assert_eq!(iter.value(), &*constant);
            visits += 1;
            iter.next();
        }
        assert_eq!(visits, 1);
        assert!(!iter.valid());

        iter.reset();
        assert!(iter.valid());
    }

    // ----------------------------------------------------------------
    // Traversal and copies
    // ----------------------------------------------------------------

    /// # Scenario
    /// Ten rows traverse in order with column access by name.
    #[test]
    fn traversal_reads_columns() {
        let val = Arc::new(Value::from(int_str_dataset(10)));
        let mut iter = SequentialIter::new(val);
        assert_eq!(iter.size(), 10);

        let mut i = 0i64;
        while iter.valid() {
            assert_eq!(iter.get_column("col1"), Value::from(i));
            assert_eq!(iter.get_column("col2"), Value::from(i.to_string()));
            iter.next();
            i += 1;
        }
        assert_eq!(i, 10);
        // Exhausted cursors read empty, not stale cells.
        assert_eq!(iter.get_column("col1"), Value::Empty);
    }

    /// Copies share the value but traverse independently from the start.
    #[test]
    fn copy_of_copy_traverses_fresh() {
        let val = Arc::new(Value::from(int_str_dataset(10)));
        let mut iter = RowIter::Sequential(SequentialIter::new(val));
        iter.next();
        iter.next();

        let copy1 = iter.copy();
        let mut copy2 = copy1.copy();
        assert_eq!(copy2.size(), 10);

        let mut i = 0i64;
        while copy2.valid() {
            assert_eq!(copy2.get_column("col1"), Value::from(i));
            copy2.next();
            i += 1;
        }
        assert_eq!(i, 10);
    }

    // ----------------------------------------------------------------
    // Erase family
    // ----------------------------------------------------------------

    /// # Scenario
    /// Keep-odd filtering via the canonical erase loop, then reset.
    ///
    /// # Expected behavior
    /// Exactly the odd rows survive, in their original order; a reset to
    /// position 1 skips the first survivor.
    #[test]
    fn erase_loop_keeps_predicate_rows() {
        let val = Arc::new(Value::from(int_str_dataset(10)));
        let mut iter = SequentialIter::new(val);
        assert_eq!(iter.size(), 10);

        while iter.valid() {
            let keep = iter
                .get_column("col1")
                .as_int()
                .is_some_and(|v| v % 2 != 0);
            if keep {
                iter.next();
            } else {
                iter.erase();
            }
        }

        iter.reset(0);
        let mut survivors = Vec::new();
        while iter.valid() {
            survivors.push(iter.get_column("col1"));
            iter.next();
        }
        assert_eq!(
            survivors,
            vec![
                Value::from(1i64),
                Value::from(3i64),
                Value::from(5i64),
                Value::from(7i64),
                Value::from(9i64),
            ]
        );

        let mut count = survivors.len() as i64;
        iter.reset(1);
        while iter.valid() {
            count -= 1;
            iter.next();
        }
        assert_eq!(count, 1);
    }

    /// `unstable_erase` swaps the tail row in: O(1), order not preserved,
    /// size down by exactly one.
    #[test]
    fn unstable_erase_swaps_last_row_in() {
        let val = Arc::new(Value::from(int_str_dataset(3)));
        let mut iter = SequentialIter::new(val);
        assert_eq!(iter.size(), 3);

        iter.unstable_erase();
        assert_eq!(iter.size(), 2);

        let mut rows = Vec::new();
        while iter.valid() {
            rows.push((iter.get_column("col1"), iter.get_column("col2")));
            iter.next();
        }
        assert_eq!(
            rows,
            vec![
                (Value::from(2i64), Value::from("2")),
                (Value::from(1i64), Value::from("1")),
            ]
        );
    }

    #[test]
    fn erase_range_clamps_and_preserves_rest() {
        // Out-of-range end clamps to the length.
        let val = Arc::new(Value::from(int_str_dataset(10)));
        let mut iter = SequentialIter::new(Arc::clone(&val));
        iter.erase_range(5, 11);
        assert_eq!(iter.size(), 5);
        let mut i = 0i64;
        while iter.valid() {
            assert_eq!(iter.get_column("col1"), Value::from(i));
            iter.next();
            i += 1;
        }
        assert_eq!(i, 5);

        // Full range empties the iterator.
        let mut iter = SequentialIter::new(Arc::clone(&val));
        iter.erase_range(0, 10);
        assert_eq!(iter.size(), 0);
        assert!(!iter.valid());

        // Front half removed: traversal starts at row 5.
        let mut iter = SequentialIter::new(val);
        iter.erase_range(0, 5);
        assert_eq!(iter.size(), 5);
        let mut i = 5i64;
        while iter.valid() {
            assert_eq!(iter.get_column("col1"), Value::from(i));
            iter.next();
            i += 1;
        }
        assert_eq!(i, 10);
    }

    /// Erasure must not touch the shared value: a second iterator over the
    /// same handle still sees all rows.
    #[test]
    fn erase_is_logical_only() {
        let val = Arc::new(Value::from(int_str_dataset(4)));
        let mut first = SequentialIter::new(Arc::clone(&val));
        first.erase();
        first.erase();
        assert_eq!(first.size(), 2);

        let second = SequentialIter::new(val);
        assert_eq!(second.size(), 4);
    }

    // ----------------------------------------------------------------
    // Invalid construction
    // ----------------------------------------------------------------

    /// Non-dataset input constructs a zero-row iterator, no panic.
    #[test]
    fn non_dataset_value_is_invalid() {
        let iter = SequentialIter::new(Arc::new(Value::from(7i64)));
        assert!(!iter.valid());
        assert_eq!(iter.size(), 0);
        assert_eq!(iter.get_column("col1"), Value::Empty);
    }
}
