//! WAL iterators: ranges, file/buffer traversal, snapshot stability.

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::config::WalConfig;
    use crate::wal::WalStore;
    use crate::wal::tests::helpers::{drain, fill, fill_payload, small_config};

    // ----------------------------------------------------------------
    // Ranges
    // ----------------------------------------------------------------

    /// An empty range (or an empty store) is invalid immediately.
    #[test]
    fn empty_ranges_are_invalid() {
        let tmp = TempDir::new().unwrap();
        let wal = WalStore::open(tmp.path(), small_config()).unwrap();

        // Empty store: nothing to read.
        assert!(!wal.iterator(1, None).valid());

        wal.append(1, b"a".to_vec()).unwrap();
        wal.append(2, b"b".to_vec()).unwrap();

        // start > last
        assert!(!wal.iterator(3, None).valid());
        // start > explicit last
        assert!(!wal.iterator(2, Some(1)).valid());
        // start below the live range
        assert!(!wal.iterator(0, None).valid());
    }

    /// Bounded ranges stop exactly at `last_id`.
    #[test]
    fn bounded_range_yields_exact_window() {
        let tmp = TempDir::new().unwrap();
        let wal = WalStore::open(tmp.path(), small_config()).unwrap();
        fill(&wal, 10, 1);

        let mut iter = wal.iterator(3, Some(6));
        let records = drain(&mut iter);
        assert_eq!(
            records.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![3, 4, 5, 6]
        );
    }

    // ----------------------------------------------------------------
    // Source mix
    // ----------------------------------------------------------------

    /// Records still sitting in the unflushed buffer are readable.
    #[test]
    fn reads_from_in_memory_buffers() {
        let tmp = TempDir::new().unwrap();
        // Roomy buffer: nothing gets frozen or flushed.
        let config = WalConfig {
            file_size_mb: 16,
            buffer_size_mb: 8,
            num_buffers: 4,
        };
        let wal = WalStore::open(tmp.path(), config).unwrap();
        fill(&wal, 50, 2);

        let mut iter = wal.iterator(1, None);
        let records = drain(&mut iter);
        assert_eq!(records.len(), 50);
        assert_eq!(records[49], (50, fill_payload(50, 2)));
    }

    /// A range spanning flushed segments *and* live buffers reads both
    /// sides seamlessly.
    #[test]
    fn spans_files_then_buffers() {
        let tmp = TempDir::new().unwrap();
        let wal = WalStore::open(tmp.path(), small_config()).unwrap();
        // Enough to freeze + flush several buffers (1 MiB each)...
        fill(&wal, 3000, 512);
        // ...then a little more that stays buffered.
        for id in 3001..=3010u64 {
            wal.append(id, fill_payload(id, 2)).unwrap();
        }

        // Start well inside the flushed region; end in the live buffer.
        let mut iter = wal.iterator(2000, None);
        let records = drain(&mut iter);
        assert_eq!(records.len(), 1011);
        assert_eq!(records.first().map(|(id, _)| *id), Some(2000));
        assert_eq!(records.last().map(|(id, _)| *id), Some(3010));
        assert_eq!(records[0].1, fill_payload(2000, 512));
        assert_eq!(records[1010].1, fill_payload(3010, 2));
    }

    // ----------------------------------------------------------------
    // Snapshot stability
    // ----------------------------------------------------------------

    /// # Scenario
    /// An iterator is built, then the appender keeps writing.
    ///
    /// # Expected behavior
    /// The iterator yields exactly the records visible at construction;
    /// later appends change nothing.
    #[test]
    fn later_appends_do_not_change_the_snapshot() {
        let tmp = TempDir::new().unwrap();
        let wal = WalStore::open(tmp.path(), small_config()).unwrap();
        fill(&wal, 5, 1);

        let mut iter = wal.iterator(1, None);

        for id in 6..=20u64 {
            wal.append(id, fill_payload(id, 1)).unwrap();
        }

        let records = drain(&mut iter);
        assert_eq!(
            records.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
    }

    /// An iterator keeps working after the store handle is gone: it
    /// holds its own reference to the shared state.
    #[test]
    fn outlives_the_store_handle() {
        let tmp = TempDir::new().unwrap();
        let wal = WalStore::open(tmp.path(), small_config()).unwrap();
        fill(&wal, 8, 4);

        let mut iter = wal.iterator(1, None);
        // Read a couple of records, then drop the store.
        assert!(iter.valid());
        assert_eq!(iter.log_id(), 1);
        iter.next();
        drop(wal);

        let rest = drain(&mut iter);
        assert_eq!(rest.len(), 7);
        assert_eq!(rest.last().map(|(id, _)| *id), Some(8));
    }

    // ----------------------------------------------------------------
    // std::iter::Iterator bridge
    // ----------------------------------------------------------------

    /// The iterator feeds `append_many` on a second store (the
    /// replication catch-up shape) and the copy round-trips bytewise.
    #[test]
    fn feeds_append_many_for_catch_up() {
        let tmp_src = TempDir::new().unwrap();
        let tmp_dst = TempDir::new().unwrap();

        let src = WalStore::open(tmp_src.path(), small_config()).unwrap();
        fill(&src, 40, 8);

        let dst = WalStore::open(tmp_dst.path(), small_config()).unwrap();
        let copied = dst.append_many(src.iterator(1, None)).unwrap();
        assert_eq!(copied, 40);
        assert_eq!(dst.last_log_id(), 40);

        let src_records = drain(&mut src.iterator(1, None));
        let dst_records = drain(&mut dst.iterator(1, None));
        assert_eq!(src_records, dst_records);
    }
}
