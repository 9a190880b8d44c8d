//! Shared helpers for WAL tests: tiny configs, raw segment writers, and
//! record collectors.

#![cfg(test)]

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::config::WalConfig;
use crate::wal::{WalIterator, WalStore};

/// Small segments and buffers so rollover paths trigger quickly.
pub fn small_config() -> WalConfig {
    WalConfig {
        file_size_mb: 1,
        buffer_size_mb: 1,
        num_buffers: 4,
    }
}

/// Writes a raw segment file holding ids `[first, last]` with payloads
/// from `payload`, bypassing the store. Used to stage recovery layouts.
pub fn write_raw_segment(
    dir: &Path,
    first: u64,
    last: u64,
    payload: impl Fn(u64) -> Vec<u8>,
) -> std::path::PathBuf {
    let path = dir.join(format!("{first:019}.wal"));
    let mut bytes = Vec::new();
    for id in first..=last {
        let msg = payload(id);
        let len = msg.len() as u32;
        bytes.extend_from_slice(&id.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&msg);
        bytes.extend_from_slice(&len.to_le_bytes());
    }
    let mut file = fs::File::create(&path).expect("creating raw segment");
    file.write_all(&bytes).expect("writing raw segment");
    file.sync_all().expect("syncing raw segment");
    path
}

/// Drains an iterator into `(id, payload)` pairs via the manual cursor
/// API (valid / log_id / log_msg / next).
pub fn drain(iter: &mut WalIterator) -> Vec<(u64, Vec<u8>)> {
    let mut out = Vec::new();
    while iter.valid() {
        out.push((iter.log_id(), iter.log_msg()));
        iter.next();
    }
    out
}

/// Appends `count` records starting at id 1, payload = id rendered in
/// decimal repeated `width` times.
pub fn fill(store: &WalStore, count: u64, width: usize) {
    for id in 1..=count {
        store
            .append(id, id.to_string().repeat(width).into_bytes())
            .expect("append");
    }
}

/// The expected payload for ids written by [`fill`].
pub fn fill_payload(id: u64, width: usize) -> Vec<u8> {
    id.to_string().repeat(width).into_bytes()
}

/// Names of the `.wal` files in a directory, sorted.
pub fn wal_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("listing wal dir")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".wal"))
        .collect();
    names.sort();
    names
}
