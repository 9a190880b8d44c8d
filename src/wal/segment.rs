//! WAL segment files: naming, recovery scan, gap repair.
//!
//! A segment holds a contiguous run of records, each laid out as
//!
//! ```text
//! [log_id: u64 LE][msg_len: u32 LE][payload][msg_len: u32 LE]
//! ```
//!
//! with no file header, version byte, or checksum. The trailing length is
//! the integrity marker: the first 8 bytes of a healthy file equal the
//! filename-encoded first log id, and the final record's trailing length
//! matches its leading length.
//!
//! The recovery scan enumerates `*.wal` files, validates each one (fast
//! backward tail check, falling back to a forward salvage scan that keeps
//! the longest intact record prefix), then repairs id gaps by deleting
//! every file before the last gap so the longest contiguous suffix
//! survives.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{error, info, warn};

use super::WalError;

/// Bytes of the `[log_id | msg_len]` record header.
pub(crate) const RECORD_HEADER: usize = 8 + 4;

/// Total framing bytes per record: header plus the trailing length.
pub(crate) const RECORD_OVERHEAD: usize = RECORD_HEADER + 4;

/// Digits in a segment filename (a zero-padded u64 first log id).
const NAME_DIGITS: usize = 19;

const WAL_EXT: &str = ".wal";

// ------------------------------------------------------------------------------------------------
// Segment metadata
// ------------------------------------------------------------------------------------------------

/// Metadata of one on-disk segment.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Log id of the first record; also encoded in the filename and the
    /// first 8 bytes of the file.
    pub first_log_id: u64,

    /// Log id of the last record. For a freshly created segment with no
    /// records yet this is `first_log_id - 1`.
    pub last_log_id: u64,

    /// Current file size in bytes.
    pub size: u64,

    /// Last modification time at scan (or creation).
    pub mtime: SystemTime,

    /// Absolute path of the segment file.
    pub fullname: PathBuf,
}

impl SegmentInfo {
    /// Whether the segment currently holds any records.
    pub fn has_records(&self) -> bool {
        self.last_log_id >= self.first_log_id
    }
}

/// Formats the segment filename for a first log id: 19 zero-padded
/// decimal digits plus the `.wal` extension.
pub(crate) fn segment_file_name(first_log_id: u64) -> String {
    format!("{first_log_id:019}{WAL_EXT}")
}

/// Parses a filename of the form `<019 digits>.wal` into its first log id.
pub(crate) fn parse_segment_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(WAL_EXT)?;
    if stem.len() != NAME_DIGITS || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

// ------------------------------------------------------------------------------------------------
// Recovery scan
// ------------------------------------------------------------------------------------------------

/// Enumerates and validates the segment files in `dir`, repairing gaps.
///
/// Returns the surviving segments sorted by `first_log_id`, forming one
/// contiguous id range. Files that fail validation are discarded (a
/// salvageable tail is truncated to its intact prefix instead); on a gap,
/// every file before the last gap is deleted so the longest contiguous
/// suffix wins.
pub(crate) fn scan_dir(dir: &Path) -> Result<Vec<SegmentInfo>, WalError> {
    let mut segments = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(name_id) = parse_segment_name(name) else {
            if name.ends_with(WAL_EXT) {
                warn!(file = name, "ignoring wal file with malformed name");
            }
            continue;
        };

        let metadata = entry.metadata()?;
        if metadata.len() == 0 {
            // A crash between segment creation and the first flush leaves
            // an empty file; it carries nothing worth keeping and its
            // name may collide with the next prepared segment.
            info!(file = name, "removing empty wal segment");
            fs::remove_file(&path)?;
            continue;
        }

        match inspect_segment(&path, name_id, metadata.len()) {
            Some(info) => segments.push(info),
            None => {
                warn!(file = name, "discarding unreadable wal segment");
                fs::remove_file(&path)?;
            }
        }
    }

    segments.sort_by_key(|info| info.first_log_id);
    repair_gaps(&mut segments)?;
    Ok(segments)
}

/// Validates a single segment, returning its metadata.
///
/// The fast path checks only the tail: trailing record length against
/// leading length, then reads the final log id. When the tail check
/// fails the file is re-walked from the front and truncated to the
/// longest intact prefix; `None` means not even the first record
/// survived.
fn inspect_segment(path: &Path, name_id: u64, size: u64) -> Option<SegmentInfo> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(err) => {
            error!(file = %path.display(), error = %err, "failed to open wal segment");
            return None;
        }
    };

    let first_log_id = read_u64_at(&mut file, 0)?;
    if first_log_id != name_id {
        error!(
            file = %path.display(),
            first_log_id,
            name_id,
            "first log id does not match the file name"
        );
        return None;
    }

    let (last_log_id, valid_size) = match check_tail(&mut file, name_id, size) {
        Some(last) => (last, size),
        None => {
            warn!(
                file = %path.display(),
                "tail check failed, salvaging the intact record prefix"
            );
            let (last, prefix) = salvage_prefix(&mut file, name_id, size)?;
            if let Err(err) = file.set_len(prefix) {
                error!(file = %path.display(), error = %err, "failed to truncate segment");
                return None;
            }
            info!(
                file = %path.display(),
                last_log_id = last,
                bytes = prefix,
                "segment truncated to its last whole record"
            );
            (last, prefix)
        }
    };

    let mtime = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);

    Some(SegmentInfo {
        first_log_id,
        last_log_id,
        size: valid_size,
        mtime,
        fullname: path.to_path_buf(),
    })
}

/// Backward tail validation: trailing length, matching leading length,
/// final log id. Returns the last log id on success.
fn check_tail(file: &mut File, first_log_id: u64, size: u64) -> Option<u64> {
    if size < (RECORD_OVERHEAD + 1) as u64 {
        // Too short for even a one-byte record.
        return None;
    }

    let trailing_len = read_u32_at(file, size - 4)? as u64;
    let record_size = trailing_len + RECORD_OVERHEAD as u64;
    if record_size > size {
        return None;
    }

    let leading_len = read_u32_at(file, size - trailing_len - 8)?;
    if leading_len as u64 != trailing_len {
        return None;
    }

    let last_log_id = read_u64_at(file, size - record_size)?;
    if last_log_id < first_log_id {
        return None;
    }
    Some(last_log_id)
}

/// Forward scan keeping the longest intact record prefix.
///
/// Returns `(last_log_id, prefix_bytes)`, or `None` when the very first
/// record is already broken.
fn salvage_prefix(file: &mut File, first_log_id: u64, size: u64) -> Option<(u64, u64)> {
    let mut pos: u64 = 0;
    let mut expected = first_log_id;

    loop {
        if pos + RECORD_HEADER as u64 > size {
            break;
        }
        let log_id = read_u64_at(file, pos)?;
        if log_id != expected {
            break;
        }
        let msg_len = read_u32_at(file, pos + 8)? as u64;
        let record_size = msg_len + RECORD_OVERHEAD as u64;
        if pos + record_size > size {
            break;
        }
        let trailing = read_u32_at(file, pos + RECORD_HEADER as u64 + msg_len)?;
        if trailing as u64 != msg_len {
            break;
        }
        pos += record_size;
        expected += 1;
    }

    if expected == first_log_id {
        return None;
    }
    Some((expected - 1, pos))
}

/// Deletes every file before the last id gap, keeping the longest
/// contiguous suffix.
fn repair_gaps(segments: &mut Vec<SegmentInfo>) -> Result<(), WalError> {
    let mut id_after_last_gap = None;
    for pair in segments.windows(2) {
        if pair[1].first_log_id != pair[0].last_log_id + 1 {
            error!(
                gap_before = pair[1].first_log_id,
                prev_last = pair[0].last_log_id,
                "found a log id gap between wal segments"
            );
            id_after_last_gap = Some(pair[1].first_log_id);
        }
    }

    let Some(keep_from) = id_after_last_gap else {
        return Ok(());
    };

    let mut kept = Vec::with_capacity(segments.len());
    for info in segments.drain(..) {
        if info.first_log_id < keep_from {
            info!(file = %info.fullname.display(), "removing wal segment before the gap");
            fs::remove_file(&info.fullname)?;
        } else {
            kept.push(info);
        }
    }
    *segments = kept;
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Positioned reads
// ------------------------------------------------------------------------------------------------

fn read_u64_at(file: &mut File, pos: u64) -> Option<u64> {
    let mut buf = [0u8; 8];
    file.seek(SeekFrom::Start(pos)).ok()?;
    file.read_exact(&mut buf).ok()?;
    Some(u64::from_le_bytes(buf))
}

fn read_u32_at(file: &mut File, pos: u64) -> Option<u32> {
    let mut buf = [0u8; 4];
    file.seek(SeekFrom::Start(pos)).ok()?;
    file.read_exact(&mut buf).ok()?;
    Some(u32::from_le_bytes(buf))
}
