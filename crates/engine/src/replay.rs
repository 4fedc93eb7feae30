/// Startup replay: rebuilds the key directory from the segment files.
///
/// `open` calls [`replay_segment`] once per existing segment, in ascending
/// id order. Records within a segment are walked in file order, so the
/// directory ends up reflecting the last write for every key, the same
/// state the live write path would have produced. A tombstone removes its
/// key; anything else inserts or overwrites the key's locator.
///
/// Torn-write recovery: if fewer than a full header, or fewer bytes than
/// the header describes, remain at the tail of a segment, the walk stops
/// there. The write path's single write + fsync per record makes that
/// boundary well-defined; partial records are dropped silently, never
/// repaired.
use std::path::Path;

use codec::HEADER_SIZE;
use keydir::{KeyDir, Locator};
use segment::Segment;

use crate::Result;

/// Replays one segment file into `keydir`.
///
/// At most `max_log_size` bytes are read: a segment written within bounds
/// is never longer than that, and anything beyond could not have been
/// produced by this store's write path.
///
/// # Errors
///
/// I/O errors propagate. Torn trailing records are not errors.
pub(crate) fn replay_segment(
    dir: &Path,
    id: u64,
    max_log_size: u64,
    keydir: &mut KeyDir,
) -> Result<()> {
    let seg = Segment::open_readonly(dir, id)?;
    let len = seg.size()?.min(max_log_size);
    if len == 0 {
        // An empty segment is legal (e.g. a fresh active from a previous
        // session that never saw a write).
        return Ok(());
    }
    let buf = seg.read_at(0, len as u32)?;

    let mut pos = 0usize;
    while buf.len() - pos >= HEADER_SIZE {
        let (timestamp, key_size, value_size) = codec::decode_header(&buf, pos);
        let record_len = codec::record_size(key_size, value_size);
        if ((buf.len() - pos) as u64) < record_len {
            // Torn trailing record from a crashed write.
            break;
        }
        let record_len = record_len as usize;

        let key_start = pos + HEADER_SIZE;
        let key = &buf[key_start..key_start + key_size as usize];
        let value = &buf[key_start + key_size as usize..pos + record_len];

        if codec::is_tombstone(value) {
            keydir.remove(key);
        } else {
            keydir.put(
                key.to_vec(),
                Locator {
                    segment_id: id,
                    offset: pos as u64,
                    length: record_len as u32,
                    timestamp,
                },
            );
        }
        pos += record_len;
    }

    Ok(())
}
