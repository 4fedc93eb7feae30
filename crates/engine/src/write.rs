/// Write path: `set()`, `delete()`, and segment rollover.
///
/// All mutations flow through this module. Each one encodes a single record,
/// rolls the active segment over if the append would exceed `max_log_size`,
/// appends the record with one write call, forces it to disk, and only then
/// updates the key directory and advances the write cursor. A failed write
/// or sync leaves the cursor and directory untouched.
use std::time::{SystemTime, UNIX_EPOCH};

use keydir::Locator;
use segment::Segment;

use crate::{Engine, Result, StoreError};

/// Wall-clock milliseconds since epoch, as the record header stores them.
fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

impl Engine {
    /// Inserts or overwrites a key-value pair.
    ///
    /// The record is appended to the active segment and fsynced before the
    /// key directory is updated, so a successful return guarantees the
    /// value is persisted.
    ///
    /// A value equal to [`TOMBSTONE`](crate::TOMBSTONE) is, by the on-disk
    /// format, a deletion record; such a `set` behaves exactly like
    /// [`delete`](Engine::delete), keeping the live directory consistent
    /// with what replay would rebuild.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] if the encoded record could never
    /// fit in one segment; I/O failures propagate with the engine state
    /// unchanged.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let timestamp = now_ms();
        let record = codec::encode_record(timestamp, key, value);
        let (segment_id, offset) = self.append_record(&record)?;

        if codec::is_tombstone(value) {
            self.keydir.remove(key);
        } else {
            self.keydir.put(
                key.to_vec(),
                Locator {
                    segment_id,
                    offset,
                    length: record.len() as u32,
                    timestamp,
                },
            );
        }
        Ok(())
    }

    /// Deletes a key by writing a tombstone record.
    ///
    /// Deleting an absent key still appends a tombstone (idempotent on
    /// disk); the directory removal is then a no-op. Durability is the same
    /// as [`set`](Engine::set).
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let record = codec::encode_record(now_ms(), key, codec::TOMBSTONE);
        self.append_record(&record)?;
        self.keydir.remove(key);
        Ok(())
    }

    /// Appends one encoded record to the active segment, rolling over
    /// first if it would not fit, and returns `(segment_id, offset)` of
    /// where it landed. The cursor advances only after the write and sync
    /// both succeed.
    pub(crate) fn append_record(&mut self, record: &[u8]) -> Result<(u64, u64)> {
        let len = record.len() as u64;
        if len > self.max_log_size {
            return Err(StoreError::InvalidArgument(format!(
                "record of {} bytes exceeds max_log_size {}",
                len, self.max_log_size
            )));
        }

        if self.cursor + len > self.max_log_size {
            self.roll_over()?;
        }

        let offset = self.cursor;
        let written = self.active.append(record)?;
        self.active.sync()?;
        self.cursor += written;
        Ok((self.active_id, offset))
    }

    /// Seals the active segment and opens a fresh one with the next id.
    ///
    /// The new segment is created before the swap, so a failure here leaves
    /// the current active segment untouched. The old handle closes when it
    /// is replaced; its id joins the sealed list and the cursor resets.
    pub(crate) fn roll_over(&mut self) -> Result<()> {
        let next_id = self.active_id + 1;
        let next = Segment::open_active(&self.dir, next_id)?;

        drop(std::mem::replace(&mut self.active, next));
        self.sealed.push(self.active_id);
        self.active_id = next_id;
        self.cursor = 0;
        Ok(())
    }
}
