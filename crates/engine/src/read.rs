/// Read path: `get()`, `list_keys()`, and `fold()`.
///
/// A lookup is a key directory probe followed by a positioned read of
/// exactly the record length the directory recorded. The active segment is
/// read through the same handle that writes it; sealed segments are opened
/// read-only on demand. A locator that points past end-of-file, or a header
/// that disagrees with the recorded length, is a consistency violation, not
/// an ordinary miss.
use std::io::ErrorKind;

use keydir::Locator;
use segment::Segment;

use crate::{Engine, Result, StoreError};

impl Engine {
    /// Looks up a key, returning `Ok(None)` if it is absent or deleted.
    ///
    /// # Errors
    ///
    /// I/O failures propagate; a locator pointing outside its segment
    /// fails with [`StoreError::Consistency`]. Reads never mutate engine
    /// state.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let loc = match self.keydir.get(key) {
            Some(loc) => loc,
            None => return Ok(None),
        };
        let record = self.read_record(loc)?;
        let (_, _, value) = codec::decode_record(&record, 0);
        Ok(Some(value.to_vec()))
    }

    /// Snapshot of the current keys, in the order they first entered the
    /// directory this session.
    #[must_use]
    pub fn list_keys(&self) -> Vec<Vec<u8>> {
        self.keydir.keys().map(|k| k.to_vec()).collect()
    }

    /// Reads every live record in insertion order and invokes `callback`
    /// with its key and value.
    ///
    /// The callback cannot mutate the engine: `fold` holds a shared borrow
    /// for its whole duration.
    pub fn fold<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        for (key, loc) in self.keydir.entries() {
            let record = self.read_record(loc)?;
            let (_, _, value) = codec::decode_record(&record, 0);
            callback(key, value);
        }
        Ok(())
    }

    /// Fetches the full record bytes a locator points at, validating that
    /// the decoded header matches the length the directory recorded.
    pub(crate) fn read_record(&self, loc: &Locator) -> Result<Vec<u8>> {
        if loc.segment_id == self.active_id {
            read_validated(&self.active, loc)
        } else {
            let sealed = Segment::open_readonly(&self.dir, loc.segment_id)?;
            read_validated(&sealed, loc)
        }
    }
}

/// Positioned read of one record plus the header-vs-locator sanity check.
pub(crate) fn read_validated(seg: &Segment, loc: &Locator) -> Result<Vec<u8>> {
    let record = seg.read_at(loc.offset, loc.length).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            StoreError::Consistency(format!(
                "locator {}+{} reaches past the end of segment {}",
                loc.offset, loc.length, loc.segment_id
            ))
        } else {
            StoreError::Io(e)
        }
    })?;

    let (_, key_size, value_size) = codec::decode_header(&record, 0);
    if codec::record_size(key_size, value_size) != loc.length as u64 {
        return Err(StoreError::Consistency(format!(
            "header at segment {} offset {} describes {} bytes, directory recorded {}",
            loc.segment_id,
            loc.offset,
            codec::record_size(key_size, value_size),
            loc.length
        )));
    }
    Ok(record)
}
