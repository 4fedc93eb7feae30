/// Merge (compaction): rewrites live records into fresh segments, then
/// deletes every segment that existed when the merge began.
///
/// New segment ids start strictly after every pre-merge id, preserving the
/// later-id-equals-later-write ordering that replay depends on. Tombstones
/// are not carried forward: deleted keys are simply absent from the
/// directory at merge time and therefore absent from the merged output.
///
/// Merge is best-effort, not crash-safe. Every output record is synced
/// before any old file is unlinked, but a crash mid-merge can leave a mix
/// of old and new segments behind.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;

use keydir::Locator;
use segment::Segment;

use crate::read::read_validated;
use crate::{Engine, Result};

impl Engine {
    /// Compacts the store into the minimal set of segments holding only
    /// live records.
    ///
    /// # Procedure
    ///
    /// 1. Seal the active segment and note the complete pre-merge id set.
    /// 2. Open the first merge output with the next id; its handle replaces
    ///    the active one, so the old handle closes here.
    /// 3. Walk the key directory in insertion order, copying each record's
    ///    bytes into the output (rolling to further outputs on size) and
    ///    rewriting its locator in place. Length and timestamp carry over.
    /// 4. Open one more fresh segment as the new active for subsequent
    ///    writes.
    /// 5. Unlink every pre-merge segment file.
    ///
    /// Read handles for pre-merge segments are cached for the duration of
    /// the pass and dropped before any unlink.
    ///
    /// # Errors
    ///
    /// I/O failures propagate. The directory only ever points at records
    /// that are on disk, so a failed merge leaves a readable store, albeit
    /// with a mix of old and new segments.
    pub fn merge(&mut self) -> Result<()> {
        let mut old_ids = self.sealed.clone();
        old_ids.push(self.active_id);

        // The active id is the highest on disk, so outputs numbered past it
        // sort strictly after every pre-merge segment.
        let first_out = self.active_id + 1;
        let out = Segment::open_active(&self.dir, first_out)?;
        drop(std::mem::replace(&mut self.active, out));
        self.sealed.push(self.active_id);
        self.active_id = first_out;
        self.cursor = 0;

        // Snapshot the directory: every locator still points into the
        // pre-merge set, and rewriting entries must not disturb the walk.
        let live: Vec<(Vec<u8>, Locator)> = self
            .keydir
            .entries()
            .map(|(k, loc)| (k.to_vec(), loc.clone()))
            .collect();

        let mut readers: HashMap<u64, Segment> = HashMap::new();
        for (key, loc) in live {
            let source = match readers.entry(loc.segment_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => v.insert(Segment::open_readonly(&self.dir, loc.segment_id)?),
            };
            let record = read_validated(source, &loc)?;

            if self.cursor + record.len() as u64 > self.max_log_size {
                self.roll_over()?;
            }
            let offset = self.cursor;
            let written = self.active.append(&record)?;
            self.active.sync()?;
            self.cursor += written;

            self.keydir.put(
                key,
                Locator {
                    segment_id: self.active_id,
                    offset,
                    length: loc.length,
                    timestamp: loc.timestamp,
                },
            );
        }

        // Seal the last output and open the segment subsequent writes go to.
        self.roll_over()?;

        // Cached handles must be gone before their files are unlinked.
        drop(readers);

        for id in &old_ids {
            fs::remove_file(segment::path_for(&self.dir, *id))?;
            self.sealed.retain(|s| s != id);
        }

        Ok(())
    }
}
