//! # Segment — Append-Only Data Files
//!
//! A [`Segment`] is a handle over one append-only data file in an EddyKV
//! database directory. Segments are named `NNNNN.dat` with a five-digit
//! zero-padded decimal id, assigned in monotonically increasing order, so
//! that lexicographic filename order equals creation order.
//!
//! Exactly one segment at a time is *active*: open in append mode and
//! writable. All others are *sealed*: read-only, re-opened on demand for
//! lookups, and never written again (they may be unlinked during merge).
//!
//! `append` writes all provided bytes with a single `write_all` call and
//! returns the count written; durability is the caller's move via [`sync`].
//! Reads are positioned (`read_at`) and go through a shared `&File`, so a
//! reader never disturbs the append position of the active segment.
//!
//! [`sync`]: Segment::sync

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Width of the zero-padded decimal id in a segment filename.
pub const ID_WIDTH: usize = 5;

/// Filename extension for segment files.
pub const SEGMENT_EXT: &str = "dat";

/// Returns the filename for a segment id, e.g. `file_name(7) == "00007.dat"`.
pub fn file_name(id: u64) -> String {
    format!("{:0width$}.{}", id, SEGMENT_EXT, width = ID_WIDTH)
}

/// Returns the full path of a segment file inside `dir`.
pub fn path_for(dir: &Path, id: u64) -> PathBuf {
    dir.join(file_name(id))
}

/// Parses a directory entry name back into a segment id.
///
/// Accepts exactly the segment naming pattern (five ASCII alphanumerics
/// followed by `.dat`) and returns `None` for everything else, including
/// pattern-matching stems that are not decimal numbers (those cannot carry
/// an id this store assigned). `open` uses this to ignore unrelated files.
pub fn parse_file_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".dat")?;
    if stem.len() != ID_WIDTH || !stem.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    stem.parse().ok()
}

/// A handle over one segment file.
///
/// The active segment is opened with `open_active` (create + append + read);
/// sealed segments with `open_readonly`. Dropping the handle closes the
/// file.
#[derive(Debug)]
pub struct Segment {
    id: u64,
    path: PathBuf,
    file: File,
}

impl Segment {
    /// Opens (or creates) the segment file for `id` in append mode.
    ///
    /// Append-mode writes always land at end-of-file; for a freshly created
    /// segment that is offset 0.
    pub fn open_active(dir: &Path, id: u64) -> io::Result<Self> {
        let path = path_for(dir, id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self { id, path, file })
    }

    /// Opens an existing segment file read-only.
    pub fn open_readonly(dir: &Path, id: u64) -> io::Result<Self> {
        let path = path_for(dir, id);
        let file = File::open(&path)?;
        Ok(Self { id, path, file })
    }

    /// Appends `bytes` with a single write call, returning the number of
    /// bytes written.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        self.file.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Reads exactly `length` bytes starting at `offset`.
    ///
    /// Fails with `ErrorKind::UnexpectedEof` if the range extends past
    /// end-of-file. Reading goes through a shared borrow of the handle, so
    /// the active segment can be read without a mutable reference.
    pub fn read_at(&self, offset: u64, length: u32) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; length as usize];
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))?;
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Forces a durable flush of the file to disk.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Current size of the segment file in bytes.
    pub fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
