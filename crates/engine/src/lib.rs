//! # Engine - EddyKV Storage Engine
//!
//! The central orchestrator that ties together the [`codec`], [`segment`],
//! and [`keydir`] crates into a complete Bitcask-style key-value store: a
//! log-structured hash table where every write is appended to a bounded
//! sequence of immutable segment files and an in-memory directory maps each
//! live key to the on-disk location of its newest record.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → encode → active segment append     │
//! │              |         (fsync per record)     │
//! │              |  (would exceed max_log_size?)  │
//! │              |            yes                 │
//! │              v                                │
//! │          rollover → seal, open next segment   │
//! │                                               │
//! │ read.rs → key directory → segment read_at     │
//! │              → decode → value                 │
//! │                                               │
//! │ replay.rs → scan segments in id order at open │
//! │ merge.rs  → rewrite live records, drop rest   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                 |
//! |--------------|---------------------------------------------------------|
//! | [`lib.rs`]   | `Engine` struct, options, error type, `open`, accessors |
//! | [`write`]    | `set()`, `delete()`, rollover, the write cursor         |
//! | [`read`]     | `get()`, `list_keys()`, `fold()`                        |
//! | [`replay`]   | startup scan that rebuilds the key directory            |
//! | [`merge`]    | compaction into a minimal set of fresh segments         |
//!
//! ## Durability
//!
//! Every `set`/`delete` is one `write` call followed by an fsync before the
//! key directory is touched: a successful return means the record is on
//! disk. Rollover happens *before* an append that would push the active
//! segment past `max_log_size`, so sealed segments never exceed it. On
//! reopen the directory is rebuilt by replaying every segment in id order;
//! a torn trailing record from a crashed write is silently dropped.
mod merge;
mod read;
mod replay;
mod write;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use keydir::KeyDir;
use segment::Segment;
use thiserror::Error;

pub use codec::TOMBSTONE;

/// Smallest accepted `max_log_size`, in bytes.
pub const MIN_MAX_LOG_SIZE: u64 = 1024;
/// Largest accepted `max_log_size`, in bytes.
pub const MAX_MAX_LOG_SIZE: u64 = 16384;
/// `max_log_size` used when the caller does not specify one.
pub const DEFAULT_MAX_LOG_SIZE: u64 = 4096;

/// Engine configuration.
///
/// `max_log_size` bounds the size of every sealed segment file; the active
/// segment rolls over before an append would exceed it. Accepted range is
/// `MIN_MAX_LOG_SIZE..=MAX_MAX_LOG_SIZE`; anything else makes
/// [`Engine::open`] fail with [`StoreError::InvalidArgument`].
#[derive(Debug, Copy, Clone)]
pub struct Options {
    pub max_log_size: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_log_size: DEFAULT_MAX_LOG_SIZE,
        }
    }
}

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A configuration or argument the engine refuses up front:
    /// `max_log_size` outside the accepted range, or a record that could
    /// never fit in one segment (and so could never be replayed).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying filesystem error, with the OS error preserved.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A locator pointed outside its segment, or a decoded header disagrees
    /// with the length the directory recorded. Indicates corruption or a
    /// bug; no recovery is attempted.
    #[error("internal consistency violation: {0}")]
    Consistency(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// The storage engine: active segment, sealed segment ids, key directory,
/// and the write cursor.
///
/// # Write Path
///
/// 1. Encode the record (header + key + value).
/// 2. Roll the active segment over if the append would exceed
///    `max_log_size`.
/// 3. Append with a single write, fsync, then update the key directory.
///
/// # Read Path
///
/// 1. Look the key up in the directory; absent means not-found.
/// 2. Positioned read of exactly `length` bytes from the locator's segment
///    (the active segment is read through the same handle that writes it;
///    sealed segments are opened read-only on demand).
/// 3. Decode and return the value bytes.
///
/// # Recovery
///
/// [`Engine::open`] lists `NNNNN.dat` files, replays them in ascending id
/// order to rebuild the directory, then opens a fresh active segment with
/// the next id.
pub struct Engine {
    pub(crate) dir: PathBuf,
    pub(crate) max_log_size: u64,
    /// The unique writable segment. Always has the highest id on disk.
    pub(crate) active: Segment,
    pub(crate) active_id: u64,
    /// Byte offset in the active segment where the next append will land.
    pub(crate) cursor: u64,
    /// Ids of sealed (read-only) segments, ascending.
    pub(crate) sealed: Vec<u64>,
    pub(crate) keydir: KeyDir,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dir", &self.dir)
            .field("max_log_size", &self.max_log_size)
            .field("active_id", &self.active_id)
            .field("cursor", &self.cursor)
            .field("sealed_count", &self.sealed.len())
            .field("key_count", &self.keydir.len())
            .finish()
    }
}

impl Engine {
    /// Opens a database directory, creating it if it does not exist, and
    /// rebuilds the key directory by replaying every existing segment.
    ///
    /// Directory entries that do not match the segment naming pattern are
    /// ignored. The new active segment gets the next id after the highest
    /// existing one and starts with its write cursor at 0.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] if `options.max_log_size` is outside
    /// `MIN_MAX_LOG_SIZE..=MAX_MAX_LOG_SIZE`; any filesystem error other
    /// than the directory not existing propagates as [`StoreError::Io`].
    pub fn open<P: AsRef<Path>>(dir: P, options: Options) -> Result<Self> {
        let max_log_size = options.max_log_size;
        if !(MIN_MAX_LOG_SIZE..=MAX_MAX_LOG_SIZE).contains(&max_log_size) {
            return Err(StoreError::InvalidArgument(format!(
                "max_log_size {} out of range ({}..={})",
                max_log_size, MIN_MAX_LOG_SIZE, MAX_MAX_LOG_SIZE
            )));
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        // Enumerate existing segments. Fixed-width zero-padded names make
        // ascending id order equal lexicographic order.
        let mut ids: Vec<u64> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(segment::parse_file_name))
            .collect();
        ids.sort_unstable();

        let mut keydir = KeyDir::new();
        for &id in &ids {
            replay::replay_segment(&dir, id, max_log_size, &mut keydir)?;
        }

        let active_id = ids.last().copied().unwrap_or(0) + 1;
        let active = Segment::open_active(&dir, active_id)?;

        Ok(Self {
            dir,
            max_log_size,
            active,
            active_id,
            cursor: 0,
            sealed: ids,
            keydir,
        })
    }

    /// Forces a durable flush of the active segment.
    ///
    /// `set` and `delete` already sync on every record, so this is a no-op
    /// in steady state; it exists for future batching modes.
    pub fn sync(&mut self) -> Result<()> {
        self.active.sync()?;
        Ok(())
    }

    /// Closes the store: every file handle and the in-memory directory are
    /// dropped. Consuming the engine makes use-after-close a compile error.
    pub fn close(self) {}

    /// Number of live keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keydir.len()
    }

    /// Returns `true` if no live keys exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keydir.is_empty()
    }

    /// Total number of segments on disk (sealed plus active).
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.sealed.len() + 1
    }

    /// Id of the segment currently open for appends.
    #[must_use]
    pub fn active_segment_id(&self) -> u64 {
        self.active_id
    }

    /// The configured segment size bound.
    #[must_use]
    pub fn max_log_size(&self) -> u64 {
        self.max_log_size
    }

    /// The database directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests;
