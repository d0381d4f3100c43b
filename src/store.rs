//! Log Store: owns the append-only log file and the in-memory ordered
//! sequence of entries. Provides load, append, truncate, sync, and lookup.
//!
//! Indexes are dense starting at `base_index` (always 1 in this
//! implementation; there is no snapshotting/compaction yet). Keeping a
//! `base_index` field rather than hard-coding 1 keeps the lookup/truncate
//! arithmetic uniform if compaction is ever added.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use log::{debug, info};

use crate::codec;
use crate::entry::{Entry, Index, Record, Term};
use crate::error::{Error, Result};

pub struct LogStore {
    #[allow(dead_code)]
    path: PathBuf,
    file: File,
    entries: Vec<Record>,
    current_size: u64,
    base_index: Index,
}

impl LogStore {
    /// Opens the log file at `path` for append (creating it with 0644
    /// permissions if absent), takes an exclusive advisory lock on it, then
    /// replays every well-formed frame into memory. A read handle is opened
    /// transiently for the replay and closed before this returns.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut open_options = OpenOptions::new();
        open_options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open_options.mode(0o644);
        }
        let file = open_options.open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(Error::LockHeld);
        }

        let mut entries = Vec::new();
        let mut current_size = 0u64;
        {
            let read_handle = File::open(&path)?;
            let mut reader = BufReader::new(read_handle);
            loop {
                match codec::decode(&mut reader)? {
                    None => break,
                    Some((entry, frame_len)) => {
                        let position = current_size;
                        current_size += frame_len;
                        entries.push(Record { entry, position });
                    }
                }
            }
            // read_handle drops here, closing the transient read fd.
        }

        info!(
            "loaded log {:?}: {} entries, {} bytes",
            path,
            entries.len(),
            current_size
        );
        Ok(Self { path, file, entries, current_size, base_index: 1 })
    }

    /// Encodes `entry`, writes it to the file, and updates the in-memory
    /// index. Does not fsync. On a short write, the file is truncated back to
    /// its pre-write length and no in-memory state is touched.
    pub fn append(&mut self, entry: Entry) -> Result<Index> {
        assert_eq!(
            entry.index,
            self.last_index() + 1,
            "append index {} is not contiguous with last index {}",
            entry.index,
            self.last_index()
        );
        assert!(
            entry.term >= self.last_term(),
            "append term {} regresses from {}",
            entry.term,
            self.last_term()
        );

        let frame = codec::encode(&entry);
        let position = self.current_size;
        let written = self.file.write(&frame)?;
        if written != frame.len() {
            self.file.set_len(position)?;
            return Err(Error::ShortWrite { expected: frame.len(), actual: written });
        }

        self.current_size += frame.len() as u64;
        let index = entry.index;
        debug!("append: index={index} term={} position={position}", entry.term);
        self.entries.push(Record { entry, position });
        Ok(index)
    }

    /// If `index > last_index()`, a no-op. Otherwise truncates the file to
    /// the byte offset at which `index`'s frame begins, and discards that
    /// record and every later one from memory. Idempotent.
    pub fn truncate(&mut self, index: Index) -> Result<()> {
        if index > self.last_index() {
            return Ok(());
        }
        assert!(index >= self.base_index, "truncate index {index} precedes base index {}", self.base_index);

        let slot = (index - self.base_index) as usize;
        let position = self.entries[slot].position;
        debug!("truncate: index={index} position={position}");
        self.file.set_len(position)?;
        self.current_size = position;
        self.entries.truncate(slot);
        Ok(())
    }

    /// Flushes the file to durable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().map_err(Error::SyncFailed)
    }

    /// Returns the entry at `index`, if present.
    pub fn lookup(&self, index: Index) -> Option<&Entry> {
        if index < self.base_index || index > self.last_index() {
            return None;
        }
        Some(&self.entries[(index - self.base_index) as usize].entry)
    }

    /// Returns `(last_index, last_term)`, or `(0, 0)` if the log is empty.
    pub fn last_index(&self) -> Index {
        self.entries.last().map(|r| r.entry.index).unwrap_or(0)
    }

    pub fn last_term(&self) -> Term {
        self.entries.last().map(|r| r.entry.term).unwrap_or(0)
    }

    /// Returns the term of the entry at `index`, or 0 if absent.
    pub fn term_at(&self, index: Index) -> Term {
        self.lookup(index).map(|e| e.term).unwrap_or(0)
    }

    /// Current size of the log file in bytes (sum of encoded record sizes).
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Number of entries currently held in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
