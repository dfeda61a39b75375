use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::ranking::{RankingEntry, Rankings};

/// Current on-disk record version
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RankingRecord {
    version: u32,
    entries: Vec<RankingEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRankings {
    Versioned(RankingRecord),
    Legacy(Vec<RankingEntry>),
}

/// Decodes a persisted ranking record. Anything unrecognized yields `None`.
pub fn decode(bytes: &[u8]) -> Option<Rankings> {
    match serde_json::from_slice::<StoredRankings>(bytes) {
        Ok(StoredRankings::Versioned(record)) if record.version == RECORD_VERSION => {
            Some(Rankings::from_entries(record.entries))
        }
        Ok(StoredRankings::Versioned(record)) => {
            log::warn!("unsupported ranking record version {}", record.version);
            None
        }
        Ok(StoredRankings::Legacy(entries)) => Some(Rankings::from_entries(entries)),
        Err(e) => {
            log::warn!("unreadable ranking record: {}", e);
            None
        }
    }
}

pub fn encode(rankings: &Rankings) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(&RankingRecord {
        version: RECORD_VERSION,
        entries: rankings.entries().to_vec(),
    })
}

/// Durable home of the leaderboard
pub trait RankingStore {
    /// Never fails: missing or corrupt data loads as an empty leaderboard.
    fn load(&self) -> Rankings;
    fn save(&self, rankings: &Rankings) -> io::Result<()>;
    /// Removing a record that does not exist is not an error.
    fn clear(&self) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileRankingStore {
    path: PathBuf,
}

impl FileRankingStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::rankings_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileRankingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingStore for FileRankingStore {
    fn load(&self) -> Rankings {
        match fs::read(&self.path) {
            Ok(bytes) => decode(&bytes).unwrap_or_else(|| {
                log::warn!("ignoring rankings in {}", self.path.display());
                Rankings::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Rankings::new(),
            Err(e) => {
                log::warn!("cannot read {}: {}", self.path.display(), e);
                Rankings::new()
            }
        }
    }

    fn save(&self, rankings: &Rankings) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = encode(rankings)?;
        fs::write(&self.path, data)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Keeps the encoded record in memory, for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryRankingStore {
    record: RefCell<Option<Vec<u8>>>,
}

impl MemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a raw record, as if read from disk
    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            record: RefCell::new(Some(bytes.into())),
        }
    }

    pub fn raw(&self) -> Option<Vec<u8>> {
        self.record.borrow().clone()
    }
}

impl RankingStore for MemoryRankingStore {
    fn load(&self) -> Rankings {
        self.record
            .borrow()
            .as_deref()
            .and_then(decode)
            .unwrap_or_default()
    }

    fn save(&self, rankings: &Rankings) -> io::Result<()> {
        *self.record.borrow_mut() = Some(encode(rankings)?);
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.record.borrow_mut().take();
        Ok(())
    }
}
