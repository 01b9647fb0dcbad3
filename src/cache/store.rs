//! Cache storage and population orchestration.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use super::content::{Consumer, Producer};
use super::entry::{self, EntryState};
use crate::config::CacheConfig;
use crate::error::{CairnError, Result};
use crate::lock::DirLock;

/// Rule governing whether existing valid content is reused or refreshed.
///
/// Chosen per call, never persisted. `No` and `IfFailed` behave identically
/// (both populate unless the entry is valid); they express different caller
/// intent and log the failed-entry retry differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Reuse valid content; populate only when absent or failed.
    No,
    /// Forced refresh: clear and repopulate regardless of prior state.
    Yes,
    /// Like `No`, stated as intent to retry entries a previous attempt left
    /// failed.
    IfFailed,
}

impl FromStr for OverwritePolicy {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no" => Ok(OverwritePolicy::No),
            "yes" => Ok(OverwritePolicy::Yes),
            "if-failed" | "if_failed" => Ok(OverwritePolicy::IfFailed),
            other => Err(CairnError::InvalidPolicy {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverwritePolicy::No => write!(f, "no"),
            OverwritePolicy::Yes => write!(f, "yes"),
            OverwritePolicy::IfFailed => write!(f, "if-failed"),
        }
    }
}

/// Filesystem-backed content cache.
///
/// Each key maps to one entry directory under the cache root. For any key,
/// at most one caller runs its populate-then-consume critical section at a
/// time, coordinated through an on-disk lock that is also visible to other
/// processes using the same root.
pub struct CacheStore {
    config: CacheConfig,
}

impl CacheStore {
    /// Create a store over `config.root`.
    ///
    /// The root directory is created lazily on first use.
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.config.root)?;
        Ok(())
    }

    /// Directory holding content for `key`.
    ///
    /// Keys are hashed so any string maps to a filesystem-safe name; equal
    /// keys always resolve to the same directory, distinct keys never
    /// collide in practice.
    pub fn entry_dir(&self, key: &str) -> PathBuf {
        let hash = Sha256::digest(key.as_bytes());
        self.config.root.join(hex::encode(&hash[..16]))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        Self::lock_path_for(&self.entry_dir(key))
    }

    // The marker sits next to the entry directory, not inside it, so
    // clearing an entry can never delete a held lock.
    fn lock_path_for(entry_dir: &Path) -> PathBuf {
        let mut name = entry_dir.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Populate (per `policy`) and then consume the entry for `key`.
    ///
    /// The whole operation runs under the entry's lock: acquire, classify,
    /// conditionally clear and run `producer`, mark valid, run `consumer`,
    /// release. The lock is released on every exit path; errors from either
    /// callback propagate to the caller wrapped with the key.
    pub fn populate_and_process(
        &self,
        key: &str,
        producer: &impl Producer,
        consumer: &impl Consumer,
        policy: OverwritePolicy,
    ) -> Result<()> {
        self.ensure_root()?;
        let entry_dir = self.entry_dir(key);

        let mut lock = DirLock::acquire(self.lock_path(key), &self.config)?;
        let result = self.run_locked(key, &entry_dir, producer, consumer, policy);
        match result {
            // Surface release faults only on the success path; after a
            // callback error the guard's drop releases best-effort so the
            // original error stays primary.
            Ok(()) => lock.release(),
            Err(err) => Err(err),
        }
    }

    fn run_locked(
        &self,
        key: &str,
        entry_dir: &Path,
        producer: &impl Producer,
        consumer: &impl Consumer,
        policy: OverwritePolicy,
    ) -> Result<()> {
        let state = EntryState::classify(entry_dir);
        let populate = match policy {
            OverwritePolicy::Yes => true,
            OverwritePolicy::No | OverwritePolicy::IfFailed => state.needs_populate(),
        };

        if populate {
            if state == EntryState::Failed && policy == OverwritePolicy::IfFailed {
                warn!("Retrying failed entry '{}'", key);
            }
            debug!(
                "Populating entry '{}' (state: {}, policy: {})",
                key, state, policy
            );
            entry::clear(entry_dir)?;
            producer
                .produce(entry_dir)
                .map_err(|source| CairnError::Producer {
                    key: key.to_string(),
                    source,
                })?;
            entry::mark_valid(entry_dir)?;
        } else {
            debug!("Reusing valid entry '{}'", key);
        }

        consumer
            .consume(entry_dir)
            .map_err(|source| CairnError::Consumer {
                key: key.to_string(),
                source,
            })
    }

    /// Observe the state of `key`'s entry.
    ///
    /// Takes the entry lock briefly so the answer never reflects a
    /// half-finished population.
    pub fn state_of(&self, key: &str) -> Result<EntryState> {
        self.ensure_root()?;
        let entry_dir = self.entry_dir(key);

        let mut lock = DirLock::acquire(self.lock_path(key), &self.config)?;
        let state = EntryState::classify(&entry_dir);
        lock.release()?;
        Ok(state)
    }

    /// Remove one entry under its lock. Returns whether anything existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.ensure_root()?;
        let entry_dir = self.entry_dir(key);

        let mut lock = DirLock::acquire(self.lock_path(key), &self.config)?;
        let removed = entry_dir.exists();
        if removed {
            fs::remove_dir_all(&entry_dir)?;
            debug!("Removed entry '{}'", key);
        }
        lock.release()?;
        Ok(removed)
    }

    /// Remove every entry directory under the root.
    ///
    /// Entries whose lock is currently held elsewhere are skipped and left
    /// for their holder. Returns the number of entries removed.
    pub fn clear_all(&self) -> Result<usize> {
        if !self.config.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.config.root)? {
            let path = dir_entry?.path();
            // Lock markers and stray files are not entries.
            if !path.is_dir() {
                continue;
            }

            let Some(mut lock) = DirLock::try_acquire(Self::lock_path_for(&path))? else {
                debug!("Skipping locked entry at {}", path.display());
                continue;
            };
            fs::remove_dir_all(&path)?;
            lock.release()?;
            removed += 1;
        }
        Ok(removed)
    }
}
