//! Entry state classification and the completion marker.
//!
//! An entry is trusted only through its completion marker: a cache-owned
//! file written after a population fully succeeded. Content files are opaque
//! to cairn, so a directory with content but no marker is a failed or
//! interrupted attempt, never a valid entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Name of the cache-owned completion marker inside an entry directory.
///
/// Private to cairn; producers must not write a file with this name.
pub(crate) const COMPLETION_MARKER: &str = ".cairn-ok";

/// Payload stored in the completion marker.
#[derive(Debug, Serialize, Deserialize)]
struct CompletionStamp {
    completed_at: DateTime<Utc>,
}

/// Observed state of one cache entry directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Directory missing, or present and empty (never populated).
    Absent,
    /// Completion marker present; the last population fully succeeded.
    Valid,
    /// Directory has content from an attempt that never completed.
    Failed,
}

impl EntryState {
    /// Inspect `entry_dir` without side effects.
    ///
    /// Callers must hold the entry lock so the snapshot is consistent.
    pub fn classify(entry_dir: &Path) -> EntryState {
        if !entry_dir.is_dir() {
            return EntryState::Absent;
        }
        if entry_dir.join(COMPLETION_MARKER).is_file() {
            return EntryState::Valid;
        }
        // No marker: an empty directory was created but never written, while
        // leftover files mean a population attempt died midway.
        match fs::read_dir(entry_dir) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    EntryState::Failed
                } else {
                    EntryState::Absent
                }
            }
            Err(_) => EntryState::Absent,
        }
    }

    /// Whether this state calls for a population under `No`/`IfFailed`.
    pub fn needs_populate(&self) -> bool {
        !matches!(self, EntryState::Valid)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Absent => write!(f, "absent"),
            EntryState::Valid => write!(f, "valid"),
            EntryState::Failed => write!(f, "failed"),
        }
    }
}

/// Write the completion marker, flushing it to disk before returning.
///
/// Called only after the producer finished. Until this runs, the entry
/// classifies as failed and stays eligible for retry.
pub(crate) fn mark_valid(entry_dir: &Path) -> Result<()> {
    let stamp = CompletionStamp {
        completed_at: Utc::now(),
    };
    let payload = serde_json::to_vec(&stamp).map_err(anyhow::Error::new)?;

    let mut file = fs::File::create(entry_dir.join(COMPLETION_MARKER))?;
    file.write_all(&payload)?;
    file.sync_all()?;
    Ok(())
}

/// Remove all content (marker included) and recreate the directory empty,
/// giving the next population a clean slate.
pub(crate) fn clear(entry_dir: &Path) -> Result<()> {
    if entry_dir.exists() {
        fs::remove_dir_all(entry_dir)?;
    }
    fs::create_dir_all(entry_dir)?;
    Ok(())
}
