//! On-disk directory locking.
//!
//! A [`DirLock`] grants exclusive access to one cache entry by atomically
//! creating a lock marker file next to the entry directory. Exclusive file
//! creation (`create_new`) is the mutual-exclusion primitive, so the lock
//! works across threads and across processes that share the filesystem.
//!
//! Acquisition polls: on contention the caller sleeps for the configured
//! poll interval and retries until the hard timeout elapses. Release deletes
//! the marker and is idempotent; dropping the guard also releases, so a
//! panicking critical section cannot leak the lock.
//!
//! There is no fairness between waiters. Any waiter may win the race when
//! the marker disappears; the timeout bounds how long a loser waits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{CairnError, Result};

/// Advisory owner identity stored inside a lock marker.
///
/// The marker's existence is what excludes other holders; the payload is
/// only read for diagnostics and stale-lock recovery. A marker with an
/// unreadable payload still locks.
#[derive(Debug, Serialize, Deserialize)]
struct LockOwner {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Exclusive lock over one entry directory.
///
/// Obtained via [`DirLock::acquire`] or [`DirLock::try_acquire`]; released
/// explicitly with [`DirLock::release`] or implicitly on drop.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    held: bool,
}

impl DirLock {
    /// Acquire the lock at `path`, polling until `config.lock_timeout`.
    ///
    /// Fails with [`CairnError::LockTimeout`] once the cumulative wait
    /// exceeds the timeout; the bound on total wall-clock wait is
    /// `lock_timeout + poll_interval`. Any filesystem fault other than the
    /// marker already existing is fatal for the call.
    pub fn acquire(path: impl Into<PathBuf>, config: &CacheConfig) -> Result<DirLock> {
        let path = path.into();
        let started = Instant::now();

        loop {
            match Self::attempt(&path)? {
                Some(lock) => return Ok(lock),
                None => {
                    if let Some(grace) = config.stale_lock_after {
                        if Self::remove_if_stale(&path, grace)? {
                            continue;
                        }
                    }

                    let waited = started.elapsed();
                    if waited >= config.lock_timeout {
                        debug!("Gave up on lock {} after {:?}", path.display(), waited);
                        return Err(CairnError::LockTimeout { path, waited });
                    }
                    let remaining = config.lock_timeout - waited;
                    thread::sleep(config.poll_interval.min(remaining));
                }
            }
        }
    }

    /// Single acquisition attempt with no polling.
    ///
    /// Returns `None` when the lock is currently held by someone else.
    pub fn try_acquire(path: impl Into<PathBuf>) -> Result<Option<DirLock>> {
        Self::attempt(&path.into())
    }

    fn attempt(path: &Path) -> Result<Option<DirLock>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => {
                Self::write_owner(file);
                debug!("Acquired lock {}", path.display());
                Ok(Some(DirLock {
                    path: path.to_path_buf(),
                    held: true,
                }))
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(CairnError::Io(err)),
        }
    }

    fn write_owner(mut file: File) {
        let owner = LockOwner {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        if let Ok(payload) = serde_json::to_vec(&owner) {
            let _ = file.write_all(&payload);
        }
    }

    /// Remove a marker whose holder is gone.
    ///
    /// A marker is considered abandoned when it is older than `grace`, or
    /// when its recorded pid provably no longer runs. Returns `true` when
    /// the marker was removed (or vanished on its own) and acquisition
    /// should be retried immediately. Racing the holder's own release is
    /// harmless: removal is idempotent and the next `create_new` winner
    /// holds the lock.
    fn remove_if_stale(path: &Path, grace: Duration) -> Result<bool> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(CairnError::Io(err)),
        };

        let age = meta.modified().ok().and_then(|time| time.elapsed().ok());
        let owner: Option<LockOwner> = fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok());

        let mut expired = age.map(|age| age > grace).unwrap_or(false);
        if age.is_none() {
            // Some filesystems report unusable mtimes; fall back to the
            // timestamp the holder recorded in the payload.
            if let Some(owner) = &owner {
                let held_for = Utc::now().signed_duration_since(owner.acquired_at);
                expired = held_for.to_std().map(|d| d > grace).unwrap_or(false);
            }
        }

        let holder_dead = owner
            .as_ref()
            .and_then(|owner| pid_is_alive(owner.pid))
            .map(|alive| !alive)
            .unwrap_or(false);

        if !expired && !holder_dead {
            return Ok(false);
        }

        warn!(
            "Removing stale lock {} (expired: {}, holder dead: {})",
            path.display(),
            expired,
            holder_dead
        );
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(true),
            Err(err) => Err(CairnError::Io(err)),
        }
    }

    /// Release the lock by deleting its marker.
    ///
    /// Idempotent: releasing twice, or after the marker was already removed,
    /// is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Released lock {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CairnError::Io(err)),
        }
    }

    /// Path of the lock marker.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if self.held {
            if let Err(err) = self.release() {
                warn!("Failed to remove lock {}: {}", self.path.display(), err);
            }
        }
    }
}

/// Probe whether `pid` refers to a running process.
///
/// `None` when the answer cannot be determined (non-unix platforms, or pids
/// outside the probe's range).
#[cfg(unix)]
fn pid_is_alive(pid: u32) -> Option<bool> {
    // kill(0, ...) signals the current process group.
    if pid == 0 || pid > i32::MAX as u32 {
        return None;
    }

    // SAFETY: signal 0 performs error checking without delivering a signal.
    let result = unsafe { libc::kill(pid as i32, 0) };
    if result == 0 {
        return Some(true);
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(code) if code == libc::ESRCH => Some(false),
        Some(code) if code == libc::EPERM => Some(true),
        _ => None,
    }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> Option<bool> {
    None
}
