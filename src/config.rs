//! Cache construction settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for a [`CacheStore`](crate::cache::CacheStore).
///
/// All fields are required at construction; cairn assumes no defaults. Every
/// process pointed at the same `root` should use the same timeout and poll
/// settings so lock contention behaves uniformly across participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory under which all entry directories live.
    pub root: PathBuf,

    /// Hard bound on how long a caller waits for an entry lock.
    pub lock_timeout: Duration,

    /// Sleep between lock acquisition attempts.
    pub poll_interval: Duration,

    /// Age after which a lock marker left behind by a crashed holder may be
    /// removed by a waiter. `None` disables stale-lock recovery: an orphaned
    /// marker then blocks the key until it is cleaned up manually.
    pub stale_lock_after: Option<Duration>,
}

impl CacheConfig {
    /// Create a config with stale-lock recovery disabled.
    pub fn new(
        root: impl Into<PathBuf>,
        lock_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            root: root.into(),
            lock_timeout,
            poll_interval,
            stale_lock_after: None,
        }
    }

    /// Enable stale-lock recovery with the given grace period.
    pub fn with_stale_lock_after(mut self, grace: Duration) -> Self {
        self.stale_lock_after = Some(grace);
        self
    }
}
