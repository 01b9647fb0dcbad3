//! Cairn - filesystem-backed, concurrency-safe content cache.
//!
//! Cairn maps a string key to a directory of arbitrary files. For each key
//! it guarantees at most one concurrent (re)population, coordinated through
//! an on-disk lock that works across threads and across processes sharing
//! the same filesystem root. Callers choose per call whether existing valid
//! content is reused, forcibly refreshed, or refreshed only after a prior
//! failed attempt.
//!
//! # Modules
//!
//! - [`cache`] - Keyed entry storage, overwrite policies, and orchestration
//! - [`config`] - Cache construction settings
//! - [`error`] - Error types and result alias
//! - [`lock`] - Polling, timeout-bound on-disk directory lock
//!
//! # Example
//!
//! ```
//! use cairn::{CacheConfig, CacheStore, OverwritePolicy};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! fn produce(dir: &Path) -> anyhow::Result<()> {
//!     std::fs::write(dir.join("greeting.txt"), "hello")?;
//!     Ok(())
//! }
//!
//! fn consume(dir: &Path) -> anyhow::Result<()> {
//!     let text = std::fs::read_to_string(dir.join("greeting.txt"))?;
//!     anyhow::ensure!(text == "hello", "unexpected content");
//!     Ok(())
//! }
//!
//! let root = tempfile::tempdir().unwrap();
//! let cache = CacheStore::new(CacheConfig::new(
//!     root.path(),
//!     Duration::from_secs(5),
//!     Duration::from_millis(25),
//! ));
//!
//! // First call populates; a second call with `No` reuses the content
//! // without invoking the producer again.
//! cache
//!     .populate_and_process("greeting", &produce, &consume, OverwritePolicy::No)
//!     .unwrap();
//! cache
//!     .populate_and_process("greeting", &produce, &consume, OverwritePolicy::No)
//!     .unwrap();
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod lock;

pub use cache::{CacheStore, Consumer, EntryState, OverwritePolicy, Producer};
pub use config::CacheConfig;
pub use error::{CairnError, Result};
