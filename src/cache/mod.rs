//! Keyed content caching.
//!
//! This module maps string keys to entry directories under a cache root and
//! orchestrates the populate-then-consume critical section: lock, classify,
//! conditionally (re)populate per the overwrite policy, mark valid, consume.

pub mod content;
pub mod entry;
pub mod store;

pub use content::{Consumer, Producer};
pub use entry::EntryState;
pub use store::{CacheStore, OverwritePolicy};
