//! Producer and consumer capabilities.
//!
//! Content callbacks are single-method traits so callers can pass closures,
//! functions, or their own types interchangeably. The cache owns the entry
//! directory lifecycle and its marker files; callbacks own the files inside
//! the directory and must not touch cairn's markers.

use std::path::Path;

/// Materializes content into an entry directory.
pub trait Producer {
    /// Write content under `dir`.
    ///
    /// Returning an error leaves the entry in a failed, retryable state; the
    /// consumer is never invoked on a failed population.
    fn produce(&self, dir: &Path) -> anyhow::Result<()>;
}

impl<F> Producer for F
where
    F: Fn(&Path) -> anyhow::Result<()>,
{
    fn produce(&self, dir: &Path) -> anyhow::Result<()> {
        self(dir)
    }
}

/// Reads or processes content from a populated entry directory.
pub trait Consumer {
    /// Consume the content under `dir`. Errors propagate to the caller but
    /// do not affect the entry's validity.
    fn consume(&self, dir: &Path) -> anyhow::Result<()>;
}

impl<F> Consumer for F
where
    F: Fn(&Path) -> anyhow::Result<()>,
{
    fn consume(&self, dir: &Path) -> anyhow::Result<()> {
        self(dir)
    }
}
