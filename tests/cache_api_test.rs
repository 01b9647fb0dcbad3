//! Integration tests for the public cache API.

use cairn::{CacheConfig, CacheStore, CairnError, EntryState, OverwritePolicy};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

fn test_config(root: &Path) -> CacheConfig {
    CacheConfig::new(root, Duration::from_secs(5), Duration::from_millis(20))
}

fn write_lines(n: usize) -> impl Fn(&Path) -> anyhow::Result<()> {
    move |dir: &Path| {
        let lines: Vec<String> = (0..n).map(|i| format!("line {i}")).collect();
        fs::write(dir.join("lines.txt"), lines.join("\n") + "\n")?;
        Ok(())
    }
}

fn assert_line_count(n: usize) -> impl Fn(&Path) -> anyhow::Result<()> {
    move |dir: &Path| {
        let text = fs::read_to_string(dir.join("lines.txt"))?;
        let count = text.lines().count();
        anyhow::ensure!(count == n, "expected {n} lines, found {count}");
        Ok(())
    }
}

fn noop(_dir: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[test]
fn public_api_is_accessible() {
    // Verify types are exported correctly
    let _config = test_config(Path::new("/tmp/cairn"));
    let _policy = OverwritePolicy::IfFailed;
    let _state = EntryState::Absent;
}

#[test]
fn end_to_end_cache_lifecycle() {
    let temp = TempDir::new().unwrap();
    let cache = CacheStore::new(test_config(temp.path()));

    // Empty root: populate 10 lines, consumer reads back exactly 10.
    cache
        .populate_and_process("42", &write_lines(10), &assert_line_count(10), OverwritePolicy::No)
        .unwrap();

    // Valid entry + `No`: the producer must not run again.
    let must_not_run = |_dir: &Path| -> anyhow::Result<()> {
        anyhow::bail!("producer invoked despite valid entry")
    };
    cache
        .populate_and_process("42", &must_not_run, &assert_line_count(10), OverwritePolicy::No)
        .unwrap();

    // Forced refresh replaces the content wholesale.
    cache
        .populate_and_process("42", &write_lines(5), &assert_line_count(5), OverwritePolicy::Yes)
        .unwrap();
}

#[test]
fn if_failed_retries_then_settles() {
    let temp = TempDir::new().unwrap();
    let cache = CacheStore::new(test_config(temp.path()));

    // First attempt dies mid-write.
    let failing = |dir: &Path| -> anyhow::Result<()> {
        fs::write(dir.join("lines.txt"), "line 0\n")?;
        anyhow::bail!("interrupted")
    };
    let err = cache
        .populate_and_process("report", &failing, &noop, OverwritePolicy::No)
        .unwrap_err();
    assert!(matches!(err, CairnError::Producer { .. }));
    assert_eq!(cache.state_of("report").unwrap(), EntryState::Failed);

    // `IfFailed` retries the failed entry and succeeds.
    cache
        .populate_and_process(
            "report",
            &write_lines(3),
            &assert_line_count(3),
            OverwritePolicy::IfFailed,
        )
        .unwrap();
    assert_eq!(cache.state_of("report").unwrap(), EntryState::Valid);

    // Subsequent `No` and `IfFailed` calls skip the producer.
    let runs = AtomicUsize::new(0);
    let counting = |_dir: &Path| -> anyhow::Result<()> {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };
    cache
        .populate_and_process("report", &counting, &noop, OverwritePolicy::No)
        .unwrap();
    cache
        .populate_and_process("report", &counting, &noop, OverwritePolicy::IfFailed)
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn retry_starts_from_clean_directory() {
    let temp = TempDir::new().unwrap();
    let cache = CacheStore::new(test_config(temp.path()));

    let failing = |dir: &Path| -> anyhow::Result<()> {
        fs::write(dir.join("leftover.tmp"), "junk")?;
        anyhow::bail!("interrupted")
    };
    let _ = cache
        .populate_and_process("k", &failing, &noop, OverwritePolicy::No)
        .unwrap_err();

    // The retry's producer must not see the previous attempt's files.
    let checking = |dir: &Path| -> anyhow::Result<()> {
        anyhow::ensure!(
            !dir.join("leftover.tmp").exists(),
            "stale file survived into retry"
        );
        fs::write(dir.join("fresh.txt"), "data")?;
        Ok(())
    };
    cache
        .populate_and_process("k", &checking, &noop, OverwritePolicy::IfFailed)
        .unwrap();
}

#[test]
fn second_store_instance_reuses_entries() {
    let temp = TempDir::new().unwrap();

    let first = CacheStore::new(test_config(temp.path()));
    first
        .populate_and_process("shared", &write_lines(4), &noop, OverwritePolicy::No)
        .unwrap();

    // A separate instance over the same root (as a second process would be)
    // sees the valid entry and skips population.
    let second = CacheStore::new(test_config(temp.path()));
    let must_not_run = |_dir: &Path| -> anyhow::Result<()> {
        anyhow::bail!("producer invoked despite valid entry")
    };
    second
        .populate_and_process("shared", &must_not_run, &assert_line_count(4), OverwritePolicy::No)
        .unwrap();
}

#[test]
fn consumer_failure_leaves_content_reusable() {
    let temp = TempDir::new().unwrap();
    let cache = CacheStore::new(test_config(temp.path()));

    let picky = |_dir: &Path| -> anyhow::Result<()> { anyhow::bail!("not what I wanted") };
    let err = cache
        .populate_and_process("k", &write_lines(2), &picky, OverwritePolicy::No)
        .unwrap_err();
    assert!(matches!(err, CairnError::Consumer { .. }));

    // Population already succeeded; the next call reuses it.
    let must_not_run = |_dir: &Path| -> anyhow::Result<()> {
        anyhow::bail!("producer invoked despite valid entry")
    };
    cache
        .populate_and_process("k", &must_not_run, &assert_line_count(2), OverwritePolicy::No)
        .unwrap();
}

#[test]
fn policy_parsing_is_strict() {
    assert!("no".parse::<OverwritePolicy>().is_ok());
    assert!("yes".parse::<OverwritePolicy>().is_ok());
    assert!("if-failed".parse::<OverwritePolicy>().is_ok());

    let err = "always".parse::<OverwritePolicy>().unwrap_err();
    assert!(matches!(err, CairnError::InvalidPolicy { .. }));
}

#[test]
fn no_lock_markers_survive_a_full_run() {
    let temp = TempDir::new().unwrap();
    let cache = CacheStore::new(test_config(temp.path()));

    cache
        .populate_and_process("a", &write_lines(1), &noop, OverwritePolicy::No)
        .unwrap();
    let failing = |_dir: &Path| -> anyhow::Result<()> { anyhow::bail!("boom") };
    let _ = cache
        .populate_and_process("b", &failing, &noop, OverwritePolicy::No)
        .unwrap_err();

    let leftovers: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "lock"))
        .collect();
    assert!(leftovers.is_empty(), "dangling lock markers: {leftovers:?}");
}

#[test]
fn remove_and_repopulate() {
    let temp = TempDir::new().unwrap();
    let cache = CacheStore::new(test_config(temp.path()));

    cache
        .populate_and_process("k", &write_lines(2), &noop, OverwritePolicy::No)
        .unwrap();
    assert!(cache.remove("k").unwrap());
    assert_eq!(cache.state_of("k").unwrap(), EntryState::Absent);

    // Removed entries repopulate under `No`.
    cache
        .populate_and_process("k", &write_lines(6), &assert_line_count(6), OverwritePolicy::No)
        .unwrap();
}
