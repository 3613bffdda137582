//! The writer pool
//!
//! [`WriterPool`] owns the shared writer tree and the last-failure cell.
//! Record processing, eviction sweeps and status reads all go through one
//! pool, typically shared as `Arc<WriterPool>`.
//!
//! The tree sits behind a read/write lock. Every mutation (store, eviction,
//! failure purge) happens under the write lock and leaves the tree valid,
//! so readers never observe a half-updated structure. Opening, writing and
//! closing destinations happen outside the tree lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::bucket::{resolve_bucket, BucketKey};
use crate::clock::{Clock, SystemClock};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::metrics::PoolMetrics;
use crate::status::StatusSnapshot;
use crate::writer::{
    writer_file_path, DestinationOpener, LocalFileOpener, TokenGenerator, UuidTokenGenerator, WriterEntry,
    WriterTree,
};

/// Attempts per record when the writer is evicted underneath an append
const MAX_APPEND_ATTEMPTS: usize = 2;

/// The most recent write failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// The message that could not be written
    pub message: String,
    /// The record's own timestamp
    pub timestamp: i64,
    /// Description of the underlying failure
    pub cause: String,
    /// When the failure was recorded
    pub recorded_at: i64,
}

/// Pool of per-bucket writers
pub struct WriterPool {
    config: PoolConfig,
    opener: Arc<dyn DestinationOpener>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    tree: RwLock<WriterTree>,
    last_failure: Mutex<Option<FailureRecord>>,
    metrics: Arc<PoolMetrics>,
}

impl WriterPool {
    /// Create a pool writing to the local filesystem
    pub fn new(config: PoolConfig) -> Result<Self> {
        let opener = Arc::new(LocalFileOpener::new(config.compression));
        Self::with_opener(config, opener)
    }

    /// Create a pool on top of a custom destination opener
    pub fn with_opener(config: PoolConfig, opener: Arc<dyn DestinationOpener>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            opener,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(UuidTokenGenerator),
            tree: RwLock::new(WriterTree::new()),
            last_failure: Mutex::new(None),
            metrics: Arc::new(PoolMetrics::new()),
        })
    }

    /// Use a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different token generator for file names
    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Get the pool's configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get the pool's metrics collector
    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    /// Number of open writers
    pub fn writer_count(&self) -> usize {
        self.tree.read().len()
    }

    /// Copy of the current tree
    pub fn tree_snapshot(&self) -> WriterTree {
        self.tree.read().clone()
    }

    /// The live writer for `key`, if any
    pub fn get(&self, key: &BucketKey) -> Option<WriterEntry> {
        self.tree.read().get(&key.segments()).cloned()
    }

    /// The most recent write failure
    pub fn last_failure(&self) -> Option<FailureRecord> {
        self.last_failure.lock().clone()
    }

    /// Resolve a record timestamp in the configured zone
    pub fn resolve(&self, timestamp: Option<i64>) -> Result<Option<BucketKey>> {
        resolve_bucket(timestamp, self.config.time_zone)
    }

    /// Return the live writer for `key`, or open a new one
    ///
    /// A newly opened writer is not added to the tree; pass it to
    /// [`WriterPool::store`] once it has been used, or close it.
    pub fn lookup_or_create(&self, key: &BucketKey) -> Result<WriterEntry> {
        let existing = self
            .tree
            .read()
            .get(&key.segments())
            .filter(|entry| !entry.is_closed())
            .cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let token = self.tokens.next_token();
        let path = writer_file_path(&self.config.top_level_path, key, self.config.zero_padded, &token);

        let handle = match self.opener.open(&path) {
            Ok(handle) => handle,
            Err(e) => {
                self.metrics.increment_creation_failures();
                warn!(bucket = %key, path = %path, error = %e, "failed to open writer");
                return Err(Error::creation(path, e));
            }
        };

        self.metrics.increment_writers_opened();
        debug!(bucket = %key, path = %path, "opened writer");

        Ok(WriterEntry::new(*key, handle, path, self.clock.now_millis()))
    }

    /// Put `entry` into the tree at its bucket path
    ///
    /// A different writer already stored at that path loses its place and is
    /// closed. Entries whose writer has been retired are refused.
    pub fn store(&self, entry: WriterEntry) -> Result<WriterEntry> {
        let displaced = {
            let mut tree = self.tree.write();
            if entry.is_closed() {
                return Err(Error::writer_closed(entry.file_path.clone()));
            }
            let displaced = tree.insert(entry.clone());
            for old in displaced.iter().filter(|old| !old.same_writer(&entry)) {
                old.retire();
            }
            displaced
        };

        let mut closed = 0;
        for old in displaced.iter().filter(|old| !old.same_writer(&entry)) {
            debug!(path = %old.file_path, replacement = %entry.file_path, "writer replaced");
            if old.close() {
                closed += 1;
            }
        }
        self.metrics.add_writers_closed(closed);

        Ok(entry)
    }

    /// Append one record
    ///
    /// Returns `Ok(None)` when the record has no timestamp. On a write
    /// failure the writer is closed and purged, the failure is recorded and
    /// the error returned; the next record for that bucket opens a fresh
    /// writer.
    pub fn append(&self, timestamp: Option<i64>, message: &str) -> Result<Option<WriterEntry>> {
        let key = match self.resolve(timestamp) {
            Ok(Some(key)) => key,
            Ok(None) => {
                self.metrics.increment_records_skipped();
                debug!("skipping record without timestamp");
                return Ok(None);
            }
            Err(e) => {
                self.metrics.increment_records_rejected();
                warn!(timestamp = ?timestamp, error = %e, "rejecting record");
                return Err(e);
            }
        };
        let timestamp = timestamp.unwrap_or_default();

        let mut attempts = 0;
        loop {
            attempts += 1;
            let entry = self.lookup_or_create(&key)?;

            let start = Instant::now();
            match entry.write_line(message) {
                Ok(()) => {
                    self.metrics.record_line(message.len() + 1, start.elapsed());
                    let touched = entry.touched(self.clock.now_millis());
                    return match self.store(touched.clone()) {
                        Ok(stored) => Ok(Some(stored)),
                        Err(Error::WriterClosed(path)) => {
                            // The line reached the handle before it was evicted
                            debug!(path = %path, "writer evicted during append");
                            Ok(Some(touched))
                        }
                        Err(e) => Err(e),
                    };
                }
                Err(_) if entry.is_closed() && attempts < MAX_APPEND_ATTEMPTS => {
                    debug!(path = %entry.file_path, "writer evicted before append, reopening");
                }
                Err(e) => {
                    self.dispose_failed_writer(&entry, timestamp, message, &e);
                    return Err(e);
                }
            }
        }
    }

    /// Close and purge a writer whose append failed, and record the failure
    fn dispose_failed_writer(&self, entry: &WriterEntry, timestamp: i64, message: &str, err: &Error) {
        let path = entry.key.segments();
        let removed = {
            let mut tree = self.tree.write();
            let stored = tree.get(&path).map_or(false, |live| live.same_writer(entry));
            let removed = if stored { tree.remove_and_prune(&path) } else { Vec::new() };
            entry.retire();
            for other in &removed {
                other.retire();
            }
            removed
        };

        let mut closed = usize::from(entry.close());
        for other in removed.iter().filter(|other| !other.same_writer(entry)) {
            closed += usize::from(other.close());
        }
        self.metrics.add_writers_closed(closed);
        self.metrics.increment_write_failures();

        warn!(path = %entry.file_path, error = %err, "write failed, writer disposed");

        *self.last_failure.lock() = Some(FailureRecord {
            message: message.to_string(),
            timestamp,
            cause: err.to_string(),
            recorded_at: self.clock.now_millis(),
        });
    }

    /// Close every writer for which `predicate(entry, now)` holds
    ///
    /// Each writer is judged against its live state and the clock at the
    /// moment it is examined. Returns the number of writers closed.
    pub fn close_writers<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&WriterEntry, i64) -> bool,
    {
        let start = Instant::now();
        self.metrics.increment_sweeps();

        let candidates = self.tree.read().flatten();
        let mut closed = 0;

        for (path, _) in candidates {
            let taken = {
                let mut tree = self.tree.write();
                let selected = match tree.get(&path) {
                    Some(live) => predicate(live, self.clock.now_millis()),
                    None => false,
                };
                if !selected {
                    continue;
                }
                let taken = tree.remove_and_prune(&path);
                for entry in &taken {
                    entry.retire();
                }
                taken
            };

            for entry in &taken {
                debug!(bucket = %entry.key, path = %entry.file_path, "evicting writer");
                closed += usize::from(entry.close());
            }
        }

        self.metrics.add_writers_closed(closed);
        info!(
            closed,
            remaining = self.writer_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "writer sweep finished"
        );

        closed
    }

    /// Close every writer
    pub fn close_all(&self) -> usize {
        self.close_writers(|_, _| true)
    }

    /// Close writers idle for at least `max_age`
    ///
    /// Ages beyond what an `i64` of milliseconds can hold never expire.
    pub fn close_old_writers(&self, max_age: Duration) -> usize {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        self.close_writers(|entry, now| entry.idle_millis(now) >= max_age_ms)
    }

    /// Close writers idle for at least the configured maximum
    pub fn close_idle_writers(&self) -> usize {
        self.close_old_writers(self.config.max_idle())
    }

    /// Snapshot of the tree and the last failure for monitoring
    pub fn status(&self) -> StatusSnapshot {
        let failure = self.last_failure();
        let tree = self.tree.read();
        StatusSnapshot::capture(&tree, failure.as_ref(), self.config.time_zone, self.metrics.snapshot())
    }
}

impl Drop for WriterPool {
    fn drop(&mut self) {
        if !self.tree.read().is_empty() {
            let closed = self.close_all();
            debug!(closed, "closed remaining writers on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketZone;
    use crate::clock::ManualClock;
    use crate::config::{CompressionAlgorithm, CompressionSettings};
    use crate::testing::RecordingOpener;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::thread;
    use tempfile::tempdir;

    /// Tokens `t0`, `t1`, ... for predictable paths
    #[derive(Default)]
    struct SequentialTokens(AtomicUsize);

    impl TokenGenerator for SequentialTokens {
        fn next_token(&self) -> String {
            format!("t{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    /// Clock that moves forward by `step` every time it is read
    struct SteppingClock {
        millis: AtomicI64,
        step: AtomicI64,
    }

    impl SteppingClock {
        fn new(millis: i64) -> Self {
            Self {
                millis: AtomicI64::new(millis),
                step: AtomicI64::new(0),
            }
        }

        fn set_step(&self, step: i64) {
            self.step.store(step, Ordering::SeqCst);
        }
    }

    impl Clock for SteppingClock {
        fn now_millis(&self) -> i64 {
            let step = self.step.load(Ordering::SeqCst);
            self.millis.fetch_add(step, Ordering::SeqCst) + step
        }
    }

    fn millis(year: i32, month: u32, day: u32, hour: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, hour, 15, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn setup(zero_padded: bool) -> (WriterPool, RecordingOpener, Arc<ManualClock>) {
        let opener = RecordingOpener::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = PoolConfig::new()
            .with_top_level_path("/hist")
            .with_zero_padded(zero_padded)
            .with_time_zone(BucketZone::Utc);
        let pool = WriterPool::with_opener(config, Arc::new(opener.clone()))
            .unwrap()
            .with_clock(clock.clone())
            .with_token_generator(Arc::new(SequentialTokens::default()));
        (pool, opener, clock)
    }

    #[test]
    fn test_append_creates_single_entry() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let ts = millis(2016, 3, 2, 11);

        let first = pool.append(Some(ts), "FOO-BAR")?.unwrap();
        assert_eq!(first.key.segments(), [2016, 3, 2, 11]);
        assert_eq!(first.write_count, 1);
        assert_eq!(first.file_path, "/hist/2016/3/2/11/t0.hist.gz");
        assert_eq!(pool.writer_count(), 1);

        let second = pool.append(Some(ts + 1000), "FOO-BAZ")?.unwrap();
        assert_eq!(second.write_count, 2);
        assert_eq!(second.file_path, first.file_path);
        assert_eq!(pool.writer_count(), 1);
        assert_eq!(opener.opened().len(), 1);

        let stored = pool.get(&first.key).unwrap();
        assert_eq!(stored.write_count, 2);
        assert_eq!(opener.contents(&first.file_path), "FOO-BAR\nFOO-BAZ\n");
        Ok(())
    }

    #[test]
    fn test_lookup_is_idempotent() -> Result<()> {
        let (pool, _, _) = setup(false);
        let key = BucketKey::new(2016, 3, 2, 11)?;

        let created = pool.lookup_or_create(&key)?;
        assert_eq!(created.write_count, 0);
        pool.store(created.clone())?;

        let found = pool.lookup_or_create(&key)?;
        assert_eq!(found.file_path, created.file_path);
        assert!(found.same_writer(&created));
        Ok(())
    }

    #[test]
    fn test_lookup_does_not_store() -> Result<()> {
        let (pool, _, _) = setup(false);
        let key = BucketKey::new(2016, 3, 2, 11)?;

        let created = pool.lookup_or_create(&key)?;
        assert_eq!(pool.writer_count(), 0);
        created.close();
        Ok(())
    }

    #[test]
    fn test_creation_failure_stores_nothing() {
        let (pool, opener, _) = setup(false);
        opener.fail_opens(true);

        let err = pool.append(Some(millis(2016, 3, 2, 11)), "FOO-BAR").unwrap_err();
        assert!(err.is_creation_error());
        assert_eq!(pool.writer_count(), 0);
        assert_eq!(pool.metrics().snapshot().creation_failures, 1);
        assert!(pool.last_failure().is_none());
    }

    #[test]
    fn test_missing_timestamp_is_skipped() -> Result<()> {
        let (pool, opener, _) = setup(false);

        assert!(pool.append(None, "no time")?.is_none());
        assert_eq!(pool.writer_count(), 0);
        assert!(opener.opened().is_empty());
        assert_eq!(pool.metrics().snapshot().records_skipped, 1);
        Ok(())
    }

    #[test]
    fn test_invalid_bucket_is_rejected() {
        let (pool, opener, _) = setup(false);
        let ts = Utc.with_ymd_and_hms(-3, 1, 1, 0, 0, 0).unwrap().timestamp_millis();

        let err = pool.append(Some(ts), "ancient").unwrap_err();
        assert!(err.is_invalid_bucket());
        assert!(opener.opened().is_empty());
        assert_eq!(pool.metrics().snapshot().records_rejected, 1);
    }

    #[test]
    fn test_write_failure_disposes_writer() -> Result<()> {
        let (pool, opener, _) = setup(true);
        let ts = millis(2017, 5, 30, 12);

        let entry = pool.append(Some(ts), "first")?.unwrap();
        assert_eq!(entry.file_path, "/hist/2017/05/30/12/t0.hist.gz");

        opener.fail_writes(&entry.file_path);
        let err = pool.append(Some(ts), "FOO-BAR").unwrap_err();
        assert!(err.is_write_error());

        assert!(pool.get(&entry.key).is_none());
        assert!(pool.tree_snapshot().is_empty());
        assert_eq!(opener.close_count(&entry.file_path), 1);

        let failure = pool.last_failure().unwrap();
        assert_eq!(failure.message, "FOO-BAR");
        assert_eq!(failure.timestamp, ts);
        assert!(failure.cause.contains("backend unreachable"));

        // Sweeping afterwards does not close it again
        pool.close_all();
        assert_eq!(opener.close_count(&entry.file_path), 1);

        // The next record opens a fresh writer
        let fresh = pool.append(Some(ts), "again")?.unwrap();
        assert_ne!(fresh.file_path, entry.file_path);
        assert_eq!(fresh.write_count, 1);
        Ok(())
    }

    #[test]
    fn test_write_failure_isolated_to_bucket() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let healthy = pool.append(Some(millis(2016, 3, 2, 10)), "a")?.unwrap();
        pool.append(Some(millis(2016, 3, 2, 10)), "b")?;
        let failing = pool.append(Some(millis(2016, 3, 2, 11)), "c")?.unwrap();

        opener.fail_writes(&failing.file_path);
        assert!(pool.append(Some(millis(2016, 3, 2, 11)), "d").is_err());

        let survivor = pool.get(&healthy.key).unwrap();
        assert_eq!(survivor.write_count, 2);
        assert!(!survivor.is_closed());
        assert_eq!(pool.writer_count(), 1);
        assert_eq!(opener.close_count(&healthy.file_path), 0);
        Ok(())
    }

    #[test]
    fn test_close_old_writers() -> Result<()> {
        let (pool, opener, clock) = setup(false);
        let stale = pool.append(Some(millis(2016, 3, 2, 10)), "old")?.unwrap();

        clock.advance(60_000);
        let fresh = pool.append(Some(millis(2016, 3, 2, 11)), "new")?.unwrap();

        clock.advance(1_000);
        let closed = pool.close_old_writers(Duration::from_secs(60));
        assert_eq!(closed, 1);

        assert!(pool.get(&stale.key).is_none());
        assert!(pool.get(&fresh.key).is_some());
        assert_eq!(opener.close_count(&stale.file_path), 1);
        assert_eq!(opener.close_count(&fresh.file_path), 0);
        Ok(())
    }

    #[test]
    fn test_close_idle_writers_uses_config() -> Result<()> {
        let (pool, _, clock) = setup(false);
        pool.append(Some(millis(2016, 3, 2, 10)), "old")?;

        clock.advance(pool.config().max_idle_ms as i64 - 1);
        assert_eq!(pool.close_idle_writers(), 0);

        clock.advance(1);
        assert_eq!(pool.close_idle_writers(), 1);
        assert_eq!(pool.writer_count(), 0);
        Ok(())
    }

    #[test]
    fn test_sweep_prunes_empty_branches() -> Result<()> {
        let (pool, _, _) = setup(false);
        pool.append(Some(millis(2016, 3, 2, 10)), "a")?;
        pool.append(Some(millis(2017, 1, 1, 0)), "b")?;

        let closed = pool.close_writers(|entry, _| entry.key.year == 2016);
        assert_eq!(closed, 1);

        let tree = pool.tree_snapshot();
        assert!(tree.node(&[2016]).is_none());
        assert!(tree.get(&[2017, 1, 1, 0]).is_some());
        Ok(())
    }

    #[test]
    fn test_close_failure_does_not_abort_sweep() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let first = pool.append(Some(millis(2016, 3, 2, 10)), "a")?.unwrap();
        let second = pool.append(Some(millis(2016, 3, 2, 11)), "b")?.unwrap();
        opener.fail_closes(&first.file_path);

        assert_eq!(pool.close_all(), 2);
        assert_eq!(pool.writer_count(), 0);
        assert_eq!(opener.close_count(&second.file_path), 1);
        Ok(())
    }

    #[test]
    fn test_store_refuses_closed_writer() -> Result<()> {
        let (pool, _, _) = setup(false);
        let entry = pool.lookup_or_create(&BucketKey::new(2016, 3, 2, 11)?)?;
        entry.close();

        let err = pool.store(entry).unwrap_err();
        assert!(matches!(err, Error::WriterClosed(_)));
        assert_eq!(pool.writer_count(), 0);
        Ok(())
    }

    #[test]
    fn test_store_closes_displaced_writer() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let key = BucketKey::new(2016, 3, 2, 11)?;

        // Two creators race for the same bucket
        let first = pool.lookup_or_create(&key)?;
        let second = pool.lookup_or_create(&key)?;
        pool.store(first.clone())?;
        pool.store(second.clone())?;

        assert!(pool.get(&key).unwrap().same_writer(&second));
        assert_eq!(opener.close_count(&first.file_path), 1);
        assert_eq!(opener.close_count(&second.file_path), 0);

        let metrics = pool.metrics().snapshot();
        assert_eq!(metrics.writers_opened, 2);
        assert_eq!(metrics.writers_closed, 1);
        assert_eq!(metrics.open_writers(), 1);
        Ok(())
    }

    #[test]
    fn test_append_reopens_evicted_writer() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let ts = millis(2016, 3, 2, 11);
        let entry = pool.append(Some(ts), "a")?.unwrap();

        // Closed behind the pool's back; the stale tree entry is ignored
        entry.close();

        let next = pool.append(Some(ts), "b")?.unwrap();
        assert_ne!(next.file_path, entry.file_path);
        assert_eq!(next.write_count, 1);
        assert_eq!(opener.contents(&next.file_path), "b\n");
        assert!(pool.get(&entry.key).unwrap().same_writer(&next));
        assert!(pool.last_failure().is_none());

        // The stale writer was already closed, so replacing it closes nothing
        let metrics = pool.metrics().snapshot();
        assert_eq!(metrics.writers_opened, 2);
        assert_eq!(metrics.writers_closed, 0);
        assert_eq!(opener.close_count(&entry.file_path), 1);
        Ok(())
    }

    #[test]
    fn test_sweep_counts_only_writers_it_closed() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let stale = pool.append(Some(millis(2016, 3, 2, 10)), "a")?.unwrap();
        let live = pool.append(Some(millis(2016, 3, 2, 11)), "b")?.unwrap();
        stale.close();

        assert_eq!(pool.close_all(), 1);
        assert_eq!(pool.writer_count(), 0);
        assert_eq!(opener.close_count(&stale.file_path), 1);
        assert_eq!(opener.close_count(&live.file_path), 1);
        assert_eq!(pool.metrics().snapshot().writers_closed, 1);
        Ok(())
    }

    #[test]
    fn test_huge_max_age_never_expires() -> Result<()> {
        let (pool, _, clock) = setup(false);
        pool.append(Some(millis(2016, 3, 2, 10)), "a")?;
        clock.advance(1_000);

        assert_eq!(pool.close_old_writers(Duration::MAX), 0);
        assert_eq!(pool.close_old_writers(Duration::from_millis(u64::MAX)), 0);
        assert_eq!(pool.writer_count(), 1);
        Ok(())
    }

    #[test]
    fn test_sweep_reads_clock_per_writer() -> Result<()> {
        let clock = Arc::new(SteppingClock::new(1_000_000));
        let opener = RecordingOpener::new();
        let config = PoolConfig::new()
            .with_top_level_path("/hist")
            .with_time_zone(BucketZone::Utc);
        let pool = WriterPool::with_opener(config, Arc::new(opener))?
            .with_clock(clock.clone())
            .with_token_generator(Arc::new(SequentialTokens::default()));

        let earlier = pool.append(Some(millis(2016, 3, 2, 10)), "a")?.unwrap();
        let later = pool.append(Some(millis(2016, 3, 2, 11)), "b")?.unwrap();
        assert_eq!(earlier.last_access, later.last_access);

        // Each reading moves 30 s on: the first writer is judged 30 s idle,
        // the second 60 s idle
        clock.set_step(30_000);
        let mut seen = Vec::new();
        let closed = pool.close_writers(|entry, now| {
            seen.push(now);
            entry.idle_millis(now) >= 60_000
        });

        assert_eq!(seen, vec![1_030_000, 1_060_000]);
        assert_eq!(closed, 1);
        assert!(pool.get(&earlier.key).is_some());
        assert!(pool.get(&later.key).is_none());
        Ok(())
    }

    #[test]
    fn test_concurrent_stores_to_different_buckets() -> Result<()> {
        let (pool, _, _) = setup(false);
        let pool = Arc::new(pool);

        let mut handles = Vec::new();
        for hour in 0..8u32 {
            let pool = pool.clone();
            handles.push(thread::spawn(move || -> Result<()> {
                for i in 0..25 {
                    pool.append(Some(millis(2016, 3, 2, hour)), &format!("line {}", i))?;
                }
                Ok(())
            }));
        }
        for handle in handles {
            handle.join().unwrap()?;
        }

        assert_eq!(pool.writer_count(), 8);
        for hour in 0..8u32 {
            let entry = pool.get(&BucketKey::new(2016, 3, 2, hour)?).unwrap();
            assert_eq!(entry.write_count, 25);
        }
        Ok(())
    }

    #[test]
    fn test_status_reports_tree_and_failure() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let ok = pool.append(Some(millis(2016, 3, 2, 10)), "a")?.unwrap();
        assert!(pool.status().is_healthy());
        assert_eq!(pool.status().writer_count, 1);

        opener.fail_writes(&ok.file_path);
        let _ = pool.append(Some(millis(2016, 3, 2, 10)), "b");

        let status = pool.status();
        assert!(!status.is_healthy());
        assert_eq!(status.writer_count, 0);
        assert_eq!(status.last_failure.unwrap().message, "b");
        Ok(())
    }

    #[test]
    fn test_drop_closes_remaining_writers() -> Result<()> {
        let (pool, opener, _) = setup(false);
        let entry = pool.append(Some(millis(2016, 3, 2, 10)), "a")?.unwrap();

        drop(pool);
        assert_eq!(opener.close_count(&entry.file_path), 1);
        Ok(())
    }

    #[test]
    fn test_local_files_end_to_end() -> Result<()> {
        let temp_dir = tempdir()?;
        let top = temp_dir.path().to_str().unwrap().to_string();
        let config = PoolConfig::new()
            .with_top_level_path(top.clone())
            .with_zero_padded(true)
            .with_time_zone(BucketZone::Utc)
            .with_compression(CompressionSettings::new(CompressionAlgorithm::None, 0));
        let pool = WriterPool::new(config)?;

        let entry = pool.append(Some(millis(2017, 5, 30, 12)), "FOO-BAR")?.unwrap();
        assert!(entry.file_path.starts_with(&format!("{}/2017/05/30/12/", top)));
        assert!(entry.file_path.ends_with(".hist.gz"));

        assert_eq!(pool.close_all(), 1);
        assert_eq!(std::fs::read_to_string(&entry.file_path)?, "FOO-BAR\n");
        Ok(())
    }

    proptest! {
        #[test]
        fn sweep_partitions_by_idle_time(ages in proptest::collection::vec(0i64..120_000, 1..24)) {
            let (pool, _, clock) = setup(false);
            let now = 10_000_000;
            let max_age = 60_000;

            for (hour, age) in ages.iter().enumerate() {
                clock.set(now - age);
                pool.append(Some(millis(2016, 3, 2, hour as u32)), "x").unwrap();
            }
            clock.set(now);

            let expected_closed = ages.iter().filter(|age| **age >= max_age).count();
            let closed = pool.close_old_writers(Duration::from_millis(max_age as u64));
            prop_assert_eq!(closed, expected_closed);

            for (hour, age) in ages.iter().enumerate() {
                let present = pool.get(&BucketKey::new(2016, 3, 2, hour as u32).unwrap()).is_some();
                prop_assert_eq!(present, *age < max_age);
            }
        }
    }
}
