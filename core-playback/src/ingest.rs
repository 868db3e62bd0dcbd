//! # Ingest Worker
//!
//! Background thread that pulls fixed-size chunks from an
//! [`UpstreamSource`] and mirrors each one into the backing store and the
//! ring cache.
//!
//! ```text
//! UpstreamSource ──read_data──▶ chunk ──append──▶ BackingStore
//!                                  └────write────▶ RingCache
//! ```
//!
//! ## Cancellation
//!
//! Stopping is cooperative: the token is checked between chunks only, so a
//! blocking upstream read finishes before the thread notices the stop.
//!
//! ## Failures
//!
//! Upstream errors are treated like an empty read and the loop carries on
//! after a short backoff. Cache errors are logged and the chunk is dropped
//! from the cache only.
//!
//! The backing store is addressed by stream position, so a gap in it would
//! shift every later byte. After a failed or short append the store is frozen
//! at its [`StoreExtent`] and only the cache keeps ingesting.

use crate::config::TimeshiftStats;
use crate::error::{PlaybackError, Result};
use crate::ring_cache::RingCache;
use bridge_traits::{BackingStore, UpstreamSource};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Pause after an upstream read that produced nothing.
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(5);

/// Prefix of the stream the backing store holds without gaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreExtent {
    /// Stream bytes `[0, end)` are in the store at their own position.
    pub end: u64,
    /// An append failed or came up short; nothing more is appended.
    pub broken: bool,
}

/// Everything the worker thread writes to.
pub struct IngestTargets {
    pub cache: Arc<RingCache>,
    pub store: Arc<dyn BackingStore>,
    pub extent: Arc<Mutex<StoreExtent>>,
    pub stats: Arc<Mutex<TimeshiftStats>>,
}

/// Handle to a running ingest thread.
pub struct IngestWorker {
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl IngestWorker {
    /// Spawn the worker thread.
    ///
    /// The source is started from inside the new thread.
    pub fn spawn(
        source: Box<dyn UpstreamSource>,
        targets: IngestTargets,
        chunk_size: usize,
    ) -> Result<Self> {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = thread::Builder::new()
            .name("timeshift-ingest".to_string())
            .spawn(move || run(source, targets, chunk_size, token))
            .map_err(|e| PlaybackError::Internal(format!("Failed to spawn ingest thread: {}", e)))?;

        Ok(Self {
            handle: Some(handle),
            cancel_token,
        })
    }

    /// Signal the thread to stop and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.cancel_token.cancel();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Ingest thread panicked");
            }
        }
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut source: Box<dyn UpstreamSource>,
    targets: IngestTargets,
    chunk_size: usize,
    cancel_token: CancellationToken,
) {
    debug!("Timeshift: Thread started");

    if let Err(e) = source.start() {
        warn!(error = %e, "Upstream source failed to start");
    }

    let mut chunk = vec![0u8; chunk_size];
    while !cancel_token.is_cancelled() {
        let read = match source.read_data(&mut chunk) {
            Ok(read) => read,
            Err(e) => {
                debug!(error = %e, "Upstream read failed");
                0
            }
        };

        if read == 0 {
            targets.stats.lock().empty_upstream_reads += 1;
            thread::sleep(EMPTY_READ_BACKOFF);
            continue;
        }

        mirror_chunk(&chunk[..read], &targets);
    }

    debug!("Timeshift: Thread stopped");
}

/// Append one chunk to the store and write all of it to the cache, looping
/// over short writes at the wrap boundary.
fn mirror_chunk(data: &[u8], targets: &IngestTargets) {
    append_to_store(data, targets);

    let mut offset = 0;
    let mut passes = 0u64;
    while offset < data.len() {
        match targets.cache.write(&data[offset..]) {
            Ok(written) => {
                offset += written;
                passes += 1;
            }
            Err(e) => {
                warn!(error = %e, dropped = data.len() - offset, "Cache write failed");
                break;
            }
        }
    }

    if passes > 1 {
        trace!(len = data.len(), passes, "Chunk straddled the cache wrap boundary");
    }

    let mut stats = targets.stats.lock();
    stats.bytes_ingested += data.len() as u64;
    stats.chunks_ingested += 1;
    stats.short_cache_writes += passes.saturating_sub(1);
}

/// Extend the store's gap-free prefix, freezing it on the first failure.
fn append_to_store(data: &[u8], targets: &IngestTargets) {
    let mut extent = targets.extent.lock();
    if extent.broken {
        return;
    }

    match targets.store.append(data) {
        Ok(written) => {
            extent.end += written as u64;
            if written < data.len() {
                extent.broken = true;
                warn!(
                    len = data.len(),
                    written,
                    stored = extent.end,
                    "Short append to backing store; store frozen"
                );
            }
        }
        Err(e) => {
            extent.broken = true;
            warn!(error = %e, stored = extent.end, "Backing store append failed; store frozen");
        }
    }

    if extent.broken {
        targets.stats.lock().store_append_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use std::time::Instant;

    /// In-memory store recording every append.
    #[derive(Default)]
    struct VecStore {
        bytes: Mutex<Vec<u8>>,
    }

    impl BackingStore for VecStore {
        fn append(&self, data: &[u8]) -> BridgeResult<usize> {
            self.bytes.lock().extend_from_slice(data);
            Ok(data.len())
        }

        fn read(&self, _buf: &mut [u8]) -> BridgeResult<usize> {
            Ok(0)
        }

        fn seek(&self, pos: u64) -> BridgeResult<u64> {
            Ok(pos)
        }

        fn position(&self) -> BridgeResult<u64> {
            Ok(0)
        }

        fn truncate(&self) -> BridgeResult<()> {
            self.bytes.lock().clear();
            Ok(())
        }
    }

    /// Store whose appends fail from the `fail_from`-th call on.
    struct FailingStore {
        appends: Mutex<usize>,
        fail_from: usize,
    }

    impl BackingStore for FailingStore {
        fn append(&self, data: &[u8]) -> BridgeResult<usize> {
            let mut appends = self.appends.lock();
            *appends += 1;
            if *appends >= self.fail_from {
                return Err(BridgeError::OperationFailed("disk full".to_string()));
            }
            Ok(data.len())
        }

        fn read(&self, _buf: &mut [u8]) -> BridgeResult<usize> {
            Ok(0)
        }

        fn seek(&self, pos: u64) -> BridgeResult<u64> {
            Ok(pos)
        }

        fn position(&self) -> BridgeResult<u64> {
            Ok(0)
        }

        fn truncate(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    /// Emits a counting byte pattern in reads of `step` bytes, up to `total`.
    struct CountingSource {
        next: u64,
        total: u64,
        step: usize,
    }

    impl UpstreamSource for CountingSource {
        fn start(&mut self) -> BridgeResult<()> {
            Ok(())
        }

        fn read_data(&mut self, buf: &mut [u8]) -> BridgeResult<usize> {
            let remaining = (self.total - self.next) as usize;
            let len = buf.len().min(self.step).min(remaining);
            for byte in &mut buf[..len] {
                *byte = self.next as u8;
                self.next += 1;
            }
            Ok(len)
        }
    }

    fn targets(capacity: usize) -> (IngestTargets, Arc<VecStore>) {
        let cache = Arc::new(RingCache::new(capacity));
        cache.open().unwrap();
        let store = Arc::new(VecStore::default());
        let targets = IngestTargets {
            cache,
            store: store.clone(),
            extent: Arc::new(Mutex::new(StoreExtent::default())),
            stats: Arc::new(Mutex::new(TimeshiftStats::default())),
        };
        (targets, store)
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while !done() && start.elapsed() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_mirror_chunk_loops_over_wrap() {
        let (targets, store) = targets(16);

        mirror_chunk(&[1u8; 10], &targets);
        mirror_chunk(&[2u8; 10], &targets);

        assert_eq!(targets.cache.cached_range(), 4..20);
        assert_eq!(store.bytes.lock().len(), 20);

        let stats = targets.stats.lock().clone();
        assert_eq!(stats.bytes_ingested, 20);
        assert_eq!(stats.chunks_ingested, 2);
        assert_eq!(stats.short_cache_writes, 1);
        assert_eq!(
            *targets.extent.lock(),
            StoreExtent {
                end: 20,
                broken: false
            }
        );
    }

    #[test]
    fn test_failed_append_freezes_store_but_not_cache() {
        let cache = Arc::new(RingCache::new(64));
        cache.open().unwrap();
        let store = Arc::new(FailingStore {
            appends: Mutex::new(0),
            fail_from: 2,
        });
        let targets = IngestTargets {
            cache,
            store: store.clone(),
            extent: Arc::new(Mutex::new(StoreExtent::default())),
            stats: Arc::new(Mutex::new(TimeshiftStats::default())),
        };

        for byte in 0..4u8 {
            mirror_chunk(&[byte; 16], &targets);
        }

        // the third and fourth chunks never reach the store
        assert_eq!(*store.appends.lock(), 2);
        assert_eq!(
            *targets.extent.lock(),
            StoreExtent {
                end: 16,
                broken: true
            }
        );
        assert_eq!(targets.cache.cached_range(), 0..64);

        let stats = targets.stats.lock().clone();
        assert_eq!(stats.bytes_ingested, 64);
        assert_eq!(stats.store_append_failures, 1);
    }

    #[test]
    fn test_worker_mirrors_source_into_both_targets() {
        let (targets, store) = targets(64);
        let cache = targets.cache.clone();
        let stats = targets.stats.clone();

        let source = CountingSource {
            next: 0,
            total: 100,
            step: 7,
        };
        let mut worker = IngestWorker::spawn(Box::new(source), targets, 16).unwrap();

        wait_until(Duration::from_secs(5), || cache.cached_data_end_pos() == 100);
        worker.stop();

        assert_eq!(cache.cached_range(), 36..100);
        let mut tail = [0u8; 4];
        cache.read(96, &mut tail).unwrap();
        assert_eq!(tail, [96, 97, 98, 99]);

        let mirrored = store.bytes.lock().clone();
        assert_eq!(mirrored.len(), 100);
        assert!(mirrored.iter().enumerate().all(|(i, &b)| b == i as u8));

        let stats = stats.lock().clone();
        assert_eq!(stats.bytes_ingested, 100);
        assert!(stats.empty_upstream_reads > 0);
    }

    #[test]
    fn test_exhausted_source_backs_off() {
        let (targets, _store) = targets(16);
        let stats = targets.stats.clone();
        let source = CountingSource {
            next: 0,
            total: 0,
            step: 1,
        };

        let mut worker = IngestWorker::spawn(Box::new(source), targets, 8).unwrap();
        thread::sleep(Duration::from_millis(100));
        worker.stop();

        // about 20 at one read per backoff; a busy loop counts far more
        let empty = stats.lock().empty_upstream_reads;
        assert!(empty > 0);
        assert!(empty < 50, "{} empty reads in 100ms", empty);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (targets, _store) = targets(16);
        let source = CountingSource {
            next: 0,
            total: 0,
            step: 1,
        };

        let mut worker = IngestWorker::spawn(Box::new(source), targets, 8).unwrap();
        worker.stop();
        worker.stop();
        assert!(worker.handle.is_none());
        assert!(worker.cancel_token.is_cancelled());
    }
}
