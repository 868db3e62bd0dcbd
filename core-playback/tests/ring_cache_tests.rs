//! Concurrency and window tests for the ring cache.

use core_playback::{CacheError, RingCache};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn write_all(cache: &RingCache, data: &[u8]) -> usize {
    let mut offset = 0;
    let mut calls = 0;
    while offset < data.len() {
        let written = cache.write(&data[offset..]).unwrap();
        assert!(written > 0);
        offset += written;
        calls += 1;
    }
    calls
}

#[test]
fn test_repeated_short_writes_absorb_whole_request() {
    let cache = RingCache::new(16);
    cache.open().unwrap();

    let mut total = 0u64;
    for len in [3usize, 13, 7, 16, 1, 29, 5] {
        let data = vec![len as u8; len];
        write_all(&cache, &data);
        total += len as u64;

        let range = cache.cached_range();
        assert_eq!(range.end, total);
        assert!(range.start <= range.end);
        assert!(range.end - range.start <= 16);
    }
}

#[test]
fn test_window_invariant_holds_while_filling() {
    let cache = RingCache::new(32);
    cache.open().unwrap();

    for i in 0..200u64 {
        let data = vec![i as u8; (i % 11 + 1) as usize];
        write_all(&cache, &data);

        let range = cache.cached_range();
        assert!(range.start <= range.end);
        assert!(range.end - range.start <= 32);
    }
}

#[test]
fn test_evicted_read_fails_for_any_length() {
    let cache = RingCache::new(16);
    cache.open().unwrap();
    write_all(&cache, &[9u8; 40]);

    for len in [0usize, 1, 4, 16] {
        let mut buf = vec![0u8; len];
        assert!(matches!(
            cache.read(23, &mut buf),
            Err(CacheError::Evicted { position: 23, begin: 24 })
        ));
    }
}

#[test]
fn test_readers_observe_monotonic_end() {
    let cache = Arc::new(RingCache::new(256).with_poll_interval(Duration::from_millis(2)));
    cache.open().unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4u64)
        .map(|id| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_end = 0u64;
                let mut pos = id * 7;
                while !done.load(Ordering::Acquire) {
                    let avail = cache.wait_for_data(pos, 32, Duration::from_millis(20));
                    let end = cache.cached_data_end_pos();
                    assert!(end >= last_end, "end went backwards");
                    assert!(avail == 0 || pos + avail <= end);
                    last_end = end;
                    pos = end;
                }
                last_end
            })
        })
        .collect();

    let chunk = [0xabu8; 24];
    for _ in 0..500 {
        write_all(&cache, &chunk);
        thread::yield_now();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        let seen = reader.join().unwrap();
        assert!(seen <= 500 * 24);
    }
    assert_eq!(cache.cached_data_end_pos(), 500 * 24);
}

#[test]
fn test_seek_waits_for_producer_within_slack() {
    let cache = Arc::new(
        RingCache::new(16)
            .with_seek_slack(100_000, Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(5)),
    );
    cache.open().unwrap();

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for _ in 0..10 {
                thread::sleep(Duration::from_millis(5));
                write_all(&cache, &[1u8; 8]);
            }
        })
    };

    assert_eq!(cache.seek(50), Ok(50));
    writer.join().unwrap();
    assert_eq!(cache.cached_range(), 64..80);
}
