//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::UpstreamSource;
use std::thread;
use std::time::{Duration, Instant};

/// Byte expected at absolute position `pos` of a [`PatternSource`] stream.
pub fn pattern_byte(pos: u64) -> u8 {
    (pos % 251) as u8
}

/// Live source emitting a deterministic byte pattern.
///
/// Each read returns at most `step` bytes; after `total` bytes it behaves like
/// a stalled live stream and returns 0.
pub struct PatternSource {
    next: u64,
    total: u64,
    step: usize,
    delay: Duration,
}

impl PatternSource {
    pub fn new(total: u64, step: usize) -> Self {
        Self {
            next: 0,
            total,
            step,
            delay: Duration::ZERO,
        }
    }

    /// Sleep before every non-empty read, like a real broadcast.
    pub fn paced(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl UpstreamSource for PatternSource {
    fn start(&mut self) -> BridgeResult<()> {
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> BridgeResult<usize> {
        let remaining = self.total - self.next;
        if remaining == 0 {
            thread::sleep(Duration::from_millis(1));
            return Ok(0);
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let len = buf.len().min(self.step).min(remaining as usize);
        for byte in &mut buf[..len] {
            *byte = pattern_byte(self.next);
            self.next += 1;
        }
        Ok(len)
    }
}

/// Poll `done` until it holds or `deadline` passes; returns the final value.
pub fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if done() {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
