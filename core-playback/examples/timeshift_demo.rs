//! # Timeshift Session Example
//!
//! Feeds a synthetic live broadcast through a file-backed timeshift session,
//! pauses, rewinds past the ring cache and catches up with the live edge.
//!
//! Run with: `cargo run --example timeshift_demo --package core-playback`

use anyhow::{Context, Result};
use bridge_desktop::FileStoreProvider;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::UpstreamSource;
use core_playback::{LiveSession, TimeshiftConfig};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use core_runtime::{CoreConfig, TimeshiftMode};
use std::io::SeekFrom;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Emits 188-byte transport-stream-sized packets at a steady pace.
struct SyntheticBroadcast {
    packet: u64,
}

impl UpstreamSource for SyntheticBroadcast {
    fn start(&mut self) -> BridgeResult<()> {
        tracing::info!("Synthetic broadcast tuned");
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> BridgeResult<usize> {
        thread::sleep(Duration::from_millis(2));
        let len = buf.len().min(188);
        buf[..len].fill((self.packet % 256) as u8);
        self.packet += 1;
        Ok(len)
    }
}

fn main() -> Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    let dir = tempfile::tempdir().context("creating buffer directory")?;
    let core = CoreConfig::builder()
        .timeshift_mode(TimeshiftMode::OnPause)
        .store_provider(Arc::new(FileStoreProvider::with_directory(dir.path())))
        .build()?;

    // Small cache so the rewind below has to hit the buffer file
    let timeshift = TimeshiftConfig {
        cache_capacity: 16 * 1024,
        chunk_size: 4 * 1024,
        ..Default::default()
    };
    timeshift.validate().map_err(anyhow::Error::msg)?;

    let mut session = LiveSession::new(core, timeshift);
    session.open(Box::new(SyntheticBroadcast { packet: 0 }))?;
    println!("Live, timeshifting: {}", session.is_timeshifting());

    session.pause(true)?;
    println!("Paused, timeshifting: {}", session.is_timeshifting());
    thread::sleep(Duration::from_millis(500));

    let length = session.length().unwrap_or(0);
    println!("Buffered {} bytes while paused", length);

    session.seek(SeekFrom::Start(0))?;
    let mut buf = vec![0u8; 4096];
    let mut total = 0;
    while total < length as usize {
        total += session.read(&mut buf)?;
    }
    println!(
        "Replayed {} bytes, store cursor at {:?}",
        total,
        session.position()
    );

    session.seek(SeekFrom::End(0))?;
    println!("Back at live edge: {}", session.is_real_time());

    session.close();
    Ok(())
}
