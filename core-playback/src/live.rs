//! Direct live reader: bytes go from the upstream source straight to the
//! player with no buffering, so it cannot seek or rewind.

use crate::error::{PlaybackError, Result};
use crate::traits::StreamReader;
use bridge_traits::{Clock, UpstreamSource};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::sync::Arc;
use tracing::debug;

/// Reads a live stream directly from its [`UpstreamSource`].
pub struct LiveStreamReader {
    source: Mutex<Box<dyn UpstreamSource>>,
    clock: Arc<dyn Clock>,
    consumed: Mutex<u64>,
    started_at: Mutex<DateTime<Utc>>,
}

impl LiveStreamReader {
    pub fn new(source: Box<dyn UpstreamSource>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            source: Mutex::new(source),
            clock,
            consumed: Mutex::new(0),
            started_at: Mutex::new(now),
        }
    }
}

impl StreamReader for LiveStreamReader {
    fn start(&self) -> Result<()> {
        self.source.lock().start()?;
        *self.started_at.lock() = self.clock.now();
        debug!("Live stream started");
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let read = self.source.lock().read_data(buf)?;
        *self.consumed.lock() += read as u64;
        Ok(read)
    }

    fn seek(&self, _pos: SeekFrom) -> Result<u64> {
        Err(PlaybackError::SeekNotSupported)
    }

    fn position(&self) -> u64 {
        *self.consumed.lock()
    }

    fn length(&self) -> u64 {
        *self.consumed.lock()
    }

    fn time_start(&self) -> DateTime<Utc> {
        *self.started_at.lock()
    }

    fn time_end(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn near_end(&self) -> bool {
        true
    }

    fn can_timeshift(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use chrono::TimeZone;
    use mockall::mock;

    mock! {
        Source {}
        impl UpstreamSource for Source {
            fn start(&mut self) -> BridgeResult<()>;
            fn read_data(&mut self, buf: &mut [u8]) -> BridgeResult<usize>;
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()))
    }

    #[test]
    fn test_reads_count_towards_position() {
        let mut source = MockSource::new();
        source.expect_start().times(1).returning(|| Ok(()));
        source.expect_read_data().returning(|buf| {
            buf.fill(7);
            Ok(buf.len())
        });

        let reader = LiveStreamReader::new(Box::new(source), clock());
        reader.start().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 16);
        assert_eq!(reader.read(&mut buf[..4]).unwrap(), 4);
        assert_eq!(reader.position(), 20);
        assert_eq!(reader.length(), 20);
    }

    #[test]
    fn test_live_reader_cannot_seek_or_timeshift() {
        let reader = LiveStreamReader::new(Box::new(MockSource::new()), clock());

        assert!(matches!(
            reader.seek(SeekFrom::Start(0)),
            Err(PlaybackError::SeekNotSupported)
        ));
        assert!(!reader.can_timeshift());
        assert!(reader.near_end());
    }

    #[test]
    fn test_start_failure_propagates() {
        let mut source = MockSource::new();
        source
            .expect_start()
            .returning(|| Err(BridgeError::NotAvailable("tuner busy".to_string())));

        let reader = LiveStreamReader::new(Box::new(source), clock());
        assert!(matches!(
            reader.start(),
            Err(PlaybackError::Bridge(BridgeError::NotAvailable(_)))
        ));
    }

    #[test]
    fn test_time_window_uses_clock() {
        let reader = LiveStreamReader::new(Box::new(MockSource::new()), clock());
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();

        assert_eq!(reader.time_start(), expected);
        assert_eq!(reader.time_end(), expected);
    }
}
