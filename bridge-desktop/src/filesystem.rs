//! File-Backed Timeshift Store
//!
//! Mirrors every ingested byte into a single buffer file. The file holds one
//! write handle and one read handle so the ingest worker and the consumer
//! never fight over a shared cursor.

use bridge_traits::{
    error::{BridgeError, Result},
    storage::{BackingStore, BackingStoreProvider},
    stream::RecordedSource,
};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Buffer file with independent append and read cursors.
pub struct FileBackingStore {
    path: PathBuf,
    writer: Mutex<File>,
    reader: Mutex<File>,
}

impl FileBackingStore {
    /// Create (or truncate) the buffer file at `path` and open both handles.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let writer = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Self::map_io_error(&path, e))?;
        let reader = File::open(&path).map_err(|e| Self::map_io_error(&path, e))?;

        debug!(path = ?path, "Opened timeshift buffer file");
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    /// Location of the buffer file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently persisted.
    pub fn len(&self) -> Result<u64> {
        let writer = self.writer.lock();
        let metadata = writer
            .metadata()
            .map_err(|e| Self::map_io_error(&self.path, e))?;
        Ok(metadata.len())
    }

    /// Returns `true` if nothing has been persisted yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("{}: {}", path.display(), e))
    }
}

impl BackingStore for FileBackingStore {
    fn append(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut writer = self.writer.lock();
        writer
            .write_all(data)
            .map_err(|e| Self::map_io_error(&self.path, e))?;
        Ok(data.len())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut reader = self.reader.lock();
        reader
            .read(buf)
            .map_err(|e| Self::map_io_error(&self.path, e))
    }

    fn seek(&self, pos: u64) -> Result<u64> {
        let mut reader = self.reader.lock();
        reader
            .seek(SeekFrom::Start(pos))
            .map_err(|e| Self::map_io_error(&self.path, e))
    }

    fn position(&self) -> Result<u64> {
        let mut reader = self.reader.lock();
        reader
            .stream_position()
            .map_err(|e| Self::map_io_error(&self.path, e))
    }

    fn truncate(&self) -> Result<()> {
        {
            let mut writer = self.writer.lock();
            writer
                .set_len(0)
                .map_err(|e| Self::map_io_error(&self.path, e))?;
            writer
                .seek(SeekFrom::Start(0))
                .map_err(|e| Self::map_io_error(&self.path, e))?;
        }
        self.reader
            .lock()
            .seek(SeekFrom::Start(0))
            .map_err(|e| Self::map_io_error(&self.path, e))?;

        debug!(path = ?self.path, "Truncated timeshift buffer file");
        Ok(())
    }
}

impl Drop for FileBackingStore {
    fn drop(&mut self) {
        if let Err(e) = self.truncate() {
            warn!(path = ?self.path, error = %e, "Failed to truncate timeshift buffer file");
        }
    }
}

/// Opens [`FileBackingStore`]s inside a buffer directory.
#[derive(Debug, Clone)]
pub struct FileStoreProvider {
    dir: PathBuf,
}

impl FileStoreProvider {
    /// Provider rooted at the platform cache directory.
    pub fn new() -> Self {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("timeshift-core");
        Self { dir }
    }

    /// Provider rooted at a caller-chosen directory.
    pub fn with_directory(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory that holds the buffer files.
    pub fn directory(&self) -> &Path {
        &self.dir
    }
}

impl Default for FileStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStoreProvider for FileStoreProvider {
    fn is_available(&self) -> bool {
        fs::metadata(&self.dir).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn open_store(&self, file_name: &str) -> Result<Box<dyn BackingStore>> {
        if !self.is_available() {
            return Err(BridgeError::NotAvailable(format!(
                "Timeshift buffer directory {} does not exist",
                self.dir.display()
            )));
        }
        let store = FileBackingStore::create(self.dir.join(file_name))?;
        Ok(Box::new(store))
    }
}

/// Recording stored as a local file.
pub struct FileRecording {
    path: PathBuf,
    file: Option<File>,
}

impl FileRecording {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }
}

impl RecordedSource for FileRecording {
    fn open(&mut self) -> Result<u64> {
        let file = File::open(&self.path).map_err(|e| FileBackingStore::map_io_error(&self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| FileBackingStore::map_io_error(&self.path, e))?
            .len();

        debug!(path = ?self.path, len, "Opened recording");
        self.file = Some(file);
        Ok(len)
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        let Some(file) = self.file.as_mut() else {
            return Err(BridgeError::NotAvailable(format!(
                "Recording {} not opened",
                self.path.display()
            )));
        };

        file.seek(SeekFrom::Start(pos))
            .and_then(|_| file.read(buf))
            .map_err(|e| FileBackingStore::map_io_error(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackingStore::create(dir.path().join("tsbuffer.ts")).unwrap();

        assert_eq!(store.append(b"hello ").unwrap(), 6);
        assert_eq!(store.append(b"world").unwrap(), 5);
        assert_eq!(store.len().unwrap(), 11);

        let mut buf = [0u8; 11];
        let read = store.read(&mut buf).unwrap();
        assert_eq!(read, 11);
        assert_eq!(&buf, b"hello world");
        assert_eq!(store.position().unwrap(), 11);
    }

    #[test]
    fn test_read_cursor_is_independent_of_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackingStore::create(dir.path().join("tsbuffer.ts")).unwrap();

        store.append(b"0123456789").unwrap();
        let mut buf = [0u8; 4];
        store.read_at(3, &mut buf).unwrap();
        assert_eq!(&buf, b"3456");

        store.append(b"abcdef").unwrap();
        assert_eq!(store.position().unwrap(), 7);

        let mut rest = [0u8; 9];
        let read = store.read(&mut rest).unwrap();
        assert_eq!(read, 9);
        assert_eq!(&rest, b"789abcdef");
    }

    #[test]
    fn test_read_past_end_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackingStore::create(dir.path().join("tsbuffer.ts")).unwrap();
        store.append(b"abc").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(store.read_at(3, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_truncate_resets_both_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackingStore::create(dir.path().join("tsbuffer.ts")).unwrap();

        store.append(b"stale bytes").unwrap();
        let mut buf = [0u8; 5];
        store.read(&mut buf).unwrap();

        store.truncate().unwrap();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.position().unwrap(), 0);

        store.append(b"fresh").unwrap();
        let read = store.read(&mut buf).unwrap();
        assert_eq!(read, 5);
        assert_eq!(&buf, b"fresh");
    }

    #[test]
    fn test_drop_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsbuffer.ts");

        {
            let store = FileBackingStore::create(&path).unwrap();
            store.append(&[7u8; 1024]).unwrap();
        }

        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_create_discards_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsbuffer.ts");
        fs::write(&path, b"left over from last run").unwrap();

        let store = FileBackingStore::create(&path).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_provider_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileStoreProvider::with_directory(dir.path().join("missing"));

        assert!(!missing.is_available());
        assert!(matches!(
            missing.open_store("tsbuffer.ts"),
            Err(BridgeError::NotAvailable(_))
        ));

        let provider = FileStoreProvider::with_directory(dir.path());
        assert!(provider.is_available());
        let store = provider.open_store("tsbuffer.ts").unwrap();
        assert_eq!(store.append(b"x").unwrap(), 1);
        assert!(dir.path().join("tsbuffer.ts").exists());
    }

    #[test]
    fn test_recording_reads_at_any_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.ts");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut recording = FileRecording::new(&path);
        let mut buf = [0u8; 4];
        assert!(matches!(
            recording.read_at(0, &mut buf),
            Err(BridgeError::NotAvailable(_))
        ));

        assert_eq!(recording.open().unwrap(), 10);
        assert_eq!(recording.read_at(6, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"6789");
        assert_eq!(recording.read_at(2, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"2345");
        assert_eq!(recording.read_at(10, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_missing_recording_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut recording = FileRecording::new(dir.path().join("gone.ts"));
        assert!(recording.open().is_err());
    }
}
