//! Backing Store Abstractions
//!
//! The backing store is the unbounded, on-disk mirror of everything the ring
//! cache may evict. It shares the cache's coordinate space: byte `n` of the
//! store is absolute stream position `n`.

use crate::error::Result;

/// Sequential append/read store addressed by absolute position.
///
/// Implementations keep independent write and read cursors and manage their
/// own interior mutability, so one thread can append while another reads.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::BackingStore;
///
/// fn mirror(store: &dyn BackingStore, chunk: &[u8]) -> Result<()> {
///     let written = store.append(chunk)?;
///     debug_assert_eq!(written, chunk.len());
///     Ok(())
/// }
/// ```
pub trait BackingStore: Send + Sync {
    /// Append `data` at the write cursor, returning the bytes written.
    fn append(&self, data: &[u8]) -> Result<usize>;

    /// Read at the read cursor, advancing it by the returned count.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Move the read cursor to absolute position `pos`.
    ///
    /// Returns the new cursor position.
    fn seek(&self, pos: u64) -> Result<u64>;

    /// Current read cursor.
    fn position(&self) -> Result<u64>;

    /// Discard all stored bytes and rewind both cursors.
    fn truncate(&self) -> Result<()>;

    /// Position the read cursor at `pos` and read from there.
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        self.seek(pos)?;
        self.read(buf)
    }
}

/// Opens backing stores for timeshift sessions.
pub trait BackingStoreProvider: Send + Sync {
    /// Whether the configured buffer location exists and can hold a store.
    fn is_available(&self) -> bool;

    /// Open a fresh, empty store named `file_name` inside the buffer location.
    ///
    /// Any bytes left behind by a previous session are discarded.
    fn open_store(&self, file_name: &str) -> Result<Box<dyn BackingStore>>;
}
