//! Fixed-size byte arena backing the ring cache.
//!
//! Allocation is fallible and reported as [`CacheError::Allocation`]; the
//! memory is released when the arena is dropped, whichever path drops it.

use crate::error::CacheError;

pub(crate) struct ByteArena {
    bytes: Box<[u8]>,
}

impl ByteArena {
    /// Allocate `len` zeroed bytes.
    pub(crate) fn acquire(len: usize) -> Result<Self, CacheError> {
        if len == 0 {
            return Err(CacheError::Allocation { capacity: len });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| CacheError::Allocation { capacity: len })?;
        bytes.resize(len, 0);

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Copy `data` into the arena starting at `slot`. The range must not wrap.
    pub(crate) fn copy_in(&mut self, slot: usize, data: &[u8]) {
        self.bytes[slot..slot + data.len()].copy_from_slice(data);
    }

    /// Fill `buf` from the arena starting at `slot`. The range must not wrap.
    pub(crate) fn copy_out(&self, slot: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.bytes[slot..slot + buf.len()]);
    }
}
