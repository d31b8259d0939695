//! Owned, reference-counted byte buffers.
//!
//! `bytes::Bytes` already gives us exactly the contract spec.md asks
//! for a [`Buffer`]: a single underlying allocation, cheap reference
//! counted clones, and zero-copy slicing. Release happens implicitly
//! when the last clone drops -- there is no explicit `close()` to
//! forget to call, which is how we guarantee "released on every
//! terminal path" without a manual bookkeeping pass.

use bytes::{Bytes, BytesMut};

/// An owned, reference-counted, immutable byte region handed between
/// pipeline stages.
pub type Buffer = Bytes;

/// A mutable, growable byte region used while a [`ChunkedReader`] is
/// accumulating a chunk; frozen into a [`Buffer`] once full.
///
/// [`ChunkedReader`]: crate::chunked_reader::ChunkedReader
pub type BufferBuilder = BytesMut;

/// Tracks outstanding buffers allocated by a single reader, so tests
/// can assert "every allocated buffer is released exactly once"
/// (spec.md §8) without relying on process-wide allocator hooks. Real
/// backends only need the plain `Bytes`/`BytesMut` types above; this
/// counter is opt-in instrumentation threaded through by callers that
/// want the invariant checked.
#[derive(Debug, Default)]
pub struct BufferAccounting {
    allocated: std::sync::atomic::AtomicU64,
    released: std::sync::atomic::AtomicU64,
}

impl BufferAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allocated(&self) {
        self.allocated.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn record_released(&self) {
        self.released.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn outstanding(&self) -> i64 {
        let allocated = self.allocated.load(std::sync::atomic::Ordering::SeqCst) as i64;
        let released = self.released.load(std::sync::atomic::Ordering::SeqCst) as i64;
        allocated - released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_accounting_tracks_outstanding() {
        let acct = BufferAccounting::new();
        acct.record_allocated();
        acct.record_allocated();
        assert_eq!(acct.outstanding(), 2);
        acct.record_released();
        assert_eq!(acct.outstanding(), 1);
        acct.record_released();
        assert_eq!(acct.outstanding(), 0);
    }

    #[test]
    fn buffer_slicing_is_zero_copy_and_shares_refcount() {
        let original = Buffer::from(vec![1u8, 2, 3, 4, 5]);
        let slice = original.slice(1..3);
        assert_eq!(&slice[..], &[2, 3]);
    }
}
