//! Lock-free triple buffering for frame publication.
//!
//! Three equal-size buffers rotate between a single producer (a device
//! render loop) and a single consumer (the compositor). Each side owns one
//! slot index outright; the third index sits in a shared atomic. Publishing
//! and acquiring are each a single atomic swap on the shared slot, so the
//! three indices are a permutation of {0, 1, 2} at every instant and
//! neither side ever waits or observes a torn frame.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct TripleBuffer {
    bufs: [UnsafeCell<Box<[u8]>>; 3],
    /// Slot owned by neither side; the only producer/consumer meeting point.
    shared: AtomicUsize,
    /// Producer-owned slot. Only the producer thread touches this.
    write_idx: AtomicUsize,
    /// Consumer-owned slot. Only the consumer thread touches this.
    read_idx: AtomicUsize,
    len: usize,
}

// Safety: the permutation invariant guarantees the producer's write slot and
// the consumer's read slot are always distinct buffers, and each index field
// is only mutated by its owning thread.
unsafe impl Sync for TripleBuffer {}
unsafe impl Send for TripleBuffer {}

impl TripleBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            bufs: [
                UnsafeCell::new(vec![0u8; len].into_boxed_slice()),
                UnsafeCell::new(vec![0u8; len].into_boxed_slice()),
                UnsafeCell::new(vec![0u8; len].into_boxed_slice()),
            ],
            shared: AtomicUsize::new(1),
            write_idx: AtomicUsize::new(0),
            read_idx: AtomicUsize::new(2),
            len,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.len
    }

    /// Producer side: render into the write slot. Must only be called from
    /// the single producer thread.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let idx = self.write_idx.load(Ordering::Relaxed);
        // Safety: `write_idx` is producer-owned and never equals the
        // consumer's `read_idx` (permutation invariant).
        let buf = unsafe { &mut *self.bufs[idx].get() };
        f(buf)
    }

    /// Producer side: hand the freshly rendered write slot to the shared
    /// atomic and adopt whatever slot was there. One atomic swap.
    pub fn publish(&self) {
        let idx = self.write_idx.load(Ordering::Relaxed);
        let prev = self.shared.swap(idx, Ordering::AcqRel);
        self.write_idx.store(prev, Ordering::Relaxed);
    }

    /// Consumer side: adopt the most recently published slot and return its
    /// contents. The returned slice stays untouched by the producer until
    /// the next `acquire` call. Must only be called from the single
    /// consumer thread.
    pub fn acquire(&self) -> &[u8] {
        let idx = self.read_idx.load(Ordering::Relaxed);
        let next = self.shared.swap(idx, Ordering::AcqRel);
        self.read_idx.store(next, Ordering::Relaxed);
        // Safety: `next` is now consumer-owned; the producer can only write
        // to its own slot or adopt the shared one, neither of which is this.
        unsafe { &*self.bufs[next].get() }
    }

    /// Peek at the consumer's current slot without swapping. Used by
    /// `get_frame` callers that want the last acquired frame again.
    pub fn current(&self) -> &[u8] {
        let idx = self.read_idx.load(Ordering::Relaxed);
        // Safety: consumer-owned slot, see `acquire`.
        unsafe { &*self.bufs[idx].get() }
    }

    #[cfg(test)]
    pub(crate) fn indices(&self) -> (usize, usize, usize) {
        (
            self.write_idx.load(Ordering::Relaxed),
            self.shared.load(Ordering::Relaxed),
            self.read_idx.load(Ordering::Relaxed),
        )
    }
}
