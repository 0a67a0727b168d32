//! Owned I/O buffers.
//!
//! Every byte region handed to the kernel is an `IoBuf`: a heap allocation
//! with a fixed address that is released when the `IoBuf` is dropped.
//! An operation record owns its buffers through `IoVecs`, which also owns
//! the `iovec` array the vectored read/write points at.
//!
//! `HeapBuffers` is the allocator. It counts live and total allocations
//! in a shared `BufferStats` so tests (and the shutdown summary) can see
//! that every buffer was released exactly once.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Allocation counters shared by all buffers of one `HeapBuffers`.
#[derive(Debug, Default)]
pub struct BufferStats {
    in_use: AtomicUsize,
    total: AtomicUsize,
}

impl BufferStats {
    /// Buffers allocated and not yet dropped.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Buffers ever allocated.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}

/// Heap buffer allocator.
///
/// Cheap to clone; clones share the same counters.
#[derive(Debug, Clone)]
pub struct HeapBuffers {
    /// Capacity of buffers returned by `zeroed()`.
    default_size: usize,
    stats: Arc<BufferStats>,
}

impl HeapBuffers {
    pub fn new(default_size: usize) -> Self {
        Self {
            default_size,
            stats: Arc::new(BufferStats::default()),
        }
    }

    /// A zero-filled buffer of the default size (used for reads).
    pub fn zeroed(&self) -> IoBuf {
        self.wrap(vec![0u8; self.default_size].into_boxed_slice())
    }

    /// An independent heap copy of `bytes` (used for response frames).
    pub fn copy_from(&self, bytes: &[u8]) -> IoBuf {
        self.wrap(Box::from(bytes))
    }

    pub fn default_size(&self) -> usize {
        self.default_size
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    fn wrap(&self, data: Box<[u8]>) -> IoBuf {
        self.stats.in_use.fetch_add(1, Ordering::Relaxed);
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        IoBuf {
            data,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl Default for HeapBuffers {
    fn default() -> Self {
        Self::new(8192)
    }
}

/// One heap buffer. Its address never changes for its whole lifetime.
pub struct IoBuf {
    data: Box<[u8]>,
    stats: Arc<BufferStats>,
}

impl Deref for IoBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for IoBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for IoBuf {
    fn drop(&mut self) {
        self.stats.in_use.fetch_sub(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for IoBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBuf").field("len", &self.data.len()).finish()
    }
}

/// Ordered buffer list plus the `iovec` array describing it.
///
/// The `iovec` array is boxed and built once, from buffers whose heap
/// addresses are stable, so moving an `IoVecs` never invalidates the
/// pointers the kernel holds.
pub struct IoVecs {
    bufs: Vec<IoBuf>,
    iov: Box<[libc::iovec]>,
}

// Safety: the raw pointers in `iov` point into `bufs`, which this value owns.
unsafe impl Send for IoVecs {}

impl IoVecs {
    pub fn new(mut bufs: Vec<IoBuf>) -> Self {
        let iov = bufs
            .iter_mut()
            .map(|b| libc::iovec {
                iov_base: b.data.as_mut_ptr().cast(),
                iov_len: b.data.len(),
            })
            .collect();
        Self { bufs, iov }
    }

    pub fn as_ptr(&self) -> *const libc::iovec {
        self.iov.as_ptr()
    }

    /// Number of buffers (the `iovcnt` of the vectored call).
    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    /// Sum of all buffer lengths.
    pub fn total_bytes(&self) -> usize {
        self.bufs.iter().map(|b| b.len()).sum()
    }

    pub fn get(&self, idx: usize) -> Option<&IoBuf> {
        self.bufs.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut IoBuf> {
        self.bufs.get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IoBuf> {
        self.bufs.iter()
    }
}

impl fmt::Debug for IoVecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoVecs")
            .field("count", &self.bufs.len())
            .field("bytes", &self.total_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_releases_exactly_once() {
        let heap = HeapBuffers::new(16);
        let a = heap.zeroed();
        let b = heap.copy_from(b"abc");
        assert_eq!(heap.stats().in_use(), 2);
        drop(a);
        assert_eq!(heap.stats().in_use(), 1);
        drop(b);
        assert_eq!(heap.stats().in_use(), 0);
        assert_eq!(heap.stats().total(), 2);
    }

    #[test]
    fn clones_share_counters() {
        let heap = HeapBuffers::new(4);
        let other = heap.clone();
        let _buf = other.zeroed();
        assert_eq!(heap.stats().in_use(), 1);
    }

    #[test]
    fn zeroed_has_default_size() {
        let heap = HeapBuffers::new(32);
        let buf = heap.zeroed();
        assert_eq!(buf.len(), 32);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn iovecs_point_at_owned_buffers() {
        let heap = HeapBuffers::new(4);
        let first = heap.copy_from(b"hello ");
        let second = heap.copy_from(b"world");
        let first_ptr = first.as_ptr();

        let vecs = IoVecs::new(vec![first, second]);
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs.total_bytes(), 11);
        let joined: Vec<u8> = vecs.iter().flat_map(|b| b.iter().copied()).collect();
        assert_eq!(joined, b"hello world");

        // Moving the list must not move the buffers.
        let moved = vecs;
        let iov = unsafe { std::slice::from_raw_parts(moved.as_ptr(), moved.len()) };
        assert_eq!(iov[0].iov_base as *const u8, first_ptr);
        assert_eq!(iov[0].iov_len, 6);
        assert_eq!(iov[1].iov_len, 5);

        drop(moved);
        assert_eq!(heap.stats().in_use(), 0);
    }

    #[test]
    fn writes_through_get_mut_are_visible() {
        let heap = HeapBuffers::new(4);
        let mut vecs = IoVecs::new(vec![heap.zeroed()]);
        if let Some(buf) = vecs.get_mut(0) {
            buf[0] = b'x';
        }
        assert_eq!(vecs.get(0).map(|b| b[0]), Some(b'x'));
    }
}
