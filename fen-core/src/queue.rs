//! Lock-free single-producer / single-consumer ring buffer
//!
//! The only structure that crosses a thread boundary in this system.
//! Three instances exist at runtime: feed → pipeline (ticks), pipeline →
//! transport (orders), pipeline → telemetry (snapshots).
//!
//! ## Design
//!
//! - Capacity is a power of two so the index wrap is a bitwise AND.
//! - Producer and consumer indices live on separate cache lines, and
//!   both are separated from the storage array, eliminating false
//!   sharing between the two threads.
//! - The producer writes the slot, then publishes with a release store;
//!   the consumer acquires the producer index before reading the slot.
//! - One slot is reserved to distinguish full from empty, so the usable
//!   capacity is `N - 1`.
//!
//! The queue is **not** safe for multiple producers or consumers: at
//! most one thread may call [`SpscQueue::push`] and at most one (other)
//! thread may call [`SpscQueue::pop`] / [`SpscQueue::peek`].

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A producer or consumer index padded out to its own cache line.
#[repr(C, align(64))]
struct PaddedIndex {
    value: AtomicUsize,
}

impl PaddedIndex {
    const fn new() -> Self {
        Self {
            value: AtomicUsize::new(0),
        }
    }
}

/// Bounded SPSC ring of `Copy` values.
///
/// `N` must be a power of two; this is enforced at compile time.
#[repr(C)]
pub struct SpscQueue<T: Copy, const N: usize> {
    /// Consumer index (head). Only the consumer stores to it.
    head: PaddedIndex,
    /// Producer index (tail). Only the producer stores to it.
    tail: PaddedIndex,
    /// Value storage; slots between head and tail are initialized.
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
}

// Values cross threads by copy; the head/tail protocol guarantees a slot
// is never read and written concurrently.
unsafe impl<T: Copy + Send, const N: usize> Sync for SpscQueue<T, N> {}
unsafe impl<T: Copy + Send, const N: usize> Send for SpscQueue<T, N> {}

impl<T: Copy, const N: usize> SpscQueue<T, N> {
    const CAPACITY_IS_POWER_OF_TWO: () = assert!(
        N.is_power_of_two() && N >= 2,
        "SpscQueue capacity must be a power of two"
    );

    /// Create an empty queue. All slots are allocated up front; nothing
    /// allocates after construction.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::CAPACITY_IS_POWER_OF_TWO;
        Self {
            head: PaddedIndex::new(),
            tail: PaddedIndex::new(),
            // MaybeUninit<T> needs no initialization.
            buffer: unsafe { MaybeUninit::uninit().assume_init() },
        }
    }

    #[inline(always)]
    const fn wrap(index: usize) -> usize {
        (index + 1) & (N - 1)
    }

    /// Producer side. Returns `false` when the ring is full; the caller
    /// decides whether that is an error (feed, orders) or an acceptable
    /// loss (telemetry).
    #[inline(always)]
    pub fn push(&self, item: T) -> bool {
        let tail = self.tail.value.load(Ordering::Relaxed);
        let next = Self::wrap(tail);

        if next == self.head.value.load(Ordering::Acquire) {
            return false;
        }

        unsafe {
            (*self.buffer[tail].get()).write(item);
        }

        self.tail.value.store(next, Ordering::Release);
        true
    }

    /// Consumer side. Returns `None` when the ring is empty.
    #[inline(always)]
    pub fn pop(&self) -> Option<T> {
        let head = self.head.value.load(Ordering::Relaxed);

        if head == self.tail.value.load(Ordering::Acquire) {
            return None;
        }

        let item = unsafe { (*self.buffer[head].get()).assume_init_read() };

        self.head.value.store(Self::wrap(head), Ordering::Release);
        Some(item)
    }

    /// Read the next value without consuming it (consumer side only).
    #[inline(always)]
    pub fn peek(&self) -> Option<T> {
        let head = self.head.value.load(Ordering::Relaxed);

        if head == self.tail.value.load(Ordering::Acquire) {
            return None;
        }

        Some(unsafe { (*self.buffer[head].get()).assume_init_read() })
    }

    /// True when no values are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.value.load(Ordering::Acquire) == self.tail.value.load(Ordering::Acquire)
    }

    /// Number of queued values. Racy across threads, exact from either
    /// endpoint's own perspective.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.value.load(Ordering::Acquire);
        let tail = self.tail.value.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            N - head + tail
        }
    }

    /// Usable capacity (one slot is reserved).
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<T: Copy, const N: usize> Default for SpscQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_pop_roundtrip() {
        let q: SpscQueue<u64, 8> = SpscQueue::new();
        assert!(q.is_empty());
        assert!(q.push(42));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(42));
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_capacity_reserves_one_slot() {
        let q: SpscQueue<u32, 8> = SpscQueue::new();
        assert_eq!(q.capacity(), 7);

        for i in 0..7 {
            assert!(q.push(i), "push {} should succeed", i);
        }
        // Eighth push must fail: one slot reserved to disambiguate full.
        assert!(!q.push(7));
        assert_eq!(q.len(), 7);
    }

    #[test]
    fn test_fifo_order() {
        let q: SpscQueue<u32, 16> = SpscQueue::new();
        for i in 0..10 {
            assert!(q.push(i));
        }
        for i in 0..10 {
            assert_eq!(q.pop(), Some(i));
        }
    }

    #[test]
    fn test_peek_does_not_consume() {
        let q: SpscQueue<u32, 8> = SpscQueue::new();
        assert!(q.peek().is_none());
        q.push(9);
        assert_eq!(q.peek(), Some(9));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(9));
    }

    #[test]
    fn test_wraparound() {
        let q: SpscQueue<u32, 4> = SpscQueue::new();
        // Cycle through the ring several times its capacity.
        for round in 0..10u32 {
            for i in 0..3 {
                assert!(q.push(round * 3 + i));
            }
            for i in 0..3 {
                assert_eq!(q.pop(), Some(round * 3 + i));
            }
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_index_cache_line_separation() {
        let q: SpscQueue<u64, 8> = SpscQueue::new();
        let head = &q.head as *const _ as usize;
        let tail = &q.tail as *const _ as usize;
        let buffer = q.buffer.as_ptr() as usize;

        assert_eq!(head % 64, 0);
        assert_eq!(tail % 64, 0);
        assert!(tail - head >= 64, "indices share a cache line");
        assert!(buffer - tail >= 64, "storage shares the tail's cache line");
    }

    #[test]
    fn test_concurrent_spsc_preserves_fifo() {
        const COUNT: u64 = 100_000;
        let q: Arc<SpscQueue<u64, 1024>> = Arc::new(SpscQueue::new());

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..COUNT {
                    while !q.push(i) {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                let mut expected = 0u64;
                while expected < COUNT {
                    if let Some(v) = q.pop() {
                        assert_eq!(v, expected, "FIFO order violated");
                        expected += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        producer.join().unwrap();
        consumer.join().unwrap();
        assert!(q.is_empty());
    }
}
