//! Lock-Free Single-Producer Single-Consumer (SPSC) Ring Buffer
//!
//! Lamport queue with one sentinel cell: a buffer of `N` cells holds at most
//! `N - 1` items, so `head == tail` always means empty and
//! `(tail + 1) & (N - 1) == head` always means full. Both indices are kept
//! modulo `N`.
//!
//! Ordering contract:
//!
//! ```text
//! producer: write cell[tail]  -> Release store tail  ==> consumer: Acquire load tail -> read cell
//! consumer: read cell[head]   -> Release store head  ==> producer: Acquire load head -> reuse cell
//! ```
//!
//! No mutex, no allocation after construction, no blocking. The single
//! producer / single consumer rule is enforced by the types: the buffer
//! itself only offers `&mut self` operations, and [`RingBuffer::split`]
//! hands out exactly one [`Producer`] and one [`Consumer`].

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::error::{QueueEmpty, QueueFull};

/// One cell of the ring, cache-line aligned so neighbouring cells written by
/// the producer and read by the consumer do not share a line.
#[repr(C, align(64))]
struct Slot<T> {
    data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Bounded lock-free SPSC queue with `N` cells (`N - 1` usable).
pub struct RingBuffer<T, const N: usize> {
    // Consumer-owned index
    head: CachePadded<AtomicUsize>,
    // Producer-owned index
    tail: CachePadded<AtomicUsize>,
    buffer: Box<[Slot<T>]>,
}

// SAFETY: cells in [head, tail) are only touched by the consumer, all other
// cells only by the producer. The safe `&self` API reads atomics only; cell
// access through `&self` is confined to the unsafe `push`/`pop`, whose
// callers (`Producer`, `Consumer`, `&mut self` methods) guarantee one thread
// per role.
unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> RingBuffer<T, N> {
    const MASK: usize = {
        assert!(N > 1, "ring buffer needs at least two cells");
        assert!(N.is_power_of_two(), "ring buffer size must be a power of 2");
        N - 1
    };

    /// Create an empty ring buffer. All `N` cells are allocated here and
    /// never again.
    pub fn new() -> Self {
        let _ = Self::MASK;

        // Heap allocation avoids blowing the stack for large N
        let mut buffer = Vec::with_capacity(N);
        for _ in 0..N {
            buffer.push(Slot::new());
        }

        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer: buffer.into_boxed_slice(),
        }
    }

    /// Push from the producer side.
    ///
    /// # Safety
    /// At most one thread may be calling `push` at any time.
    #[inline(always)]
    unsafe fn push(&self, value: T) -> Result<(), QueueFull<T>> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        let next = (tail + 1) & Self::MASK;
        if next == head {
            return Err(QueueFull(value));
        }

        let slot = &self.buffer[tail];

        // SAFETY: `tail` is outside [head, tail), so the consumer does not
        // read this cell until the store below publishes it. Whatever value
        // lived here before was moved out by `pop`, so nothing leaks.
        unsafe {
            (*slot.data.get()).write(value);
        }

        self.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Pop from the consumer side.
    ///
    /// # Safety
    /// At most one thread may be calling `pop` at any time.
    #[inline(always)]
    unsafe fn pop(&self) -> Result<T, QueueEmpty> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return Err(QueueEmpty);
        }

        let slot = &self.buffer[head];

        // SAFETY: the Acquire load of `tail` makes the producer's write of
        // this cell visible; the value is moved out and the cell becomes
        // logically uninitialised again.
        let value = unsafe { (*slot.data.get()).assume_init_read() };

        self.head.store((head + 1) & Self::MASK, Ordering::Release);
        Ok(value)
    }

    /// Enqueue without splitting the buffer. The item is handed back inside
    /// [`QueueFull`] if no cell is free; the queue is left untouched.
    #[inline]
    pub fn enqueue(&mut self, item: T) -> Result<(), QueueFull<T>> {
        // SAFETY: `&mut self` excludes every other caller.
        unsafe { self.push(item) }
    }

    /// Dequeue without splitting the buffer.
    #[inline]
    pub fn dequeue(&mut self) -> Result<T, QueueEmpty> {
        // SAFETY: `&mut self` excludes every other caller.
        unsafe { self.pop() }
    }

    /// Split into the two endpoints for cross-thread use.
    pub fn split(self) -> (Producer<T, N>, Consumer<T, N>) {
        let ring = Arc::new(self);
        (
            Producer {
                ring: Arc::clone(&ring),
            },
            Consumer { ring },
        )
    }

    /// True when no item is queued.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head == tail
    }

    /// True when the next enqueue would fail.
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        ((tail + 1) & Self::MASK) == head
    }

    /// Number of queued items. A snapshot when the other side is running.
    #[inline(always)]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head) & Self::MASK
    }

    /// Maximum number of items held at once (`N - 1`).
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of cells, including the sentinel.
    #[inline(always)]
    pub const fn slots(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Drop for RingBuffer<T, N> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();

        while head != tail {
            // SAFETY: cells in [head, tail) hold initialised values.
            unsafe { self.buffer[head].data.get_mut().assume_init_drop() };
            head = (head + 1) & Self::MASK;
        }
    }
}

/// Producer endpoint. Exactly one exists per split ring.
pub struct Producer<T, const N: usize> {
    ring: Arc<RingBuffer<T, N>>,
}

impl<T, const N: usize> Producer<T, N> {
    /// Non-blocking enqueue. On `Err` the item comes back to the caller.
    #[inline(always)]
    pub fn enqueue(&mut self, item: T) -> Result<(), QueueFull<T>> {
        // SAFETY: `Producer` is not `Clone` and `enqueue` takes `&mut self`.
        unsafe { self.ring.push(item) }
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

/// Consumer endpoint. Exactly one exists per split ring.
pub struct Consumer<T, const N: usize> {
    ring: Arc<RingBuffer<T, N>>,
}

impl<T, const N: usize> Consumer<T, N> {
    /// Non-blocking dequeue.
    #[inline(always)]
    pub fn dequeue(&mut self) -> Result<T, QueueEmpty> {
        // SAFETY: `Consumer` is not `Clone` and `dequeue` takes `&mut self`.
        unsafe { self.ring.pop() }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}
