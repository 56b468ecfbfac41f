use std::fmt;
use std::ptr::NonNull;

use super::slot::SlotStorage;
use crate::error::{FreeError, PoolExhausted};

/// Fixed-capacity slot allocator for up to `N` values of `T`.
///
/// # Overview
/// One region for `N` slots is reserved at construction and never resized.
/// Values are moved into free slots by [`alloc`](Self::alloc) and dropped in
/// place by [`free`](Self::free); the global allocator is never touched on
/// either path.
///
/// Free slots are found with a chunked occupancy bitmap plus a cached
/// `free_index` hint:
/// - allocation writes at the hint, then scans forward one 64-slot chunk at
///   a time (wrapping) for the next clear bit;
/// - freeing a slot while the pool is full turns that slot into the hint, so
///   the following allocation is O(1).
///
/// # Safety
/// Returned pointers stay valid until the slot is freed or the pool is
/// dropped. Dereferencing them is `unsafe` and is the caller's business.
/// The pool is `Send` but not `Sync`: share it behind a lock.
pub struct FixedPool<T, const N: usize> {
    storage: SlotStorage<T>,
    /// Slot guaranteed to be free, `None` when the pool is full.
    free_index: Option<usize>,
}

impl<T, const N: usize> Default for FixedPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> FixedPool<T, N> {
    const CAPACITY: usize = {
        assert!(N > 0, "pool capacity must be > 0");
        N
    };

    pub fn new() -> Self {
        Self {
            storage: SlotStorage::with_capacity(Self::CAPACITY),
            free_index: Some(0),
        }
    }

    /// Move `value` into a free slot.
    ///
    /// When the pool is exhausted the value is dropped and
    /// [`PoolExhausted`] is returned; use [`alloc_with`](Self::alloc_with)
    /// to avoid building a value that cannot be placed.
    #[inline]
    pub fn alloc(&mut self, value: T) -> Result<NonNull<T>, PoolExhausted> {
        self.alloc_with(move || value)
    }

    /// Construct a value in a free slot. `init` only runs when a slot is
    /// available.
    pub fn alloc_with<F>(&mut self, init: F) -> Result<NonNull<T>, PoolExhausted>
    where
        F: FnOnce() -> T,
    {
        let idx = self.free_index.ok_or(PoolExhausted {
            capacity: Self::CAPACITY,
        })?;

        let ptr = self.storage.insert(idx, init());
        self.free_index = self.storage.first_free(idx);
        Ok(ptr)
    }

    /// Drop the value at `ptr` and release its slot.
    ///
    /// Null, foreign, misaligned and already-freed pointers are rejected
    /// with a distinct [`FreeError`] and leave the pool untouched.
    pub fn free(&mut self, ptr: *mut T) -> Result<(), FreeError> {
        let value = self.take(ptr)?;
        drop(value);
        Ok(())
    }

    /// Move the value at `ptr` out of the pool and release its slot.
    pub fn take(&mut self, ptr: *mut T) -> Result<T, FreeError> {
        let index = self.storage.index_of(ptr)?;
        let value = self
            .storage
            .remove(index)
            .ok_or(FreeError::NotAllocated { index })?;

        if self.free_index.is_none() {
            self.free_index = Some(index);
        }
        Ok(value)
    }

    /// Slot index of a live pointer.
    pub fn slot_index(&self, ptr: *const T) -> Result<usize, FreeError> {
        self.storage.index_of(ptr)
    }

    /// True when `ptr` is the start of a live slot of this pool.
    pub fn contains(&self, ptr: *const T) -> bool {
        self.storage.index_of(ptr).is_ok()
    }

    /// Pointer to the value in slot `index`, if it is live.
    pub fn ptr_at(&self, index: usize) -> Option<NonNull<T>> {
        self.storage.ptr_at(index)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.storage.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.storage.get_mut(index)
    }

    /// Number of live values.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.free_index.is_none()
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> fmt::Debug for FixedPool<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool")
            .field("capacity", &N)
            .field("len", &self.len())
            .field("free_index", &self.free_index)
            .finish()
    }
}
