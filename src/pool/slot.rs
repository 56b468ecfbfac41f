use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};

use super::bitmap::OccupancyBitmap;
use crate::error::FreeError;

/// Reserved, aligned region of `capacity` slots for `T` plus the bitmap that
/// says which slots hold a live value.
///
/// Both pools are built on this type. It owns the raw region and drops every
/// live value exactly once when it goes away.
///
/// # Safety
/// Slots are addressed through the base pointer only; no reference to the
/// whole region is ever formed, so pointers handed out for one slot stay
/// valid while other slots are written (until the region is reallocated by
/// [`SlotStorage::grow`]).
pub(crate) struct SlotStorage<T> {
    base: NonNull<MaybeUninit<T>>,
    capacity: usize,
    occupancy: OccupancyBitmap,
    live: usize,
}

// SAFETY: the storage uniquely owns its values, like a `Vec<T>`.
unsafe impl<T: Send> Send for SlotStorage<T> {}

impl<T> SlotStorage<T> {
    const SLOT_SIZE: usize = {
        assert!(
            mem::size_of::<T>() != 0,
            "slot pools do not support zero-sized types"
        );
        mem::size_of::<T>()
    };

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let _ = Self::SLOT_SIZE;
        Self {
            base: Self::allocate(capacity),
            capacity,
            occupancy: OccupancyBitmap::new(capacity),
            live: 0,
        }
    }

    fn layout(capacity: usize) -> Layout {
        match Layout::array::<MaybeUninit<T>>(capacity) {
            Ok(layout) => layout,
            Err(_) => panic!("slot region of {capacity} elements overflows isize"),
        }
    }

    fn allocate(capacity: usize) -> NonNull<MaybeUninit<T>> {
        if capacity == 0 {
            return NonNull::dangling();
        }
        let layout = Self::layout(capacity);
        // SAFETY: layout has non-zero size (capacity > 0, T is not a ZST).
        let raw = unsafe { alloc(layout) } as *mut MaybeUninit<T>;
        match NonNull::new(raw) {
            Some(base) => base,
            None => handle_alloc_error(layout),
        }
    }

    /// # Safety
    /// `base` must come from `allocate(capacity)`.
    unsafe fn release(base: NonNull<MaybeUninit<T>>, capacity: usize) {
        if capacity != 0 {
            unsafe { dealloc(base.as_ptr() as *mut u8, Self::layout(capacity)) }
        }
    }

    #[inline(always)]
    fn slot_ptr(&self, idx: usize) -> *mut MaybeUninit<T> {
        debug_assert!(idx < self.capacity);
        // SAFETY: idx < capacity keeps the offset inside the allocation.
        unsafe { self.base.as_ptr().add(idx) }
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    #[inline(always)]
    pub(crate) fn is_occupied(&self, idx: usize) -> bool {
        self.occupancy.is_set(idx)
    }

    /// Next free slot at or after the chunk holding `hint`, wrapping.
    #[inline(always)]
    pub(crate) fn first_free(&self, hint: usize) -> Option<usize> {
        self.occupancy.first_zero_from(hint)
    }

    /// Move `value` into free slot `idx` and mark it live.
    pub(crate) fn insert(&mut self, idx: usize, value: T) -> NonNull<T> {
        assert!(
            idx < self.capacity && !self.occupancy.is_set(idx),
            "slot {idx} is not free"
        );
        let slot = self.slot_ptr(idx);
        // SAFETY: slot is in bounds and holds no live value.
        unsafe { (*slot).write(value) };
        self.occupancy.set(idx);
        self.live += 1;
        // SAFETY: derived from a non-null base pointer.
        unsafe { NonNull::new_unchecked(slot as *mut T) }
    }

    /// Move the value out of slot `idx`, leaving it free.
    pub(crate) fn remove(&mut self, idx: usize) -> Option<T> {
        if !self.occupancy.is_set(idx) {
            return None;
        }
        self.occupancy.clear(idx);
        self.live -= 1;
        // SAFETY: the bit was set, so the slot holds an initialised value,
        // and clearing it above means it will not be read again.
        Some(unsafe { (*self.slot_ptr(idx)).assume_init_read() })
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        if !self.occupancy.is_set(idx) {
            return None;
        }
        // SAFETY: occupied slots hold initialised values.
        Some(unsafe { (*self.slot_ptr(idx)).assume_init_ref() })
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        if !self.occupancy.is_set(idx) {
            return None;
        }
        // SAFETY: occupied, and `&mut self` makes the borrow unique.
        Some(unsafe { (*self.slot_ptr(idx)).assume_init_mut() })
    }

    pub(crate) fn ptr_at(&self, idx: usize) -> Option<NonNull<T>> {
        if !self.occupancy.is_set(idx) {
            return None;
        }
        NonNull::new(self.slot_ptr(idx) as *mut T)
    }

    /// Map a pointer back to its slot index, rejecting anything that is not
    /// the start of a live slot in this region.
    pub(crate) fn index_of(&self, ptr: *const T) -> Result<usize, FreeError> {
        if ptr.is_null() {
            return Err(FreeError::NullPointer);
        }

        let base = self.base.as_ptr() as usize;
        let end = base + self.capacity * Self::SLOT_SIZE;
        let addr = ptr as usize;
        if self.capacity == 0 || addr < base || addr >= end {
            return Err(FreeError::OutOfRange);
        }

        let offset = addr - base;
        if offset % Self::SLOT_SIZE != 0 {
            return Err(FreeError::Misaligned);
        }

        let index = offset / Self::SLOT_SIZE;
        if !self.occupancy.is_set(index) {
            return Err(FreeError::NotAllocated { index });
        }
        Ok(index)
    }

    /// Reallocate to `new_capacity` slots. Every live value moves to the same
    /// index in the new region; the old region is released.
    ///
    /// Pointers previously returned by [`insert`](Self::insert) or
    /// [`ptr_at`](Self::ptr_at) dangle afterwards.
    pub(crate) fn grow(&mut self, new_capacity: usize) {
        assert!(new_capacity > self.capacity, "slot storage can only grow");

        let fresh = Self::allocate(new_capacity);
        for idx in self.occupancy.iter_set() {
            // SAFETY: idx < old capacity < new capacity; regions are distinct.
            // A bitwise move: the old slot is never read or dropped again.
            unsafe {
                ptr::copy_nonoverlapping(self.slot_ptr(idx), fresh.as_ptr().add(idx), 1);
            }
        }

        // SAFETY: `self.base` was produced by `allocate(self.capacity)`.
        unsafe { Self::release(self.base, self.capacity) };
        self.base = fresh;
        self.capacity = new_capacity;
        self.occupancy.grow(new_capacity);
        debug_assert_eq!(self.occupancy.len(), self.capacity);
    }

    /// Live slot indices in ascending order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.occupancy.iter_set()
    }
}

impl<T> Drop for SlotStorage<T> {
    fn drop(&mut self) {
        if mem::needs_drop::<T>() {
            for idx in self.occupancy.iter_set() {
                // SAFETY: every set bit marks an initialised value, dropped once.
                unsafe { (*self.slot_ptr(idx)).assume_init_drop() };
            }
        }
        // SAFETY: region came from `allocate(self.capacity)`.
        unsafe { Self::release(self.base, self.capacity) };
    }
}
