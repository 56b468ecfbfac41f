use std::fmt;
use std::ptr::NonNull;

use tracing::debug;

use super::slot::SlotStorage;
use crate::error::FreeError;

/// Stable reference to a value in a [`GrowablePool`].
///
/// A handle survives growth of the pool. It carries the slot's generation, so
/// a handle kept after its value was freed is detected as stale even when the
/// slot has since been reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct SlotHandle {
    index: usize,
    generation: u32,
}

impl SlotHandle {
    /// Slot index inside the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotHandle(idx={}, gen={})", self.index, self.generation)
    }
}

/// Slot allocator that doubles its region instead of failing.
///
/// Same occupancy bitmap and `free_index` hint as
/// [`FixedPool`](super::FixedPool). When no slot is free, a region of twice
/// the capacity is allocated, every live value is moved to the same index in
/// it, and the old region is released.
///
/// # Pointer invalidation
/// Growth moves values. **Any raw pointer obtained from
/// [`as_ptr`](Self::as_ptr) before an `alloc` that grows the pool dangles
/// afterwards.** Keep [`SlotHandle`]s and re-resolve them instead; handles
/// are unaffected by growth.
pub struct GrowablePool<T> {
    storage: SlotStorage<T>,
    free_index: Option<usize>,
    generations: Vec<u32>,
    growth_count: usize,
}

impl<T> Default for GrowablePool<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> GrowablePool<T> {
    /// Create a pool with room for `initial_capacity` values. Zero is
    /// allowed; the first allocation then grows the pool to one slot.
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            storage: SlotStorage::with_capacity(initial_capacity),
            free_index: (initial_capacity > 0).then_some(0),
            generations: vec![0; initial_capacity],
            growth_count: 0,
        }
    }

    /// Move `value` into the pool. Never fails for lack of room.
    #[inline]
    pub fn alloc(&mut self, value: T) -> SlotHandle {
        self.alloc_with(move || value)
    }

    /// Construct a value in the pool, growing it first if needed.
    pub fn alloc_with<F>(&mut self, init: F) -> SlotHandle
    where
        F: FnOnce() -> T,
    {
        let index = match self.free_index {
            Some(index) => index,
            None => {
                let index = self.grow();
                // Keep the hint truthful if `init` unwinds
                self.free_index = Some(index);
                index
            }
        };

        self.storage.insert(index, init());
        self.free_index = self.storage.first_free(index);

        SlotHandle {
            index,
            generation: self.generations[index],
        }
    }

    /// Double the region and return the first slot of the new half.
    #[cold]
    fn grow(&mut self) -> usize {
        let old = self.storage.capacity();
        let new = old.checked_mul(2).expect("slot pool capacity overflow").max(1);

        self.storage.grow(new);
        self.generations.resize(new, 0);
        self.growth_count += 1;

        debug!(
            from = old,
            to = new,
            live = self.storage.len(),
            "growable pool expanded"
        );
        old
    }

    fn check(&self, handle: SlotHandle) -> Result<usize, FreeError> {
        let index = handle.index;
        let current = self.generations.get(index).copied();
        if current != Some(handle.generation) || !self.storage.is_occupied(index) {
            return Err(FreeError::StaleHandle { index });
        }
        Ok(index)
    }

    fn release(&mut self, index: usize) -> Result<T, FreeError> {
        let value = self
            .storage
            .remove(index)
            .ok_or(FreeError::NotAllocated { index })?;

        self.generations[index] = self.generations[index].wrapping_add(1);
        if self.free_index.is_none() {
            self.free_index = Some(index);
        }
        Ok(value)
    }

    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        let index = self.check(handle).ok()?;
        self.storage.get(index)
    }

    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let index = self.check(handle).ok()?;
        self.storage.get_mut(index)
    }

    /// Raw pointer to the value behind `handle`.
    ///
    /// The pointer is only valid until the next call that grows the pool
    /// (any `alloc` while [`is_full`](Self::is_full) is true).
    pub fn as_ptr(&self, handle: SlotHandle) -> Option<NonNull<T>> {
        let index = self.check(handle).ok()?;
        self.storage.ptr_at(index)
    }

    /// Drop the value behind `handle` and release its slot.
    pub fn free(&mut self, handle: SlotHandle) -> Result<(), FreeError> {
        let value = self.take(handle)?;
        drop(value);
        Ok(())
    }

    /// Move the value behind `handle` out of the pool.
    pub fn take(&mut self, handle: SlotHandle) -> Result<T, FreeError> {
        let index = self.check(handle)?;
        self.release(index)
    }

    /// Free through a raw pointer. Same checks as
    /// [`FixedPool::free`](super::FixedPool::free), against the current
    /// region only.
    ///
    /// Passing a pointer obtained before the last growth is a caller error
    /// with an unspecified result: the allocator may have reused the old
    /// address, in which case the pointer can name a live slot of the new
    /// region. Use [`free`](Self::free) with a [`SlotHandle`] instead.
    pub fn free_ptr(&mut self, ptr: *mut T) -> Result<(), FreeError> {
        let index = self.storage.index_of(ptr)?;
        drop(self.release(index)?);
        Ok(())
    }

    /// Recover a handle for a live pointer into the current region.
    pub fn handle_of(&self, ptr: *const T) -> Result<SlotHandle, FreeError> {
        let index = self.storage.index_of(ptr)?;
        Ok(SlotHandle {
            index,
            generation: self.generations[index],
        })
    }

    /// Live values with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> + '_ {
        self.storage.occupied().filter_map(move |index| {
            let handle = SlotHandle {
                index,
                generation: self.generations[index],
            };
            self.storage.get(index).map(|value| (handle, value))
        })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// True when the next allocation will grow the pool.
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.free_index.is_none()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// How many times the region has been reallocated.
    pub fn growth_count(&self) -> usize {
        self.growth_count
    }
}

impl<T> fmt::Debug for GrowablePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowablePool")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("growth_count", &self.growth_count)
            .finish()
    }
}
