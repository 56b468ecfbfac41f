//! # Occupancy Bitmap
//!
//! One bit per slot, packed into 64-bit chunks:
//! - `1` → slot holds a live value
//! - `0` → slot is free
//!
//! Bits past the last valid slot in the final chunk are kept set, so a
//! find-first-zero scan never reports a slot that does not exist.
//!
//! ```text
//! len = 130, chunks = ceil(130 / 64) = 3
//!
//! chunks[0] = 0x0000_0000_0000_0000 (64 free)
//! chunks[1] = 0x0000_0000_0000_0000 (64 free)
//! chunks[2] = 0xFFFF_FFFF_FFFF_FFFC (slots 128 and 129 free, rest padding)
//! ```

/// Bitmap of occupied slots with a chunked find-first-zero scan.
#[derive(Debug, Clone)]
pub(crate) struct OccupancyBitmap {
    chunks: Vec<u64>,
    len: usize,
}

impl OccupancyBitmap {
    /// Number of bits to right-shift for dividing by 64.
    const DIV_BY: u32 = 6;

    /// Lower 6 bits select the bit inside a chunk.
    const MASK_64: usize = 0b111111;

    const FULL: u64 = u64::MAX;

    /// Create a bitmap tracking `len` slots, all free.
    pub(crate) fn new(len: usize) -> Self {
        let mut chunks = vec![0u64; Self::chunk_count(len)];
        if let Some(last) = chunks.last_mut() {
            *last = Self::padding_mask(len);
        }
        Self { chunks, len }
    }

    #[inline(always)]
    fn chunk_count(len: usize) -> usize {
        (len + Self::MASK_64) >> Self::DIV_BY
    }

    /// Bits of the final chunk that do not map to a slot.
    #[inline(always)]
    fn padding_mask(len: usize) -> u64 {
        let used = len & Self::MASK_64;
        if used == 0 {
            0
        } else {
            Self::FULL << used
        }
    }

    #[inline(always)]
    fn locate(idx: usize) -> (usize, u64) {
        (idx >> Self::DIV_BY, 1u64 << (idx & Self::MASK_64))
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub(crate) fn is_set(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        let (chunk, mask) = Self::locate(idx);
        self.chunks[chunk] & mask != 0
    }

    #[inline(always)]
    pub(crate) fn set(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "bit {idx} out of range");
        let (chunk, mask) = Self::locate(idx);
        self.chunks[chunk] |= mask;
    }

    #[inline(always)]
    pub(crate) fn clear(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "bit {idx} out of range");
        let (chunk, mask) = Self::locate(idx);
        self.chunks[chunk] &= !mask;
    }

    /// Lowest clear bit, scanning one chunk at a time starting with the
    /// chunk that contains `from` and wrapping around. `None` when every
    /// chunk is full.
    ///
    /// Cost is the number of chunks inspected, not the number of slots.
    pub(crate) fn first_zero_from(&self, from: usize) -> Option<usize> {
        let count = self.chunks.len();
        if count == 0 {
            return None;
        }

        let start = (from >> Self::DIV_BY) % count;
        for step in 0..count {
            let chunk = (start + step) % count;
            let word = self.chunks[chunk];
            if word != Self::FULL {
                let bit = (!word).trailing_zeros() as usize;
                return Some((chunk << Self::DIV_BY) + bit);
            }
        }
        None
    }

    /// Extend to `new_len` slots; new slots start free.
    pub(crate) fn grow(&mut self, new_len: usize) {
        assert!(new_len >= self.len, "bitmap cannot shrink");

        // Old padding bits become real, free slots
        if let Some(last) = self.chunks.last_mut() {
            *last &= !Self::padding_mask(self.len);
        }

        self.chunks.resize(Self::chunk_count(new_len), 0);
        if let Some(last) = self.chunks.last_mut() {
            *last |= Self::padding_mask(new_len);
        }
        self.len = new_len;
    }

    /// Indices of every set bit, ascending.
    pub(crate) fn iter_set(&self) -> SetBits<'_> {
        SetBits {
            bitmap: self,
            chunk: 0,
            word: self.masked_chunk(0),
        }
    }

    fn masked_chunk(&self, chunk: usize) -> u64 {
        match self.chunks.get(chunk) {
            Some(&word) if chunk + 1 == self.chunks.len() => word & !Self::padding_mask(self.len),
            Some(&word) => word,
            None => 0,
        }
    }
}

/// Iterator over occupied slot indices.
pub(crate) struct SetBits<'a> {
    bitmap: &'a OccupancyBitmap,
    chunk: usize,
    word: u64,
}

impl Iterator for SetBits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.word == 0 {
            self.chunk += 1;
            if self.chunk >= self.bitmap.chunks.len() {
                return None;
            }
            self.word = self.bitmap.masked_chunk(self.chunk);
        }
        let bit = self.word.trailing_zeros() as usize;
        // Clear the lowest set bit
        self.word &= self.word - 1;
        Some((self.chunk << OccupancyBitmap::DIV_BY) + bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_all_free() {
        let map = OccupancyBitmap::new(130);
        assert_eq!(map.chunks.len(), 3);
        assert_eq!(map.chunks[2], 0xFFFF_FFFF_FFFF_FFFC);
        assert_eq!(map.first_zero_from(0), Some(0));
        assert_eq!(map.iter_set().count(), 0);
    }

    #[test]
    fn test_empty_bitmap_has_no_zero() {
        let map = OccupancyBitmap::new(0);
        assert_eq!(map.first_zero_from(0), None);
        assert!(!map.is_set(0));
    }

    #[test]
    fn test_set_clear_roundtrip() {
        let mut map = OccupancyBitmap::new(70);
        map.set(0);
        map.set(65);
        assert!(map.is_set(0));
        assert!(map.is_set(65));
        assert!(!map.is_set(1));
        map.clear(65);
        assert!(!map.is_set(65));
    }

    #[test]
    fn test_scan_skips_padding() {
        let mut map = OccupancyBitmap::new(3);
        map.set(0);
        map.set(1);
        assert_eq!(map.first_zero_from(0), Some(2));
        map.set(2);
        assert_eq!(map.first_zero_from(0), None);
    }

    #[test]
    fn test_scan_starts_at_hint_chunk_and_wraps() {
        let mut map = OccupancyBitmap::new(192);
        for i in 64..128 {
            map.set(i);
        }
        // Chunk 1 is full, so a scan from slot 70 moves on to chunk 2
        assert_eq!(map.first_zero_from(70), Some(128));

        for i in 128..192 {
            map.set(i);
        }
        // Chunks 1 and 2 full, wraps back to chunk 0
        assert_eq!(map.first_zero_from(70), Some(0));
    }

    #[test]
    fn test_grow_frees_old_padding() {
        let mut map = OccupancyBitmap::new(2);
        map.set(0);
        map.set(1);
        assert_eq!(map.first_zero_from(0), None);

        map.grow(4);
        assert_eq!(map.len(), 4);
        assert!(map.is_set(0));
        assert!(map.is_set(1));
        assert_eq!(map.first_zero_from(0), Some(2));

        map.grow(100);
        assert_eq!(map.chunks.len(), 2);
        assert_eq!(map.first_zero_from(64), Some(64));
    }

    #[test]
    fn test_iter_set_ascending() {
        let mut map = OccupancyBitmap::new(200);
        for i in [199, 3, 64, 0, 130] {
            map.set(i);
        }
        let live: Vec<_> = map.iter_set().collect();
        assert_eq!(live, vec![0, 3, 64, 130, 199]);
    }
}
