//! Slot Pools: in-place object placement over a pre-reserved region
//!
//! Design rules:
//! - No per-object heap allocation: values live in slots of one region
//! - Occupancy bitmap: one bit per slot, scanned 64 slots at a time
//! - Not thread-safe: plain data structures, share them behind a lock
//!
//! [`FixedPool`] never grows and reports [`PoolExhausted`](crate::error::PoolExhausted).
//! [`GrowablePool`] doubles instead, and hands out [`SlotHandle`]s that stay
//! valid across growth where raw pointers do not.

mod bitmap;
mod fixed;
mod growable;
mod slot;

pub use fixed::FixedPool;
pub use growable::{GrowablePool, SlotHandle};
