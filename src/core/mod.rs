//! Core module: bounded lock-free SPSC ring buffer
//!
//! Design rules:
//! - Lock-Free: only atomic loads/stores, no Mutex/RwLock
//! - No-Allocation: every cell is allocated at construction
//! - Move semantics: items are moved in and out, never byte-copied while owned elsewhere

mod ring_buffer;

pub use ring_buffer::{Consumer, Producer, RingBuffer};
