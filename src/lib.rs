//! Hotpath - building blocks for latency-sensitive code
//!
//! - [`core`]: lock-free SPSC ring buffer with compile-time capacity
//! - [`pool`]: bitmap-tracked slot pools, fixed and growable
//! - [`logging`]: asynchronous file logger fed through the ring buffer
//!
//! Hot-path operations never allocate, never block and report failure as a
//! value from [`error`].

pub mod core;
pub mod error;
pub mod logging;
pub mod pool;
