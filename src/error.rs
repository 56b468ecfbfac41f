//! Error types for the queue, the slot pools and the log writer.
//!
//! Every hot-path failure is an ordinary value. Nothing here panics or
//! unwinds for an expected condition such as a full queue or an exhausted
//! pool.

use std::fmt;
use std::io;

use thiserror::Error;

/// Returned by `enqueue` when the ring buffer has no free cell.
///
/// Carries the rejected item back to the producer, which decides whether to
/// retry, drop or escalate.
#[derive(Error, PartialEq, Eq)]
#[error("ring buffer is full")]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Recover the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

// Manual impl so `QueueFull<T>` is an error for any `T`, not only `T: Debug`.
impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

/// Returned by `dequeue` when there is nothing to read.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("ring buffer is empty")]
pub struct QueueEmpty;

/// Returned by the fixed pool when every slot is occupied.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("slot pool exhausted (capacity {capacity})")]
pub struct PoolExhausted {
    pub capacity: usize,
}

/// Misuse detected while releasing a slot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    #[error("cannot free a null pointer")]
    NullPointer,

    #[error("pointer does not belong to this pool")]
    OutOfRange,

    #[error("pointer is inside the pool but not on a slot boundary")]
    Misaligned,

    #[error("slot {index} is not allocated (double free?)")]
    NotAllocated { index: usize },

    #[error("handle for slot {index} is stale")]
    StaleHandle { index: usize },
}

/// Failures of the asynchronous log writer.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("log queue is full, record dropped")]
    QueueFull,

    #[error("log writer has stopped, record dropped")]
    WriterStopped,

    #[error("log writer thread panicked")]
    WriterPanicked,
}

pub type LogResult<T> = std::result::Result<T, LogError>;
