//! Asynchronous file logger
//!
//! Application threads hand [`LogRecord`]s to a background writer through the
//! lock-free SPSC ring in [`crate::core`]. The writer owns the file; the hot
//! path never blocks on I/O and never waits for space.

mod config;
mod level;
mod record;
mod writer;

pub use config::LogConfig;
pub use level::{LogLevel, ParseLevelError};
pub use record::{LogRecord, ThreadIdentity};
pub use writer::{LogWriter, Logger, WriterStats, LOG_QUEUE_SLOTS};
