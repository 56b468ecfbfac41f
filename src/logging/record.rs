use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Local};

use super::LogLevel;

/// Identity of the thread that produced a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadIdentity {
    name: Option<Arc<str>>,
    os_id: u64,
}

thread_local! {
    static CURRENT: ThreadIdentity = ThreadIdentity {
        name: thread::current().name().map(Arc::from),
        os_id: os_thread_id(),
    };
}

impl ThreadIdentity {
    /// Identity of the calling thread, computed once per thread.
    pub fn current() -> Self {
        CURRENT.with(Clone::clone)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Kernel thread id where the platform exposes one.
    pub fn os_id(&self) -> u64 {
        self.os_id
    }
}

impl fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name().unwrap_or("unnamed"), self.os_id)
    }
}

#[cfg(target_os = "linux")]
fn os_thread_id() -> u64 {
    // SAFETY: gettid has no preconditions and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as u64 }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn os_thread_id() -> u64 {
    // SAFETY: pthread_self has no preconditions.
    unsafe { libc::pthread_self() as u64 }
}

#[cfg(not(unix))]
fn os_thread_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// One log entry as it travels from a producer to the writer thread.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Local>,
    pub thread: ThreadIdentity,
    pub location: &'static Location<'static>,
}

impl LogRecord {
    /// Stamp a record with the current time and thread.
    pub fn new(level: LogLevel, message: String, location: &'static Location<'static>) -> Self {
        Self {
            level,
            message,
            timestamp: Local::now(),
            thread: ThreadIdentity::current(),
            location,
        }
    }
}

impl fmt::Display for LogRecord {
    /// `[LEVEL] [timestamp] [thread] message (file:line)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] {} ({}:{})",
            self.level,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.thread,
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}
