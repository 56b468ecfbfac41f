use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};

use super::LogLevel;

/// Log writer configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory receiving log files; `archive/` is created inside it.
    pub directory: PathBuf,
    /// File name prefix, followed by `_YYYYmmdd_HHMMSS.log`.
    pub file_stem: String,
    /// Records below this level are discarded before they are built.
    pub min_level: LogLevel,
    /// Writer sleep when the queue is empty.
    pub idle_interval: Duration,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_stem: "application".to_string(),
            min_level: LogLevel::Info,
            idle_interval: Duration::from_millis(10),
        }
    }
}

impl LogConfig {
    const FALLBACK_STEM: &'static str = "application";

    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn file_stem(mut self, stem: impl Into<String>) -> Self {
        self.file_stem = stem.into();
        self
    }

    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Path of the log file for a writer started at `now`.
    pub fn file_path(&self, now: DateTime<Local>) -> PathBuf {
        let stem = if self.file_stem.is_empty() {
            Self::FALLBACK_STEM
        } else {
            self.file_stem.as_str()
        };
        let name = format!("{}_{}.log", stem, now.format("%Y%m%d_%H%M%S"));
        self.directory.join(name)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.directory.join("archive")
    }

    /// Create the log and archive directories and return the file path.
    pub(crate) fn prepare(&self) -> io::Result<PathBuf> {
        ensure_dir(&self.directory)?;
        ensure_dir(&self.archive_dir())?;
        Ok(self.file_path(Local::now()))
    }
}

fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
