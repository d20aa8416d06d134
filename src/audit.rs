use crate::error::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Append-only audit trail of completed pipeline stages.
///
/// Each call to [`ProcessLog::record`] opens the file in append mode, writes a single
/// `<timestamp>,<message>` line and closes it again. Existing content is never truncated.
#[derive(Debug, Clone)]
pub struct ProcessLog {
    path: PathBuf,
}

impl ProcessLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one timestamped line to the log file, creating it if absent.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or written to.
    pub fn record(&self, message: &str) -> Result<()> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{},{}", timestamp, message)?;
        Ok(())
    }
}
