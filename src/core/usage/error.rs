use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that reach the caller of a daily or monthly fetch. Line-level and
/// per-file problems never surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("No Codex sessions directory at {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("No Codex logs found for {0}")]
    NoLogsForDay(NaiveDate),
}
