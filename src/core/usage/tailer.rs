use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::core::config::DayBoundary;
use crate::core::models::tokens::TokenTotals;
use crate::core::usage::event::{decode_line, DecodedLine, EventSignature};

/// Inode-style token used to notice a file being replaced under the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    device: u64,
    inode: u64,
}

#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(FileIdentity {
        device: metadata.dev(),
        inode: metadata.ino(),
    })
}

#[cfg(not(unix))]
fn file_identity(metadata: &Metadata) -> Option<FileIdentity> {
    let created = metadata
        .created()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?;
    Some(FileIdentity {
        device: created.as_secs(),
        inode: u64::from(created.subsec_nanos()),
    })
}

/// Read cursor and running totals for one tailed log file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileState {
    /// Bytes consumed so far, including any buffered partial line.
    pub offset: u64,
    /// Trailing bytes of the last read that did not end in a newline yet.
    pub leftover: Vec<u8>,
    /// Totals of events that count toward the target day.
    pub totals: TokenTotals,
    pub has_day_data: bool,
    pub identity: Option<FileIdentity>,
    /// Latest cumulative snapshot, the baseline for the next delta.
    pub last_cumulative: Option<TokenTotals>,
    pub last_signature: Option<EventSignature>,
}

impl FileState {
    /// Apply one complete line. Returns true when the day totals moved.
    fn apply_line(
        &mut self,
        line: &str,
        target_day: NaiveDate,
        enforce_timestamp: bool,
        boundary: DayBoundary,
    ) -> bool {
        let DecodedLine::TokenCount(event) = decode_line(line) else {
            return false;
        };

        let signature = event.signature();
        if self.last_signature.as_ref() == Some(&signature) {
            return false;
        }
        self.last_signature = Some(signature);

        // The baseline has to advance even for events outside the target day.
        let Some(delta) = event.take_delta(&mut self.last_cumulative) else {
            return false;
        };
        if enforce_timestamp && boundary.day_of(&event.at) != target_day {
            return false;
        }

        self.totals += delta;
        self.has_day_data = true;
        true
    }
}

/// Consume whatever was appended to `path` since `previous` and return the
/// updated state plus whether anything observable changed.
///
/// A replaced file (new identity) or a file shorter than the recorded offset
/// starts over from an empty state. On error the caller keeps `previous`.
pub fn process_file(
    path: &Path,
    previous: Option<&FileState>,
    target_day: NaiveDate,
    enforce_timestamp: bool,
    boundary: DayBoundary,
) -> Result<(FileState, bool)> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let size = metadata.len();
    let identity = file_identity(&metadata);

    let mut changed = false;
    let mut state = match previous {
        Some(prev) if prev.identity == identity && size >= prev.offset => prev.clone(),
        Some(prev) => {
            tracing::debug!(
                path = %path.display(),
                offset = prev.offset,
                size,
                "log file rotated or truncated, resetting"
            );
            changed = true;
            FileState::default()
        }
        None => FileState::default(),
    };
    state.identity = identity;

    if size == state.offset {
        return Ok((state, changed));
    }

    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    file.seek(SeekFrom::Start(state.offset))
        .with_context(|| format!("Failed to seek {}", path.display()))?;
    let mut appended = Vec::new();
    file.take(size.saturating_sub(state.offset))
        .read_to_end(&mut appended)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    state.offset += appended.len() as u64;

    let mut pending = std::mem::take(&mut state.leftover);
    pending.extend_from_slice(&appended);
    let complete_len = pending
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |idx| idx + 1);
    state.leftover = pending.split_off(complete_len);

    for raw in pending.split(|b| *b == b'\n') {
        if raw.is_empty() {
            continue;
        }
        let line = String::from_utf8_lossy(raw);
        if state.apply_line(&line, target_day, enforce_timestamp, boundary) {
            changed = true;
        }
    }

    Ok((state, changed))
}
