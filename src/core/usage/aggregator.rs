use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::core::config::DayBoundary;
use crate::core::models::tokens::TokenTotals;
use crate::core::models::usage::{CacheKey, DailyTokenUsage};
use crate::core::usage::discovery::{collect_jsonl, discover_files, month_dir};
use crate::core::usage::error::UsageError;
use crate::core::usage::event::{decode_line, DecodedLine, EventSignature};
use crate::core::usage::tailer::{process_file, FileState};

/// Incremental per-day aggregation over the session log tree.
///
/// Holds one cursor per discovered file for the cached day. Asking for a
/// different day drops every cursor.
#[derive(Debug)]
pub struct UsageAggregator {
    root: PathBuf,
    boundary: DayBoundary,
    cache_key: Option<CacheKey>,
    files: HashMap<PathBuf, FileState>,
    cached: Option<DailyTokenUsage>,
    dirty: bool,
}

impl UsageAggregator {
    pub fn new(root: PathBuf, boundary: DayBoundary) -> Self {
        Self {
            root,
            boundary,
            cache_key: None,
            files: HashMap::new(),
            cached: None,
            dirty: true,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    #[cfg(test)]
    pub fn file_state(&self, path: &Path) -> Option<&FileState> {
        self.files.get(path)
    }

    pub fn fetch_daily_usage(&mut self, date: NaiveDate) -> Result<DailyTokenUsage, UsageError> {
        let key = CacheKey::for_date(date);
        if self.cache_key != Some(key) {
            if self.cache_key.is_some() {
                tracing::debug!(day = %date, "target day changed, dropping per-file state");
            }
            self.cache_key = Some(key);
            self.files.clear();
            self.cached = None;
            self.dirty = true;
        }

        let discovered = match discover_files(&self.root, date) {
            Ok(files) => files,
            Err(err) => {
                self.cached = None;
                return Err(err);
            }
        };
        if discovered.is_empty() {
            self.cached = None;
            return Err(UsageError::NoLogsForDay(date));
        }

        let live: HashSet<&Path> = discovered.iter().map(|f| f.path.as_path()).collect();
        let tracked = self.files.len();
        self.files.retain(|path, _| live.contains(path.as_path()));
        if self.files.len() != tracked {
            tracing::debug!(pruned = tracked - self.files.len(), "dropped vanished log files");
            self.dirty = true;
        }

        for file in &discovered {
            let previous = self.files.get(&file.path);
            match process_file(
                &file.path,
                previous,
                date,
                file.enforce_timestamp,
                self.boundary,
            ) {
                Ok((state, changed)) => {
                    self.files.insert(file.path.clone(), state);
                    self.dirty |= changed;
                }
                Err(err) => {
                    tracing::warn!(
                        path = %file.path.display(),
                        error = %format!("{:#}", err),
                        "skipping log file this cycle"
                    );
                }
            }
        }

        if !self.dirty {
            if let Some(cached) = &self.cached {
                return Ok(cached.clone());
            }
        }
        self.dirty = false;

        let has_day_data = self.files.values().any(|state| state.has_day_data);
        if !has_day_data {
            self.cached = None;
            return Err(UsageError::NoLogsForDay(date));
        }
        let totals: TokenTotals = self.files.values().map(|state| state.totals).sum();
        let usage = DailyTokenUsage::new(date, totals);
        self.cached = Some(usage.clone());
        Ok(usage)
    }
}

/// Full, non-incremental scan of the month folder containing `date`.
///
/// Every call re-reads every file. Resent events are dropped through one
/// signature set shared by the whole scan. A missing month folder totals zero.
pub fn scan_month_totals(root: &Path, date: NaiveDate) -> Result<TokenTotals, UsageError> {
    if !root.is_dir() {
        return Err(UsageError::MissingRoot(root.to_path_buf()));
    }

    let mut seen: HashSet<EventSignature> = HashSet::new();
    let mut totals = TokenTotals::zero();
    for path in collect_jsonl(&month_dir(root, date)) {
        match scan_file(&path, &mut seen) {
            Ok(file_totals) => totals += file_totals,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %format!("{:#}", err),
                    "skipping log file in month scan"
                );
            }
        }
    }
    Ok(totals)
}

fn scan_file(path: &Path, seen: &mut HashSet<EventSignature>) -> Result<TokenTotals> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut previous_total: Option<TokenTotals> = None;
    let mut totals = TokenTotals::zero();
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut line_buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        // An unterminated last line is still being written.
        if bytes_read == 0 || line_buf.last() != Some(&b'\n') {
            break;
        }

        let line = String::from_utf8_lossy(&line_buf);
        let DecodedLine::TokenCount(event) = decode_line(&line) else {
            continue;
        };
        if !seen.insert(event.signature()) {
            continue;
        }
        if let Some(delta) = event.take_delta(&mut previous_total) {
            totals += delta;
        }
    }

    Ok(totals)
}
