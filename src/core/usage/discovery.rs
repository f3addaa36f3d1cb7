use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::usage::error::UsageError;

/// `YYYY/MM/DD` plus a little slack for nested session folders.
const MAX_DEPTH: u32 = 6;

/// A log file to tail and whether its events must be checked against the
/// target day. Files found in the day's own folder are trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub enforce_timestamp: bool,
}

pub fn month_dir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(format!("{:04}", date.year()))
        .join(format!("{:02}", date.month()))
}

pub fn day_dir(root: &Path, date: NaiveDate) -> PathBuf {
    month_dir(root, date).join(format!("{:02}", date.day()))
}

/// Resolve the files to scan for `date`: the day folder if it has logs, else
/// the month folder, else the whole tree. Sorted by path.
pub fn discover_files(root: &Path, date: NaiveDate) -> Result<Vec<DiscoveredFile>, UsageError> {
    if !root.is_dir() {
        return Err(UsageError::MissingRoot(root.to_path_buf()));
    }

    // path -> enforce_timestamp; first tier to claim a path wins
    let mut found: BTreeMap<PathBuf, bool> = BTreeMap::new();

    for path in collect_jsonl(&day_dir(root, date)) {
        found.entry(path).or_insert(false);
    }

    if found.is_empty() {
        let month = month_dir(root, date);
        let day_name = format!("{:02}", date.day());
        for path in collect_jsonl(&month) {
            let in_day_folder = path
                .strip_prefix(&month)
                .ok()
                .and_then(|rel| rel.components().next())
                .is_some_and(|first| first.as_os_str() == day_name.as_str());
            found.entry(path).or_insert(!in_day_folder);
        }
    }

    if found.is_empty() {
        for path in collect_jsonl(root) {
            found.entry(path).or_insert(true);
        }
    }

    Ok(found
        .into_iter()
        .map(|(path, enforce_timestamp)| DiscoveredFile {
            path,
            enforce_timestamp,
        })
        .collect())
}

/// All `*.jsonl` files under `dir`, sorted. A missing directory yields none.
pub fn collect_jsonl(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_jsonl_recursive(dir, &mut files, MAX_DEPTH);
    files.sort();
    files
}

fn collect_jsonl_recursive(dir: &Path, files: &mut Vec<PathBuf>, max_depth: u32) {
    if max_depth == 0 {
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            files.push(path);
        } else if path.is_dir() {
            collect_jsonl_recursive(&path, files, max_depth - 1);
        }
    }
}
