use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::usage_cmd::print_report;
use crate::core::config::AppConfig;
use crate::core::usage::refresh::{spawn_refresher, Tracker};

/// Refresh on a timer until Ctrl-C. Enter on stdin asks for an immediate
/// refresh, ignored while one is already running.
pub async fn run(
    config: &AppConfig,
    sessions_dir: Option<PathBuf>,
    interval_secs: Option<u64>,
    opts: &OutputOptions,
) -> Result<()> {
    let root = config.sessions.resolve_root(sessions_dir);
    let interval = interval_secs
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.sessions.refresh_interval());
    tracing::debug!(root = %root.display(), interval_secs = interval.as_secs(), "watching sessions");

    let tracker = Tracker::new(root, config.sessions.day_boundary);
    let (handle, mut reports, refresher) = spawn_refresher(tracker, interval);

    let stdin_handle = handle.clone();
    let announce = matches!(opts.format, OutputFormat::Text);
    let stdin_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if !stdin_handle.request() && announce && stdin_handle.is_in_flight() {
                eprintln!("  Refresh already running.");
            }
        }
    });

    loop {
        tokio::select! {
            report = reports.recv() => {
                let Some(report) = report else {
                    break;
                };
                print_report(&report, opts)?;
                if matches!(opts.format, OutputFormat::Text) {
                    let hint = format!(
                        "  Updated {}. Enter to refresh, Ctrl-C to quit.",
                        report.refreshed_at.with_timezone(&chrono::Local).format("%H:%M:%S")
                    );
                    println!("{}\n", hint.dimmed());
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    stdin_task.abort();
    refresher.abort();
    drop(handle);
    Ok(())
}
