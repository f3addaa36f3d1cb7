use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::AppConfig;
use crate::core::models::usage::{DailyTokenUsage, HistoricalSummary, MonthlySummary};
use crate::core::usage::refresh::{RefreshReport, Tracker};

#[derive(Serialize)]
struct UsagePayload<'a> {
    day: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    today: Option<&'a DailyTokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    history: &'a [HistoricalSummary],
    #[serde(skip_serializing_if = "Option::is_none")]
    month: Option<&'a MonthlySummary>,
    refreshed_at: DateTime<Utc>,
}

impl<'a> UsagePayload<'a> {
    fn from_report(report: &'a RefreshReport) -> Self {
        Self {
            day: report.day,
            today: report.today.as_ref().ok(),
            error: report.today.as_ref().err().map(|e| e.to_string()),
            history: &report.history,
            month: report.month.as_ref(),
            refreshed_at: report.refreshed_at,
        }
    }
}

pub fn print_report(report: &RefreshReport, opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Text => {
            println!("{}", renderer::render_report(report, opts.use_color));
        }
        OutputFormat::Json => {
            let payload = UsagePayload::from_report(report);
            let json = if opts.pretty {
                serde_json::to_string_pretty(&payload)?
            } else {
                serde_json::to_string(&payload)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}

pub async fn run(
    config: &AppConfig,
    sessions_dir: Option<PathBuf>,
    date: Option<NaiveDate>,
    opts: &OutputOptions,
) -> Result<()> {
    let root = config.sessions.resolve_root(sessions_dir);
    let boundary = config.sessions.day_boundary;
    let day = date.unwrap_or_else(|| boundary.today());
    tracing::debug!(root = %root.display(), day = %day, "scanning sessions");

    // Show spinner on stderr (text mode only)
    let show_spinner = matches!(opts.format, OutputFormat::Text)
        && !opts.verbose
        && std::io::stderr().is_terminal();
    let spinner = if show_spinner {
        Some(tokio::spawn(async move {
            let frames = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
            let mut i = 0usize;
            loop {
                eprint!("\r {} Scanning session logs...", frames[i % frames.len()]);
                i = i.wrapping_add(1);
                tokio::time::sleep(std::time::Duration::from_millis(80)).await;
            }
        }))
    } else {
        None
    };

    let mut tracker = Tracker::new(root, boundary);
    let report = tracker.refresh(day).await;

    // Stop spinner and clear the line
    if let Some(s) = spinner {
        s.abort();
        eprint!("\r\x1b[2K");
    }

    print_report(&report?, opts)
}
