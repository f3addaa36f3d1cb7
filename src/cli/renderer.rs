use colored::{control, Colorize};

use crate::core::formatter::{format_day_label, format_month_label, format_token_count};
use crate::core::models::tokens::TokenTotals;
use crate::core::usage::error::UsageError;
use crate::core::usage::refresh::RefreshReport;

/// Width of the label column, wide enough for "30th September".
const LABEL_WIDTH: usize = 14;

/// Render one refresh cycle as a colored (or plain) block.
///
/// Layout:
/// ```text
///  Codex usage (2025-06-15)
///   Today           1.2M tokens
///                   800.0K in (300.0K cached, 500.0K new), 400.0K out (50.0K reasoning)
///   Yesterday       900.0K tokens
///   13th June       12.5K tokens
///   June 2025       45.3M tokens
/// ```
pub fn render_report(report: &RefreshReport, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(" Codex usage ({})", report.day).bold().to_string());

    match &report.today {
        Ok(usage) => {
            lines.push(total_line("Today", &usage.totals));
            lines.push(format!(
                "  {:<width$}  {}",
                "",
                breakdown(&usage.totals).dimmed(),
                width = LABEL_WIDTH
            ));
        }
        Err(err @ UsageError::NoLogsForDay(_)) => {
            lines.push(label_line("Today", &err.to_string().yellow().to_string()));
        }
        Err(err @ UsageError::MissingRoot(_)) => {
            lines.push(label_line("Today", &err.to_string().red().to_string()));
        }
    }

    for day in &report.history {
        lines.push(total_line(&format_day_label(&day.label), &day.totals));
    }

    if let Some(month) = &report.month {
        lines.push(total_line(&format_month_label(&month.label), &month.totals));
    }

    lines.join("\n")
}

fn label_line(label: &str, value: &str) -> String {
    let padded = format!("{:<width$}", label, width = LABEL_WIDTH);
    format!("  {}  {}", padded.cyan(), value)
}

fn total_line(label: &str, totals: &TokenTotals) -> String {
    label_line(
        label,
        &format!("{} tokens", format_token_count(totals.total_tokens)),
    )
}

fn breakdown(totals: &TokenTotals) -> String {
    format!(
        "{} in ({} cached, {} new), {} out ({} reasoning)",
        format_token_count(totals.input_tokens),
        format_token_count(totals.cached_input_tokens),
        format_token_count(totals.billed_input_tokens()),
        format_token_count(totals.output_tokens),
        format_token_count(totals.reasoning_output_tokens),
    )
}
