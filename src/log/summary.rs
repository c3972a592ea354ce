//! Fixed-width tables for step results and the run summary.

use std::time::Duration;

use console::{pad_str, Alignment};

use super::ansi;
use crate::runner::results::{BuildRunResults, StepRunStatus};

/// Total width of every table line, borders included.
pub const TABLE_WIDTH: usize = 80;
const TIME_WIDTH: usize = 8;
const TITLE_WIDTH: usize = TABLE_WIDTH - TIME_WIDTH - 11;

pub fn full_border() -> String {
    format!("+{}+", "-".repeat(TABLE_WIDTH - 2))
}

pub fn column_border() -> String {
    format!(
        "+---+{}+{}+",
        "-".repeat(TITLE_WIDTH + 2),
        "-".repeat(TIME_WIDTH + 2)
    )
}

/// A row spanning the full table width. Long text is truncated.
pub fn full_row(text: &str) -> String {
    format!(
        "| {} |",
        pad_str(text, TABLE_WIDTH - 4, Alignment::Left, Some("..."))
    )
}

fn centered_row(text: &str) -> String {
    format!(
        "| {} |",
        pad_str(text, TABLE_WIDTH - 4, Alignment::Center, Some("..."))
    )
}

fn status_color(status: StepRunStatus) -> &'static str {
    match status {
        StepRunStatus::Success => ansi::GREEN,
        StepRunStatus::Failed | StepRunStatus::TimedOut => ansi::RED,
        StepRunStatus::FailedSkippable => ansi::YELLOW,
        StepRunStatus::Skipped => ansi::BLUE,
    }
}

/// `| icon | title | time |` with icon and title in the status color.
pub fn status_row(status: StepRunStatus, title: &str, duration: Duration) -> String {
    let color = status_color(status);
    let title = pad_str(title, TITLE_WIDTH, Alignment::Left, Some("..."));
    format!(
        "| {} | {} | {} |",
        ansi::paint(color, &status.display_char().to_string()),
        ansi::paint(color, &title),
        pad_str(&format_duration(duration), TIME_WIDTH, Alignment::Right, None)
    )
}

/// Short human-readable duration: `0.25 sec`, `2.5 min`, `1.2 hour`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2} sec", secs)
    } else if secs < 3600.0 {
        format!("{:.1} min", secs / 60.0)
    } else {
        format!("{:.1} hour", secs / 3600.0)
    }
}

/// The run summary table.
pub fn summary_lines(results: &BuildRunResults) -> Vec<String> {
    let mut lines = vec![
        full_border(),
        centered_row("relay summary"),
        column_border(),
        format!(
            "|   | {} | {} |",
            pad_str("title", TITLE_WIDTH, Alignment::Left, None),
            pad_str("time", TIME_WIDTH, Alignment::Right, None)
        ),
        column_border(),
    ];

    for workflow in &results.workflows {
        for step in &workflow.steps {
            lines.push(status_row(step.status, &step.title, step.duration));
        }
    }
    if results.step_count() > 0 {
        lines.push(column_border());
    }

    lines.push(full_row(&format!(
        "Total runtime: {}",
        format_duration(results.total_duration())
    )));
    lines.push(full_border());
    lines
}
