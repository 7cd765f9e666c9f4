//! Run Summary Output
//!
//! Formats a finished [`BatchReport`] for stdout, either as a human-readable summary or as a
//! JSON document. The per-event log stream is separate and goes to the batch's `LogSink`.

use std::io::IsTerminal;
use std::time::Duration;

use serde::Serialize;

use crate::batch::{BatchReport, FileRecord, FileStatus, SkipReason};
use crate::cli::OutputFormat;

/// Summary formatter
pub struct Output {
    format: OutputFormat,
    show_colors: bool,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    errors: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: JsonSummary,
    cancelled: bool,
    duration_ms: u128,
    records: &'a [FileRecord],
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            show_colors: std::io::stdout().is_terminal(),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_report(&self, report: &BatchReport) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Human => Ok(self.format_human(report)),
            OutputFormat::Json => format_json(report),
        }
    }

    fn format_human(&self, report: &BatchReport) -> String {
        let mut output = String::new();

        for record in report.records.iter().filter(|r| !r.passed()) {
            output.push_str(&self.format_record(record));
            output.push('\n');
        }
        if output.is_empty() {
            output.push_str(&self.colorize("All documents passed schema validation.", "32"));
            output.push('\n');
        }
        output.push('\n');
        output.push_str(&self.format_summary(report));

        output
    }

    pub fn format_record(&self, record: &FileRecord) -> String {
        let path = record.path.display();

        match &record.status {
            FileStatus::Validated(outcome) if outcome.passed() => {
                format!("{}  {}", self.colorize("✓ VALID", "32"), path)
            }
            FileStatus::Validated(outcome) => {
                let count = outcome.error_count();
                let mut output = format!(
                    "{}  {} - {} error{}",
                    self.colorize("✗ INVALID", "31"),
                    path,
                    count,
                    if count == 1 { "" } else { "s" }
                );
                for error in outcome.errors() {
                    output.push_str(&format!("\n    L:{} {}", error.line, error.message));
                }
                output
            }
            FileStatus::Skipped(reason) => {
                let detail = match reason {
                    SkipReason::Unreadable => "cannot read file".to_string(),
                    SkipReason::NotWellFormed { line, message } => {
                        format!("not well-formed (L:{}) {}", line, message)
                    }
                    SkipReason::ValidatorFailure { message } => message.clone(),
                };
                format!("{}  {} - {}", self.colorize("- SKIPPED", "36"), path, detail)
            }
        }
    }

    fn format_summary(&self, report: &BatchReport) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Total files: {}\n", report.total()));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Passed:", "32"),
            report.passed_count()
        ));

        if report.failed_count() > 0 {
            output.push_str(&format!(
                "  {} {} ({} errors)\n",
                self.colorize("Failed:", "31"),
                report.failed_count(),
                report.error_count()
            ));
        }
        if report.skipped_count() > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                report.skipped_count()
            ));
        }
        if report.cancelled {
            output.push_str(&format!("  {}\n", self.colorize("Cancelled", "33")));
        }

        output.push_str(&format!("  Duration: {}\n", format_duration(report.duration)));
        output
    }
}

fn format_json(report: &BatchReport) -> Result<String, serde_json::Error> {
    let json = JsonReport {
        summary: JsonSummary {
            total: report.total(),
            passed: report.passed_count(),
            failed: report.failed_count(),
            skipped: report.skipped_count(),
            errors: report.error_count(),
        },
        cancelled: report.cancelled,
        duration_ms: report.duration.as_millis(),
        records: &report.records,
    };
    serde_json::to_string_pretty(&json)
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
