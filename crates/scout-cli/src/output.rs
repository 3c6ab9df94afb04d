//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use scout_orchestrator::{BatchReport, BatchSummary, JobResult, JobStatus};
use scout_store::CacheStats;
use std::path::Path;
use std::time::Duration;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

const MAX_ERROR_WIDTH: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a finished batch.
    ///
    /// `fields` selects the table columns; JSON always carries everything.
    pub fn format_report(&self, report: &BatchReport, fields: &[String]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Table => Ok(self.format_results_table(&report.results, fields)),
        }
    }

    fn format_results_table(&self, results: &[JobResult], fields: &[String]) -> String {
        if results.is_empty() {
            return self.colorize("No entities processed.", "yellow");
        }

        let mut header = vec!["Entity".to_string(), "Status".to_string()];
        header.extend(fields.iter().cloned());
        header.extend([
            "Searches".to_string(),
            "Extractions".to_string(),
            "Cached".to_string(),
            "Error".to_string(),
        ]);

        let mut builder = Builder::default();
        builder.push_record(header);

        for result in results {
            let mut row = vec![result.entity_id.to_string(), result.status.to_string()];
            row.extend(
                fields
                    .iter()
                    .map(|field| result.extracted_fields.get(field).cloned().unwrap_or_default()),
            );
            row.push(result.attempt_count.to_string());
            row.push(result.extraction_attempts.to_string());
            row.push(if result.timings.cache_hit { "yes" } else { "no" }.to_string());
            row.push(
                result
                    .error
                    .as_ref()
                    .map(|e| truncate(&e.to_string(), MAX_ERROR_WIDTH))
                    .unwrap_or_default(),
            );
            builder.push_record(row);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// One line per finished entity, for progress on stderr.
    pub fn progress(&self, done: usize, total: usize, result: &JobResult) -> String {
        let line = format!(
            "[{}/{}] {} {}",
            done, total, result.entity_id, result.status
        );
        match result.status {
            JobStatus::Success => self.colorize(&line, "green"),
            JobStatus::Failed => self.colorize(&line, "red"),
            JobStatus::Skipped => self.colorize(&line, "yellow"),
        }
    }

    /// Format the batch summary.
    pub fn summary(&self, summary: &BatchSummary) -> String {
        let text = summary.summary();
        if summary.failed > 0 || summary.cancelled {
            self.colorize(&text, "yellow")
        } else {
            self.colorize(&text, "cyan")
        }
    }

    /// Format cache directory statistics.
    pub fn format_cache_stats(&self, dir: &Path, expiry: Duration, stats: &CacheStats) -> Result<String> {
        let expiry_days = expiry.as_secs() / 86_400;
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "dir": dir.display().to_string(),
                "entries": stats.entries,
                "total_bytes": stats.total_bytes,
                "expiry_days": expiry_days,
            }))?),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Directory", &dir.display().to_string()]);
                builder.push_record(["Entries", &stats.entries.to_string()]);
                builder.push_record(["Size", &format_bytes(stats.total_bytes)]);
                builder.push_record(["Expiry", &format!("{} days", expiry_days)]);

                let mut table = builder.build();
                table.with(Style::rounded());
                Ok(table.to_string())
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
