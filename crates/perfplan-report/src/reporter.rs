//! Report generation for suite runs

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use perfplan_core::config::ReportConfig;
use perfplan_core::{OutcomeEvent, ReportFormat, Theme};
use serde::Serialize;

use crate::diagnostics::{display_body, extract_message};
use crate::stats::AggregateStats;

const NOT_AVAILABLE: &str = "N/A";
pub const DEFAULT_BODY_LIMIT: usize = 500;

/// Controls how per-request rows are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOptions {
    /// Include bodies of successful responses
    pub show_response_body: bool,
    /// Replace composites by their sub-events
    pub exclude_composites: bool,
    /// Characters of a body kept before truncation
    pub body_limit: usize,
}

impl Default for RowOptions {
    fn default() -> Self {
        Self {
            show_response_body: true,
            exclude_composites: true,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl From<&ReportConfig> for RowOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            show_response_body: config.show_response_body,
            exclude_composites: config.exclude_composites,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// One pre-formatted line of the per-request log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub method: String,
    pub url: String,
    pub status: String,
    pub elapsed_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub response: Option<String>,
}

impl ReportRow {
    pub fn from_event(event: &OutcomeEvent, options: &RowOptions) -> Self {
        let first_sub = event.sub_events.first();

        let url = non_empty(event.url.as_deref())
            .or_else(|| first_sub.and_then(|sub| non_empty(sub.url.as_deref())))
            .unwrap_or(NOT_AVAILABLE);
        let method = non_empty(event.method.as_deref())
            .or_else(|| first_sub.and_then(|sub| non_empty(sub.method.as_deref())))
            .unwrap_or(NOT_AVAILABLE);
        let status = non_empty(Some(event.status_code.as_str())).unwrap_or(NOT_AVAILABLE);

        let (error, response) = if event.success {
            let response = event
                .response_body
                .as_deref()
                .filter(|body| options.show_response_body && !body.trim().is_empty())
                .map(|body| display_body(Some(body), options.body_limit));
            (None, response)
        } else {
            (
                Some(extract_message(event)),
                Some(display_body(event.response_body.as_deref(), options.body_limit)),
            )
        };

        Self {
            label: event.node_label.clone(),
            method: method.to_string(),
            url: url.to_string(),
            status: status.to_string(),
            elapsed_ms: event.elapsed_ms,
            success: event.success,
            error,
            response,
        }
    }

    /// Status cell text, e.g. `404 FAIL`.
    pub fn status_badge(&self) -> String {
        if self.success {
            self.status.clone()
        } else {
            format!("{} FAIL", self.status)
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Everything persisted about one suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub passed: bool,
    pub stats: AggregateStats,
    pub rows: Vec<ReportRow>,
    pub generated_at: DateTime<Utc>,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>, passed: bool, stats: AggregateStats, rows: Vec<ReportRow>) -> Self {
        Self {
            suite: suite.into(),
            passed,
            stats,
            rows,
            generated_at: Utc::now(),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.passed {
            "PASSED"
        } else {
            "FAILED"
        }
    }
}

/// Persists suite reports in the configured format and theme.
pub struct ReportWriter {
    title: String,
    name: String,
    theme: Theme,
}

impl ReportWriter {
    pub fn new(title: impl Into<String>, name: impl Into<String>, theme: Theme) -> Self {
        Self {
            title: title.into(),
            name: name.into(),
            theme,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.title.clone(), config.name.clone(), config.theme)
    }

    /// Write report to file, creating parent directories as needed
    pub fn write_report(&self, report: &SuiteReport, path: impl AsRef<Path>, format: ReportFormat) -> std::io::Result<()> {
        let path = path.as_ref();
        let content = self.render(report, format);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;

        tracing::info!(suite = %report.suite, path = %path.display(), status = report.status(), "report written");
        Ok(())
    }

    pub fn render(&self, report: &SuiteReport, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.generate_markdown(report),
            ReportFormat::Json => self.generate_json(report),
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Standard => "standard",
            Theme::Dark => "dark",
        }
    }

    /// Generate Markdown report
    fn generate_markdown(&self, report: &SuiteReport) -> String {
        let stats = &report.stats;
        let pass_emoji = if report.passed { "✅" } else { "❌" };

        let mut rows = String::new();
        let mut details = String::new();
        for row in &report.rows {
            rows.push_str(&format!(
                "| {} | {} | `{}` | {} | {} ms |\n",
                row.label,
                row.method,
                row.url,
                row.status_badge(),
                row.elapsed_ms
            ));

            if let Some(error) = &row.error {
                details.push_str(&format!("### ❌ {}\n\n**Error**: {}\n\n", row.label, error));
            }
            if let Some(response) = &row.response {
                if row.error.is_none() {
                    details.push_str(&format!("### {}\n\n", row.label));
                }
                details.push_str(&format!("**Response**:\n\n```\n{}\n```\n\n", response));
            }
        }

        if rows.is_empty() {
            rows.push_str("| - | - | - | - | - |\n");
        }
        if details.is_empty() {
            details.push_str("No failures recorded\n");
        }

        format!(
            r#"<!-- {} | theme: {} -->
# {}: {}

**Status**: {} {}

---

## Execution Statistics

| Total | Passed | Failed | Error Rate | Avg | Min | Max | P50 | P90 | P95 | P99 |
|-------|--------|--------|------------|-----|-----|-----|-----|-----|-----|-----|
| {} | {} | {} | {:.2}% | {:.2} ms | {} ms | {} ms | {} ms | {} ms | {} ms | {} ms |

---

## Detailed Execution Log

| Label | Method | URL | Status | Latency |
|-------|--------|-----|--------|---------|
{}
---

## Details

{}
---

**Report Generated**: {}
"#,
            self.name,
            self.theme_name(),
            self.title,
            report.suite,
            pass_emoji,
            report.status(),
            stats.total,
            stats.passed,
            stats.failed,
            stats.error_rate() * 100.0,
            stats.avg_ms,
            stats.min_ms,
            stats.max_ms,
            stats.p50_ms,
            stats.p90_ms,
            stats.p95_ms,
            stats.p99_ms,
            rows,
            details,
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    /// Generate JSON report
    fn generate_json(&self, report: &SuiteReport) -> String {
        serde_json::json!({
            "title": self.title,
            "name": self.name,
            "theme": self.theme_name(),
            "suite": report.suite,
            "status": if report.passed { "passed" } else { "failed" },
            "stats": {
                "total": report.stats.total,
                "passed": report.stats.passed,
                "failed": report.stats.failed,
                "error_rate": report.stats.error_rate(),
                "latency_ms": {
                    "avg": report.stats.avg_ms,
                    "min": report.stats.min_ms,
                    "max": report.stats.max_ms,
                    "p50": report.stats.p50_ms,
                    "p90": report.stats.p90_ms,
                    "p95": report.stats.p95_ms,
                    "p99": report.stats.p99_ms,
                },
            },
            "rows": report.rows,
            "generated_at": report.generated_at.to_rfc3339(),
        })
        .to_string()
    }
}
