//! Rendering of reports for the terminal

use std::fmt::Write;

use clap::ValueEnum;
use healthcheck::{Outcome, Report, Status};
use serde::{Serialize, Serializer};

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

/// How a report is printed
#[derive(Debug, Clone, Copy, Default)]
pub struct Render {
    pub format: OutputFormat,
    /// Durations and summary in JSON
    pub verbose: bool,
    /// Only the overall status
    pub quiet: bool,
}

impl Render {
    pub fn render(&self, report: &Report) -> Result<String, CliError> {
        if self.quiet {
            return Ok(report.status().to_string());
        }
        match self.format {
            OutputFormat::Json if self.verbose => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&Compact::new(report))?),
            OutputFormat::Table => Ok(table(report)),
        }
    }
}

/// JSON without timings: overall status, status per check and detail per check
#[derive(Serialize)]
struct Compact<'a> {
    status: Status,
    checks: Statuses<'a>,
    #[serde(skip_serializing_if = "Details::is_empty")]
    details: Details<'a>,
}

impl<'a> Compact<'a> {
    fn new(report: &'a Report) -> Self {
        Self {
            status: report.status(),
            checks: Statuses(report.outcomes()),
            details: Details(report.outcomes()),
        }
    }
}

/// Map of name to status, in report order
struct Statuses<'a>(&'a [Outcome]);

impl Serialize for Statuses<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|outcome| (outcome.name(), outcome.status())))
    }
}

/// Map of name to detail for checks that have one, in report order
struct Details<'a>(&'a [Outcome]);

impl Details<'_> {
    fn is_empty(&self) -> bool {
        self.0.iter().all(|outcome| outcome.detail().is_none())
    }
}

impl Serialize for Details<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .filter_map(|outcome| outcome.detail().map(|detail| (outcome.name(), detail))),
        )
    }
}

fn table(report: &Report) -> String {
    let width = report
        .outcomes()
        .iter()
        .map(|outcome| outcome.name().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "Health Check Results");
    let _ = writeln!(out, "{}", "=".repeat(50));
    for outcome in report.outcomes() {
        let marker = if outcome.is_ok() { "✓" } else { "✗" };
        let _ = writeln!(
            out,
            "{} {:<width$}  {}",
            marker,
            outcome.name(),
            outcome.status(),
            width = width
        );
        if let Some(detail) = outcome.detail() {
            let _ = writeln!(out, "  Details: {}", detail);
        }
    }

    let summary = report.summary();
    let _ = writeln!(out);
    let _ = writeln!(out, "Summary: {}", report.status().as_str().to_uppercase());
    let _ = write!(
        out,
        "Total: {}, Passed: {}, Failed: {}",
        summary.total, summary.passed, summary.failed
    );
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::*;

    fn report() -> Report {
        Report::aggregate(
            vec![
                Outcome::new(
                    "postgres_1",
                    Status::Ok,
                    None,
                    Duration::from_millis(12),
                ),
                Outcome::new(
                    "redis_2",
                    Status::Fail,
                    Some("Connection failure: refused".to_string()),
                    Duration::from_millis(3),
                ),
            ],
            2,
            Duration::from_millis(15),
        )
        .unwrap()
    }

    #[test]
    fn quiet_is_status_only() {
        let render = Render {
            quiet: true,
            format: OutputFormat::Table,
            ..Render::default()
        };
        assert_eq!(render.render(&report()).unwrap(), "fail");
    }

    #[test]
    fn compact_json() {
        let out = Render::default().render(&report()).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "fail",
                "checks": {"postgres_1": "ok", "redis_2": "fail"},
                "details": {"redis_2": "Connection failure: refused"},
            })
        );
        // checks keep report order
        assert!(out.find("postgres_1").unwrap() < out.find("redis_2").unwrap());
    }

    #[test]
    fn compact_json_without_details() {
        let out = Render::default()
            .render(&report().without_details())
            .unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert!(value.get("details").is_none());
        assert_eq!(value["checks"]["redis_2"], "fail");
    }

    #[test]
    fn verbose_json_is_full_report() {
        let render = Render {
            verbose: true,
            ..Render::default()
        };
        let value: Value = serde_json::from_str(&render.render(&report()).unwrap()).unwrap();
        assert_eq!(value["summary"]["total"], 2);
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["checks"][0]["name"], "postgres_1");
        assert_eq!(value["checks"][0]["duration"], 0.012);
    }

    #[test]
    fn table_lists_checks_and_summary() {
        let render = Render {
            format: OutputFormat::Table,
            ..Render::default()
        };
        let out = render.render(&report()).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Health Check Results");
        assert_eq!(lines[2], "✓ postgres_1  ok");
        assert_eq!(lines[3], "✗ redis_2     fail");
        assert_eq!(lines[4], "  Details: Connection failure: refused");
        assert_eq!(lines[6], "Summary: FAIL");
        assert_eq!(lines[7], "Total: 2, Passed: 1, Failed: 1");
    }
}
