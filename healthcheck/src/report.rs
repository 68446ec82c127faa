//! Outcomes of single checks and the [Report] they aggregate into

use std::{fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::error::HealthError;

/// Status of a single check, also used for the overall status of a [Report]
///
/// A report only ever carries [Status::Ok] or [Status::Fail] as overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The check passed
    Ok,
    /// The check signalled a deliberate failure
    Fail,
    /// The check did not finish within its effective timeout
    Timeout,
    /// The check hit a defect (panic or unclassified error)
    Error,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Fail => "fail",
            Status::Timeout => "timeout",
            Status::Error => "error",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of executing one check
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub(crate) name: String,
    pub(crate) status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub(crate) duration: Duration,
}

impl Outcome {
    pub fn new<S: Into<String>>(
        name: S,
        status: Status,
        detail: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            detail,
            duration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.status)
    }
}

/// Counts and timing over a whole run
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    /// fail + timeout + error
    pub failed: usize,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
}

/// Aggregated result of one run, ready for serialising as an http reply or CLI output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    status: Status,
    checks: Vec<Outcome>,
    summary: Summary,
}

impl Report {
    /// Reduce ordered outcomes into a report
    ///
    /// `expected` is the number of checks that were launched; a mismatch means outcomes were
    /// lost and is reported as a configuration defect rather than a silently healthy run.
    pub fn aggregate(
        outcomes: Vec<Outcome>,
        expected: usize,
        elapsed: Duration,
    ) -> Result<Report, HealthError> {
        if outcomes.len() != expected {
            return Err(HealthError::configuration(format!(
                "expected {} outcomes, got {}",
                expected,
                outcomes.len()
            )));
        }

        let passed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        let total = outcomes.len();
        let failed = total - passed;

        Ok(Report {
            status: if failed == 0 { Status::Ok } else { Status::Fail },
            checks: outcomes,
            summary: Summary {
                total,
                passed,
                failed,
                duration: elapsed,
            },
        })
    }

    /// Report for a run with nothing to check
    pub fn empty() -> Report {
        Report {
            status: Status::Ok,
            checks: vec![],
            summary: Summary {
                total: 0,
                passed: 0,
                failed: 0,
                duration: Duration::ZERO,
            },
        }
    }

    /// Drop every detail message, used when a caller asks for a report without details
    pub fn without_details(mut self) -> Report {
        for outcome in self.checks.iter_mut() {
            outcome.detail = None;
        }
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.checks
    }

    /// Lookup the outcome of a named check
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.checks.iter().find(|outcome| outcome.name == name)
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: [", self.status)?;

        let mut first = true;

        self.checks.iter().try_for_each(|outcome| {
            if first {
                first = false;
                write!(f, "{}", outcome)
            } else {
                write!(f, ",{}", outcome)
            }
        })?;

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: Status) -> Outcome {
        Outcome::new(
            name,
            status,
            Some(format!("{} detail", name)),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn empty_report_is_ok() {
        let report = Report::empty();
        assert!(report.is_ok());
        assert_eq!(report.summary().total, 0);
        assert_eq!(report.summary().passed, 0);
        assert_eq!(report.summary().failed, 0);
        assert_eq!(report, Report::aggregate(vec![], 0, Duration::ZERO).unwrap());
    }

    #[test]
    fn all_ok_is_ok() {
        let report = Report::aggregate(
            vec![outcome("a", Status::Ok), outcome("b", Status::Ok)],
            2,
            Duration::from_millis(12),
        )
        .unwrap();

        assert_eq!(report.status(), Status::Ok);
        assert_eq!(report.summary().total, 2);
        assert_eq!(report.summary().passed, 2);
        assert_eq!(report.summary().failed, 0);
        assert_eq!(report.summary().duration, Duration::from_millis(12));
    }

    #[test]
    fn any_non_ok_fails() {
        for bad in [Status::Fail, Status::Timeout, Status::Error] {
            let report = Report::aggregate(
                vec![outcome("a", Status::Ok), outcome("b", bad)],
                2,
                Duration::ZERO,
            )
            .unwrap();

            assert_eq!(report.status(), Status::Fail);
            assert_eq!(report.summary().passed, 1);
            assert_eq!(report.summary().failed, 1);
            assert_eq!(
                report.summary().passed + report.summary().failed,
                report.summary().total
            );
        }
    }

    #[test]
    fn order_is_preserved() {
        let report = Report::aggregate(
            vec![
                outcome("c", Status::Ok),
                outcome("a", Status::Fail),
                outcome("b", Status::Ok),
            ],
            3,
            Duration::ZERO,
        )
        .unwrap();

        let names: Vec<_> = report.outcomes().iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!("fail: [c/ok,a/fail,b/ok]", report.to_string());
    }

    #[test]
    fn missing_outcomes_are_rejected() {
        let reply = Report::aggregate(vec![], 2, Duration::ZERO);
        assert!(matches!(reply, Err(HealthError::Configuration(_))));
    }

    #[test]
    fn details_can_be_dropped() {
        let report = Report::aggregate(vec![outcome("a", Status::Fail)], 1, Duration::ZERO)
            .unwrap()
            .without_details();

        assert_eq!(report.outcome("a").unwrap().detail(), None);
        assert_eq!(report.outcome("a").unwrap().status(), Status::Fail);
    }

    #[test]
    fn serialises_to_json() {
        let report = Report::aggregate(
            vec![
                Outcome::new("db", Status::Ok, None, Duration::from_millis(250)),
                Outcome::new(
                    "cache",
                    Status::Timeout,
                    Some("exceeded 1s".to_string()),
                    Duration::from_secs(1),
                ),
            ],
            2,
            Duration::from_millis(1500),
        )
        .unwrap();

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "fail");
        assert_eq!(json["checks"][0]["name"], "db");
        assert_eq!(json["checks"][0]["status"], "ok");
        assert!(json["checks"][0].get("detail").is_none());
        assert_eq!(json["checks"][0]["duration"], 0.25);
        assert_eq!(json["checks"][1]["status"], "timeout");
        assert_eq!(json["checks"][1]["detail"], "exceeded 1s");
        assert_eq!(json["summary"]["total"], 2);
        assert_eq!(json["summary"]["passed"], 1);
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["summary"]["duration"], 1.5);
    }
}
