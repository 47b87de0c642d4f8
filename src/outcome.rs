//! Folding evaluations into the single result a check reports
//!
//! The usual shape of a check is:
//!
//! ```rust
//! use host_checks::outcome::{Evaluation, Measurements};
//! use host_checks::threshold::{Direction, Threshold};
//! use host_checks::Status;
//!
//! let mut measurements = Measurements::new();
//! measurements.insert("free", 536870912.0);
//! let threshold = Threshold::parse(Some("256M"), "128M", Direction::LowIsBad).unwrap();
//!
//! let mut eval = Evaluation::new();
//! eval.measure(&measurements, "free", &threshold, None);
//! eval.detail("512M free");
//! eval.perf("free", 536870912.0);
//! let outcome = eval.finish();
//!
//! assert_eq!(outcome.status, Status::Ok);
//! assert_eq!(outcome.render("MEMORY"), "MEMORY OK - 512M free | free=536870912");
//! ```

use std::fmt;

use itertools::Itertools;

use crate::error::{CheckError, Result};
use crate::threshold::Threshold;
use crate::Status;

/// The worst of `statuses`
///
/// An empty slice means nothing was checked, which is reported as an error
/// rather than a silent `Ok`.
pub fn combine(statuses: &[Status]) -> Result<Status> {
    statuses.iter().cloned().max().ok_or(CheckError::NoChecks)
}

/// Performance data, in the order it was added
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfData(Vec<(String, f64)>);

impl PerfData {
    pub fn new() -> PerfData {
        PerfData(Vec::new())
    }

    pub fn push<S: Into<String>>(&mut self, key: S, value: f64) {
        self.0.push((key.into(), value));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>> std::iter::FromIterator<(K, f64)> for PerfData {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> PerfData {
        PerfData(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .join(", ");
        f.write_str(&rendered)
    }
}

/// Build the text a check prints
///
/// The first line is `NAME STATUS`, followed by ` - first detail` and
/// ` | perf=data` when present. Any further detail lines come after it as
/// they are.
pub fn format_message(
    check_name: &str,
    status: Status,
    details: &[String],
    perf: &PerfData,
) -> String {
    let mut out = format!("{} {}", check_name, status);
    if let Some(first) = details.first() {
        out.push_str(" - ");
        out.push_str(first);
    }
    if !perf.is_empty() {
        out.push_str(" | ");
        out.push_str(&perf.to_string());
    }
    for line in details.iter().skip(1) {
        out.push('\n');
        out.push_str(line);
    }
    out
}

/// Named values read from the host
#[derive(Debug, Clone, Default)]
pub struct Measurements(Vec<(String, f64)>);

impl Measurements {
    pub fn new() -> Measurements {
        Measurements(Vec::new())
    }

    /// Add or replace a value
    pub fn insert<S: Into<String>>(&mut self, name: S, value: f64) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| CheckError::MissingMeasurement(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

/// The final result of one check invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub status: Status,
    pub details: Vec<String>,
    pub perf: PerfData,
}

impl CheckOutcome {
    pub fn new(status: Status, details: Vec<String>, perf: PerfData) -> CheckOutcome {
        CheckOutcome {
            status,
            details,
            perf,
        }
    }

    pub fn unknown<S: Into<String>>(msg: S) -> CheckOutcome {
        CheckOutcome::new(Status::Unknown, vec![msg.into()], PerfData::new())
    }

    pub fn from_error(err: &CheckError) -> CheckOutcome {
        CheckOutcome::unknown(format!("{}: {}", err.kind(), err))
    }

    pub fn render(&self, check_name: &str) -> String {
        format_message(check_name, self.status, &self.details, &self.perf)
    }
}

/// Accumulates statuses, errors, details and perf data for one check
#[derive(Debug, Default)]
pub struct Evaluation {
    statuses: Vec<Status>,
    errors: Vec<CheckError>,
    details: Vec<String>,
    perf: PerfData,
}

impl Evaluation {
    pub fn new() -> Evaluation {
        Evaluation::default()
    }

    /// Look up `name` and evaluate it against `threshold`
    ///
    /// Failures are recorded and force the outcome to `Unknown`; the
    /// returned status is `Unknown` in that case.
    pub fn measure(
        &mut self,
        measurements: &Measurements,
        name: &str,
        threshold: &Threshold,
        total: Option<f64>,
    ) -> Status {
        let evaluated = measurements
            .get(name)
            .and_then(|value| threshold.evaluate(value, total));
        self.check(evaluated)
    }

    /// Record the result of some evaluation done elsewhere
    pub fn check(&mut self, evaluated: Result<Status>) -> Status {
        match evaluated {
            Ok(status) => self.record(status),
            Err(e) => {
                self.fail(e);
                Status::Unknown
            }
        }
    }

    pub fn record(&mut self, status: Status) -> Status {
        self.statuses.push(status);
        status
    }

    pub fn fail(&mut self, err: CheckError) {
        self.errors.push(err);
    }

    pub fn detail<S: Into<String>>(&mut self, line: S) {
        self.details.push(line.into());
    }

    pub fn perf<S: Into<String>>(&mut self, key: S, value: f64) {
        self.perf.push(key, value);
    }

    /// The status so far, ignoring recorded errors
    pub fn status(&self) -> Status {
        combine(&self.statuses).unwrap_or(Status::Ok)
    }

    pub fn finish(self) -> CheckOutcome {
        let Evaluation {
            statuses,
            errors,
            details,
            perf,
        } = self;
        if !errors.is_empty() {
            let mut lines: Vec<String> = errors
                .iter()
                .map(|e| format!("{}: {}", e.kind(), e))
                .collect();
            lines.extend(details);
            return CheckOutcome::new(Status::Unknown, lines, perf);
        }
        match combine(&statuses) {
            Ok(status) => CheckOutcome::new(status, details, perf),
            Err(e) => {
                let mut lines = vec![format!("{}: {}", e.kind(), e)];
                lines.extend(details);
                CheckOutcome::new(Status::Unknown, lines, perf)
            }
        }
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::threshold::Direction;

    #[test]
    fn combine_picks_worst() {
        use crate::Status::*;
        assert_eq!(combine(&[Ok, Warning, Ok]).unwrap(), Warning);
        assert_eq!(combine(&[Ok, Critical, Warning]).unwrap(), Critical);
        assert_eq!(combine(&[Critical, Unknown]).unwrap(), Unknown);
        match combine(&[]) {
            Err(CheckError::NoChecks) => {}
            other => panic!("expected NoChecks, got {:?}", other),
        }
        assert_eq!(CheckError::NoChecks.to_string(), "no checks configured");
    }

    #[test]
    fn message_with_detail_and_perf() {
        let perf: PerfData = vec![("free", 536870912.0)].into_iter().collect();
        assert_eq!(
            format_message("MEMORY", Status::Ok, &["512M free".to_owned()], &perf),
            "MEMORY OK - 512M free | free=536870912"
        );
    }

    #[test]
    fn message_variants() {
        assert_eq!(
            format_message("APT", Status::Critical, &[], &PerfData::new()),
            "APT CRITICAL"
        );
        let perf: PerfData = vec![("a", 1.0), ("b", 0.5)].into_iter().collect();
        assert_eq!(
            format_message("X", Status::Warning, &[], &perf),
            "X WARNING | a=1, b=0.5"
        );
        let details = vec![
            "2 units failed".to_owned(),
            "foo.service".to_owned(),
            "  bar.service".to_owned(),
        ];
        assert_eq!(
            format_message("SYSTEMD", Status::Critical, &details, &PerfData::new()),
            "SYSTEMD CRITICAL - 2 units failed\nfoo.service\n  bar.service"
        );
    }

    #[test]
    fn missing_measurement_is_unknown() {
        let threshold = Threshold::parse(None, "1", Direction::HighIsBad).unwrap();
        let mut eval = Evaluation::new();
        eval.record(Status::Ok);
        assert_eq!(
            eval.measure(&Measurements::new(), "oom_kills", &threshold, None),
            Status::Unknown
        );
        let outcome = eval.finish();
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(
            outcome.details,
            ["evaluation error: missing measurement 'oom_kills'"]
        );
    }

    #[test]
    fn errors_win_over_critical() {
        let mut eval = Evaluation::new();
        eval.record(Status::Critical);
        eval.detail("disk on fire");
        eval.fail(CheckError::config("invalid threshold 'x'"));
        let outcome = eval.finish();
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(
            outcome.details,
            [
                "configuration error: invalid threshold 'x'",
                "disk on fire"
            ]
        );
    }

    #[test]
    fn nothing_recorded_is_unknown() {
        let outcome = Evaluation::new().finish();
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(outcome.render("EMPTY"), "EMPTY UNKNOWN - evaluation error: no checks configured");
    }

    #[test]
    fn measurements_replace_and_keep_order() {
        let mut m = Measurements::new();
        m.insert("a", 1.0);
        m.insert("b", 2.0);
        m.insert("a", 3.0);
        assert_eq!(m.iter().collect::<Vec<_>>(), [("a", 3.0), ("b", 2.0)]);
        assert_eq!(m.get("b").unwrap(), 2.0);
    }
}
