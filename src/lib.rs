//! Host checks: Linux health checks for Nagios-compatible monitoring
//!
//! Every binary in this crate inspects one facet of the host (memory, OOM
//! kills, kernel drift, firewall rules, systemd units, stale libraries, NVMe
//! health, sensors, threads, AppArmor, APT freshness) and reports it through
//! the same small model:
//!
//! * [`Status`] is the four-valued verdict, ordered by exit code
//! * [`threshold::Threshold`] describes when a measurement is bad
//! * [`outcome::Evaluation`] folds evaluations into one
//!   [`outcome::CheckOutcome`]
//! * [`harness::run`] prints the outcome and exits, turning anything that
//!   went wrong into `UNKNOWN`
//!
//! ```rust,no_run
//! use host_checks::outcome::{Evaluation, Measurements};
//! use host_checks::threshold::{Direction, Threshold};
//!
//! host_checks::harness::run("EXAMPLE", false, || {
//!     let mut measurements = Measurements::new();
//!     measurements.insert("widgets", 7.0);
//!     let threshold = Threshold::parse(Some("5"), "10", Direction::HighIsBad)?;
//!
//!     let mut eval = Evaluation::new();
//!     eval.measure(&measurements, "widgets", &threshold, None);
//!     eval.detail("7 widgets");
//!     eval.perf("widgets", 7.0);
//!     Ok(eval.finish())
//! });
//! ```
//!
//! The acquisition side lives in [`procfs`], [`sys`], [`command`] and
//! [`linux`]; everything in [`threshold`] and [`outcome`] is pure.

use std::fmt;
use std::process;
use std::str::FromStr;

use serde::Deserialize;

pub mod command;
pub mod error;
pub mod harness;
pub mod linux;
pub mod outcome;
pub mod procfs;
pub mod scripts;
pub mod sys;
pub mod threshold;

pub use crate::error::CheckError;

/// The result of a check
///
/// Variants are declared in exit code order, so the derived `Ord` makes
/// `max` pick the status that should win when several evaluations are
/// folded together.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Exit the process with the monitoring exit code for this status
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }

    /// OK=0, WARNING=1, CRITICAL=2, UNKNOWN=3
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    pub fn str_values() -> [&'static str; 4] {
        ["ok", "warning", "critical", "unknown"]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidStatus(String);

impl fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}', expected one of: {}",
            self.0,
            Status::str_values().join(", ")
        )
    }
}

impl std::error::Error for InvalidStatus {}

impl FromStr for Status {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Status, InvalidStatus> {
        match s.to_lowercase().as_ref() {
            "ok" => Ok(Status::Ok),
            "warning" | "warn" => Ok(Status::Warning),
            "critical" | "crit" => Ok(Status::Critical),
            "unknown" => Ok(Status::Unknown),
            _ => Err(InvalidStatus(s.to_owned())),
        }
    }
}
