//! Thresholds and the bound comparison every check is built on

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{CheckError, Result};
use crate::Status;

/// Which side of the bounds is unhealthy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Free memory, spare capacity: smaller values are worse
    LowIsBad,
    /// Temperature, counters, ages: bigger values are worse
    HighIsBad,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Direction::LowIsBad => f.write_str("<="),
            Direction::HighIsBad => f.write_str(">="),
        }
    }
}

/// A single threshold value as given on the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// In the units of the measurement
    Absolute(f64),
    /// A percentage of some total, resolved with [`Bound::resolve`]
    Percent(f64),
}

impl Bound {
    /// Convert to absolute units
    ///
    /// Percentages become `round(percent / 100 * total)`, and need a total.
    pub fn resolve(&self, total: Option<f64>) -> Result<f64> {
        match (*self, total) {
            (Bound::Absolute(v), _) => Ok(v),
            (Bound::Percent(p), Some(total)) => Ok((p / 100.0 * total).round()),
            (Bound::Percent(p), None) => Err(CheckError::config(format!(
                "threshold {}% needs a total to be resolved against",
                p
            ))),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Bound::Absolute(v) => write!(f, "{}", v),
            Bound::Percent(p) => write!(f, "{}%", p),
        }
    }
}

lazy_static! {
    static ref BOUND: Regex =
        Regex::new(r"^\s*(-?(?:[0-9]+\.?[0-9]*|\.[0-9]+))\s*(%|[kKmMgGtT](?:i?[bB])?)?\s*$")
            .unwrap();
}

impl FromStr for Bound {
    type Err = CheckError;

    /// Parse `80`, `12.5%`, or a binary size like `512M` or `2GiB`
    fn from_str(s: &str) -> Result<Bound> {
        let caps = BOUND
            .captures(s)
            .ok_or_else(|| CheckError::config(format!("invalid threshold '{}'", s)))?;
        let value: f64 = caps[1].parse()?;
        let suffix = caps.get(2).map(|m| m.as_str());
        let bound = match suffix {
            None => Bound::Absolute(value),
            Some("%") => Bound::Percent(value),
            Some(unit) => {
                let power = match unit.chars().next().map(|c| c.to_ascii_uppercase()) {
                    Some('K') => 1,
                    Some('M') => 2,
                    Some('G') => 3,
                    _ => 4,
                };
                Bound::Absolute(value * 1024f64.powi(power))
            }
        };
        match bound {
            Bound::Absolute(v) | Bound::Percent(v) if !v.is_finite() => Err(CheckError::config(
                format!("threshold '{}' is out of range", s.trim()),
            )),
            _ => Ok(bound),
        }
    }
}

/// Whether the warning bound is no stricter than the critical one
fn ordered(warning: f64, critical: f64, direction: Direction) -> bool {
    match direction {
        Direction::LowIsBad => warning >= critical,
        Direction::HighIsBad => warning <= critical,
    }
}

/// Compare a value against already-resolved bounds
///
/// Returns `Unknown` without looking at `value` if the warning bound is on
/// the wrong side of the critical bound, and for values that aren't finite.
/// Both bounds are inclusive.
pub fn evaluate_bound(
    value: f64,
    warning: Option<f64>,
    critical: f64,
    direction: Direction,
) -> Status {
    if let Some(warning) = warning {
        if !ordered(warning, critical, direction) {
            return Status::Unknown;
        }
    }
    if !value.is_finite() {
        return Status::Unknown;
    }
    let crosses = |bound: f64| match direction {
        Direction::LowIsBad => value <= bound,
        Direction::HighIsBad => value >= bound,
    };
    if crosses(critical) {
        Status::Critical
    } else if warning.map_or(false, crosses) {
        Status::Warning
    } else {
        Status::Ok
    }
}

/// A warning/critical pair for one measured quantity
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub warning: Option<Bound>,
    pub critical: Bound,
    pub direction: Direction,
}

impl Threshold {
    pub fn new(warning: Option<Bound>, critical: Bound, direction: Direction) -> Threshold {
        Threshold {
            warning,
            critical,
            direction,
        }
    }

    /// Build a threshold from command line strings
    pub fn parse(warning: Option<&str>, critical: &str, direction: Direction) -> Result<Threshold> {
        let warning = match warning {
            Some(w) => Some(w.parse()?),
            None => None,
        };
        Ok(Threshold::new(warning, critical.parse()?, direction))
    }

    /// Resolve both bounds to absolute units and validate their order
    pub fn resolve(&self, total: Option<f64>) -> Result<(Option<f64>, f64)> {
        let critical = self.critical.resolve(total)?;
        let warning = match self.warning {
            Some(w) => Some(w.resolve(total)?),
            None => None,
        };
        if let Some(w) = warning {
            if !ordered(w, critical, self.direction) {
                return Err(CheckError::config(format!(
                    "warning threshold {} is {} than critical threshold {}",
                    w,
                    match self.direction {
                        Direction::LowIsBad => "lower",
                        Direction::HighIsBad => "higher",
                    },
                    critical
                )));
            }
        }
        Ok((warning, critical))
    }

    /// Resolve, validate, and compare `value`
    pub fn evaluate(&self, value: f64, total: Option<f64>) -> Result<Status> {
        let (warning, critical) = self.resolve(total)?;
        if !value.is_finite() {
            return Err(CheckError::parse(format!(
                "measured value {} is not a number",
                value
            )));
        }
        Ok(evaluate_bound(value, warning, critical, self.direction))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(w) = self.warning {
            write!(f, "warning {} {}, ", self.direction, w)?;
        }
        write!(f, "critical {} {}", self.direction, self.critical)
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn low_is_bad() {
        use super::Direction::LowIsBad;
        assert_eq!(evaluate_bound(5.0, Some(20.0), 10.0, LowIsBad), Status::Critical);
        assert_eq!(evaluate_bound(10.0, Some(20.0), 10.0, LowIsBad), Status::Critical);
        assert_eq!(evaluate_bound(15.0, Some(20.0), 10.0, LowIsBad), Status::Warning);
        assert_eq!(evaluate_bound(20.0, Some(20.0), 10.0, LowIsBad), Status::Warning);
        assert_eq!(evaluate_bound(50.0, Some(20.0), 10.0, LowIsBad), Status::Ok);
        assert_eq!(evaluate_bound(15.0, None, 10.0, LowIsBad), Status::Ok);
    }

    #[test]
    fn high_is_bad() {
        use super::Direction::HighIsBad;
        assert_eq!(evaluate_bound(95.0, Some(80.0), 90.0, HighIsBad), Status::Critical);
        assert_eq!(evaluate_bound(85.0, Some(80.0), 90.0, HighIsBad), Status::Warning);
        assert_eq!(evaluate_bound(79.9, Some(80.0), 90.0, HighIsBad), Status::Ok);
        assert_eq!(evaluate_bound(0.0, None, 1.0, HighIsBad), Status::Ok);
        assert_eq!(evaluate_bound(1.0, None, 1.0, HighIsBad), Status::Critical);
    }

    #[test]
    fn misordered_bounds_are_unknown() {
        assert_eq!(
            evaluate_bound(50.0, Some(5.0), 10.0, Direction::LowIsBad),
            Status::Unknown
        );
        assert_eq!(
            evaluate_bound(0.0, Some(95.0), 90.0, Direction::HighIsBad),
            Status::Unknown
        );

        let threshold = Threshold::parse(Some("5"), "10", Direction::LowIsBad).unwrap();
        match threshold.evaluate(50.0, None) {
            Err(CheckError::Config(msg)) => {
                assert_eq!(msg, "warning threshold 5 is lower than critical threshold 10")
            }
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn nan_is_unknown() {
        assert_eq!(
            evaluate_bound(::std::f64::NAN, Some(5.0), 10.0, Direction::HighIsBad),
            Status::Unknown
        );
    }

    #[test]
    fn percentages_resolve_against_total() {
        let total = 8_000_000_000.0;
        let threshold = Threshold::parse(Some("10%"), "5%", Direction::LowIsBad).unwrap();
        assert_eq!(
            threshold.evaluate(total * 0.05, Some(total)).unwrap(),
            Status::Critical
        );
        assert_eq!(
            threshold.evaluate(total * 0.07, Some(total)).unwrap(),
            Status::Warning
        );
        assert_eq!(
            threshold.evaluate(total * 0.5, Some(total)).unwrap(),
            Status::Ok
        );
        assert_eq!(
            threshold.resolve(Some(1001.0)).unwrap(),
            (Some(100.0), 50.0)
        );
    }

    #[test]
    fn percentages_without_total_fail() {
        let threshold = Threshold::parse(None, "5%", Direction::LowIsBad).unwrap();
        assert!(threshold.evaluate(3.0, None).is_err());
    }

    #[test]
    fn parse_bounds() {
        assert_eq!("80".parse::<Bound>().unwrap(), Bound::Absolute(80.0));
        assert_eq!(" 12.5% ".parse::<Bound>().unwrap(), Bound::Percent(12.5));
        assert_eq!(
            "512M".parse::<Bound>().unwrap(),
            Bound::Absolute(536_870_912.0)
        );
        assert_eq!(
            "2GiB".parse::<Bound>().unwrap(),
            Bound::Absolute(2_147_483_648.0)
        );
        assert_eq!("-5".parse::<Bound>().unwrap(), Bound::Absolute(-5.0));
        assert!("".parse::<Bound>().is_err());
        assert!("ten".parse::<Bound>().is_err());
        assert!("10%%".parse::<Bound>().is_err());
    }

    #[test]
    fn huge_bounds_are_rejected() {
        let huge = "9".repeat(400);
        match huge.parse::<Bound>() {
            Err(CheckError::Config(msg)) => assert!(msg.ends_with("is out of range"), "{}", msg),
            other => panic!("expected a config error, got {:?}", other),
        }
        assert!(format!("{}T", "9".repeat(305)).parse::<Bound>().is_err());
    }

    #[test]
    fn display() {
        let threshold = Threshold::parse(Some("10%"), "5%", Direction::LowIsBad).unwrap();
        assert_eq!(threshold.to_string(), "warning <= 10%, critical <= 5%");
    }
}
