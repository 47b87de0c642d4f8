//! Check for failed systemd units

use std::time::Duration;

use regex::Regex;
use structopt::StructOpt;

use host_checks::command;
use host_checks::error::{CheckError, Result};
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::threshold::{Direction, Threshold};
use host_checks::Status;

/// Check for failed systemd units, and that required units are running
///
/// Reads the unit list from `systemctl list-units --all`. Any unit in the
/// failed state counts against the thresholds unless it matches --ignore.
/// Every --unit must exist and be active, otherwise the check is critical.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-systemd (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(short = "w", long = "warning", help = "Warn at this many failed units")]
    warning: Option<String>,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Go critical at this many failed units",
        default_value = "1"
    )]
    critical: String,
    #[structopt(
        long = "unit",
        help = "A unit that must be active, may be given multiple times"
    )]
    units: Vec<String>,
    #[structopt(long = "ignore", help = "Don't count failed units matching this regex")]
    ignore: Option<String>,
    #[structopt(
        long = "timeout",
        help = "Seconds to wait for systemctl",
        default_value = "10"
    )]
    timeout: u64,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

/// A row of `systemctl list-units`
#[derive(Debug, Clone, PartialEq)]
struct Unit {
    name: String,
    load: String,
    active: String,
    sub: String,
}

fn parse_list_units(output: &str) -> Result<Vec<Unit>> {
    let mut units = Vec::new();
    for line in output.lines() {
        // failed units get a bullet in front, even with --plain on some versions
        let mut fields = line
            .split_whitespace()
            .skip_while(|f| *f == "●" || *f == "*");
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(load), Some(active), Some(sub)) => units.push(Unit {
                name: name.to_owned(),
                load: load.to_owned(),
                active: active.to_owned(),
                sub: sub.to_owned(),
            }),
            (None, ..) => continue,
            _ => {
                return Err(CheckError::parse(format!(
                    "unexpected systemctl line '{}'",
                    line.trim()
                )))
            }
        }
    }
    Ok(units)
}

fn do_check(args: &Args, units: &[Unit]) -> Result<CheckOutcome> {
    let threshold = Threshold::parse(
        args.warning.as_ref().map(String::as_str),
        &args.critical,
        Direction::HighIsBad,
    )?;
    let ignore = match args.ignore {
        Some(ref pattern) => Some(Regex::new(pattern).map_err(|e| {
            CheckError::config(format!("invalid --ignore pattern: {}", e))
        })?),
        None => None,
    };

    let failed: Vec<&Unit> = units
        .iter()
        .filter(|u| u.active == "failed")
        .filter(|u| ignore.as_ref().map_or(true, |re| !re.is_match(&u.name)))
        .collect();

    let mut measurements = Measurements::new();
    measurements.insert("failed", failed.len() as f64);

    let mut eval = Evaluation::new();
    eval.measure(&measurements, "failed", &threshold, None);
    eval.detail(format!("{} of {} units failed", failed.len(), units.len()));
    for unit in &failed {
        eval.detail(format!("failed: {} ({})", unit.name, unit.sub));
    }

    for required in &args.units {
        match units.iter().find(|u| u.name == *required) {
            None => {
                eval.record(Status::Critical);
                eval.detail(format!("{} not found", required));
            }
            Some(unit) if unit.active != "active" => {
                eval.record(Status::Critical);
                eval.detail(format!(
                    "{} is {} ({}, {})",
                    unit.name, unit.active, unit.load, unit.sub
                ));
            }
            Some(_) => {
                eval.record(Status::Ok);
            }
        }
    }
    eval.perf("failed", failed.len() as f64);
    Ok(eval.finish())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("SYSTEMD", args.verbose, || {
        let output = command::run(
            "systemctl",
            &["list-units", "--all", "--plain", "--no-legend", "--no-pager"],
            Some(Duration::from_secs(args.timeout)),
        )?;
        do_check(&args, &parse_list_units(&output)?)
    });
}
