//! Check for processes still using deleted shared libraries

use std::io;

use structopt::StructOpt;
use tracing::debug;

use host_checks::error::Result;
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::procfs::{self, pid};
use host_checks::threshold::{Direction, Threshold};
use host_checks::CheckError;

/// Check for processes that need a restart after a library upgrade
///
/// A process that maps a shared library which has since been deleted from
/// disk is still running the old code, and so any security fix in the new
/// version does not apply to it. Needs root to see every process.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-stale-libs (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        short = "w",
        long = "warning",
        help = "Warn at this many processes using deleted libraries",
        default_value = "1"
    )]
    warning: String,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Go critical at this many processes using deleted libraries",
        default_value = "50"
    )]
    critical: String,
    #[structopt(
        long = "max-listed",
        help = "List at most this many processes",
        default_value = "10"
    )]
    max_listed: usize,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

#[derive(Debug)]
struct StaleProcess {
    pid: i32,
    comm: String,
    libs: Vec<String>,
}

#[derive(Debug, Default)]
struct Scan {
    stale: Vec<StaleProcess>,
    /// Processes we were not allowed to look at
    unreadable: usize,
}

fn scan() -> Result<Scan> {
    let mut scan = Scan::default();
    for p in procfs::pids()? {
        let libs = match pid::deleted_libraries(p) {
            Ok(libs) => libs,
            Err(CheckError::Io(ref e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                scan.unreadable += 1;
                continue;
            }
            Err(e) => {
                // gone between listing /proc and reading it
                debug!(pid = p, error = %e, "skipping process");
                continue;
            }
        };
        if libs.is_empty() {
            continue;
        }
        let comm = pid::Stat::from_pid(p)
            .map(|stat| stat.comm)
            .unwrap_or_else(|_| "?".to_owned());
        scan.stale.push(StaleProcess { pid: p, comm, libs });
    }
    Ok(scan)
}

fn do_check(args: &Args, scan: &Scan) -> Result<CheckOutcome> {
    let threshold = Threshold::parse(
        Some(args.warning.as_str()),
        &args.critical,
        Direction::HighIsBad,
    )?;
    let count = scan.stale.len();
    let mut measurements = Measurements::new();
    measurements.insert("stale_processes", count as f64);

    let mut eval = Evaluation::new();
    eval.measure(&measurements, "stale_processes", &threshold, None);
    eval.detail(format!("{} processes use deleted libraries", count));
    for process in scan.stale.iter().take(args.max_listed) {
        eval.detail(format!(
            "[{}] {}: {}",
            process.pid,
            process.comm,
            process.libs.join(", ")
        ));
    }
    if count > args.max_listed {
        eval.detail(format!("... and {} more", count - args.max_listed));
    }
    if scan.unreadable > 0 {
        eval.detail(format!(
            "{} processes could not be read, run as root to see them",
            scan.unreadable
        ));
    }
    eval.perf("stale_processes", count as f64);
    Ok(eval.finish())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("STALE_LIBS", args.verbose, || do_check(&args, &scan()?));
}
