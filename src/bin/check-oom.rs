//! Check for processes killed by the OOM killer

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use structopt::StructOpt;

use host_checks::command;
use host_checks::error::Result;
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::procfs::VmStat;
use host_checks::threshold::{Direction, Threshold};

/// Check how many processes the kernel's OOM killer has killed since boot
///
/// The count comes from the oom_kill counter in /proc/vmstat, available on
/// kernels 4.13 and newer.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-oom (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(short = "w", long = "warning", help = "Warn at this many OOM kills")]
    warning: Option<String>,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Go critical at this many OOM kills",
        default_value = "1"
    )]
    critical: String,
    #[structopt(
        long = "show-victims",
        help = "List killed processes from the kernel log (runs dmesg)"
    )]
    show_victims: bool,
    #[structopt(
        long = "timeout",
        help = "Seconds to wait for dmesg",
        default_value = "10"
    )]
    timeout: u64,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

/// A process the OOM killer chose
#[derive(Debug, PartialEq)]
struct Victim {
    pid: u32,
    name: String,
}

lazy_static! {
    // "Out of memory: Killed process 1234 (java) total-vm:..." on current
    // kernels, "Kill process 1234 (java) score 900 or sacrifice child" on
    // older ones.
    static ref KILLED: Regex = Regex::new(r"Kill(?:ed)? process (\d+) \(([^)]*)\)").unwrap();
}

fn parse_victims(kernel_log: &str) -> Vec<Victim> {
    kernel_log
        .lines()
        .filter_map(|line| KILLED.captures(line))
        .filter_map(|caps| {
            Some(Victim {
                pid: caps[1].parse().ok()?,
                name: caps[2].to_owned(),
            })
        })
        .collect()
}

fn do_check(args: &Args, vmstat: &VmStat) -> Result<CheckOutcome> {
    let threshold = Threshold::parse(
        args.warning.as_ref().map(String::as_str),
        &args.critical,
        Direction::HighIsBad,
    )?;

    let mut eval = Evaluation::new();
    match vmstat.oom_kills() {
        Ok(kills) => {
            let mut measurements = Measurements::new();
            measurements.insert("oom_kills", kills as f64);
            eval.measure(&measurements, "oom_kills", &threshold, None);
            eval.detail(format!("{} processes killed by the OOM killer since boot", kills));
            eval.perf("oom_kills", kills as f64);
        }
        // kernels before 4.13 don't count
        Err(e) => eval.fail(e),
    }
    Ok(eval.finish())
}

fn victim_lines(timeout: Duration) -> Vec<String> {
    match command::run("dmesg", &[], Some(timeout)) {
        Ok(log) => parse_victims(&log)
            .into_iter()
            .map(|v| format!("killed: {}[{}]", v.name, v.pid))
            .collect(),
        Err(e) => vec![format!("unable to read the kernel log: {}", e)],
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("OOM", args.verbose, || {
        let vmstat = VmStat::load()?;
        let mut outcome = do_check(&args, &vmstat)?;
        if args.show_victims {
            outcome
                .details
                .extend(victim_lines(Duration::from_secs(args.timeout)));
        }
        Ok(outcome)
    });
}
