//! Check available memory and memory pressure

use structopt::StructOpt;

use host_checks::error::Result;
use host_checks::harness;
use host_checks::linux::bytes_to_human_size;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::procfs::{self, MemInfo, Pressure};
use host_checks::threshold::{Direction, Threshold};

/// Check the memory available to new work on this computer
///
/// Available memory is MemAvailable from /proc/meminfo (MemFree + Cached on
/// kernels that predate it). Thresholds are the minimum amount that must
/// stay available, either absolute (512M, 2G) or a percent of total memory.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-memory (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        short = "w",
        long = "warning",
        help = "Warn when available memory is at or below this",
        default_value = "10%"
    )]
    warning: String,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Go critical when available memory is at or below this",
        default_value = "5%"
    )]
    critical: String,
    #[structopt(
        long = "pressure-warning",
        help = "Warn when memory pressure (some avg10, percent) is at or above this"
    )]
    pressure_warning: Option<String>,
    #[structopt(
        long = "pressure-critical",
        help = "Go critical when memory pressure (some avg10, percent) is at or above this"
    )]
    pressure_critical: Option<String>,
    #[structopt(
        long = "show-hogs",
        name = "count",
        help = "Show <count> most ram-intensive processes.",
        default_value = "0"
    )]
    show_hogs: usize,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

fn do_check(args: &Args, mem: &MemInfo, pressure: Option<&Pressure>) -> Result<CheckOutcome> {
    let total = mem.total_bytes()? as f64;
    let available = mem.available_bytes()? as f64;

    let mut measurements = Measurements::new();
    measurements.insert("available", available);
    if let Some(p) = pressure {
        measurements.insert("pressure_some_avg10", p.some.avg10);
    }

    let mut eval = Evaluation::new();
    let threshold = Threshold::parse(
        Some(args.warning.as_str()),
        &args.critical,
        Direction::LowIsBad,
    )?;
    eval.measure(&measurements, "available", &threshold, Some(total));
    eval.detail(format!(
        "{} available of {} ({:.1}%)",
        bytes_to_human_size(available as u64).trim(),
        bytes_to_human_size(total as u64).trim(),
        available / total * 100.0
    ));
    eval.perf("available", available);
    eval.perf("total", total);

    if let Some(ref critical) = args.pressure_critical {
        let threshold = Threshold::parse(
            args.pressure_warning.as_ref().map(String::as_str),
            critical,
            Direction::HighIsBad,
        )?;
        eval.measure(&measurements, "pressure_some_avg10", &threshold, None);
    } else if args.pressure_warning.is_some() {
        eval.fail(host_checks::CheckError::config(
            "--pressure-warning needs --pressure-critical",
        ));
    }
    if let Some(p) = pressure {
        eval.detail(format!("memory pressure: some avg10={:.2}%", p.some.avg10));
        eval.perf("pressure_some_avg10", p.some.avg10);
    }
    Ok(eval.finish())
}

fn ram_hogs(count: usize, total: u64) -> Vec<String> {
    let (mut procs, errors) = match procfs::processes() {
        Ok(loaded) => loaded,
        Err(e) => return vec![format!("unable to load processes: {}", e)],
    };
    procs.sort_by(|l, r| r.stat.rss.cmp(&l.stat.rss));
    let mut lines = vec!["ram hogs:".to_owned()];
    for process in procs.iter().take(count) {
        lines.push(format!(
            "[{:>6}]{:>5.1}% {:>6}: {}",
            process.stat.pid,
            process.rss_bytes() as f64 / total as f64 * 100.0,
            bytes_to_human_size(process.rss_bytes()),
            process.useful_cmdline()
        ));
    }
    if !errors.is_empty() {
        lines.push(format!("({} processes could not be read)", errors.len()));
    }
    lines
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("MEMORY", args.verbose, || {
        let mem = MemInfo::load()?;
        // Pressure is only needed (and only required to exist) when asked for
        let pressure = if args.pressure_critical.is_some() {
            Some(Pressure::memory()?)
        } else {
            Pressure::memory().ok()
        };
        let mut outcome = do_check(&args, &mem, pressure.as_ref())?;
        if args.show_hogs > 0 {
            outcome
                .details
                .extend(ram_hogs(args.show_hogs, mem.total_bytes()?));
        }
        Ok(outcome)
    });
}
