//! Check the number of threads against the kernel limit

use structopt::StructOpt;

use host_checks::error::Result;
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::procfs::{self, LoadAvg};
use host_checks::threshold::{Direction, Threshold};

/// Check how close the system is to running out of threads
///
/// The thread count is the number of scheduling entities from
/// /proc/loadavg, the limit is kernel.threads-max. Thresholds may be
/// absolute counts or a percent of the limit.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-threads (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        short = "w",
        long = "warning",
        help = "Warn at this many threads",
        default_value = "80%"
    )]
    warning: String,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Go critical at this many threads",
        default_value = "90%"
    )]
    critical: String,
    #[structopt(
        long = "show-hogs",
        name = "count",
        help = "Show <count> processes with the most threads.",
        default_value = "0"
    )]
    show_hogs: usize,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

fn do_check(args: &Args, load: &LoadAvg, threads_max: u64) -> Result<CheckOutcome> {
    let threshold = Threshold::parse(
        Some(args.warning.as_str()),
        &args.critical,
        Direction::HighIsBad,
    )?;
    let threads = load.threads as f64;
    let max = threads_max as f64;
    let mut measurements = Measurements::new();
    measurements.insert("threads", threads);

    let mut eval = Evaluation::new();
    eval.measure(&measurements, "threads", &threshold, Some(max));
    eval.detail(format!(
        "{} threads of {} allowed ({:.1}%)",
        load.threads,
        threads_max,
        threads / max * 100.0
    ));
    eval.perf("threads", threads);
    eval.perf("threads_max", max);
    Ok(eval.finish())
}

fn thread_hogs(count: usize) -> Vec<String> {
    let (mut procs, errors) = match procfs::processes() {
        Ok(loaded) => loaded,
        Err(e) => return vec![format!("unable to load processes: {}", e)],
    };
    procs.sort_by(|l, r| r.stat.num_threads.cmp(&l.stat.num_threads));
    let mut lines = vec!["thread hogs:".to_owned()];
    for process in procs.iter().take(count) {
        lines.push(format!(
            "[{:>6}] {:>6}: {}",
            process.stat.pid,
            process.stat.num_threads,
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
    harness::run("THREADS", args.verbose, || {
        let mut outcome = do_check(&args, &LoadAvg::load()?, procfs::threads_max()?)?;
        if args.show_hogs > 0 {
            outcome.details.extend(thread_hogs(args.show_hogs));
        }
        Ok(outcome)
    });
}
