//! Check NVMe drive health from the SMART log

use std::time::Duration;

use serde::Deserialize;
use structopt::StructOpt;

use host_checks::command;
use host_checks::error::{CheckError, Result};
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::sys::class::nvme;
use host_checks::threshold::{Direction, Threshold};
use host_checks::Status;

/// Check the health of NVMe drives
///
/// Runs `nvme smart-log DEVICE -o json` for every device (by default every
/// controller in /sys/class/nvme) and looks at the controller's critical
/// warning flags, wear, temperature, spare capacity and media errors.
/// Needs root and nvme-cli.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-nvme (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(help = "Devices to check, e.g. /dev/nvme0 [default: all controllers]")]
    devices: Vec<String>,
    #[structopt(
        long = "used-warning",
        help = "Warn when the drive's estimated wear (percent used) reaches this",
        default_value = "80"
    )]
    used_warning: String,
    #[structopt(
        long = "used-critical",
        help = "Go critical when percent used reaches this",
        default_value = "90"
    )]
    used_critical: String,
    #[structopt(
        long = "temp-warning",
        help = "Warn at this temperature, in Celsius",
        default_value = "60"
    )]
    temp_warning: String,
    #[structopt(
        long = "temp-critical",
        help = "Go critical at this temperature, in Celsius",
        default_value = "70"
    )]
    temp_critical: String,
    #[structopt(
        long = "timeout",
        help = "Seconds to wait for each nvme command",
        default_value = "10"
    )]
    timeout: u64,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

/// The fields of `nvme smart-log -o json` we look at
#[derive(Debug, Clone, Deserialize, PartialEq)]
struct SmartLog {
    critical_warning: u64,
    /// Composite temperature, in Kelvin
    temperature: f64,
    avail_spare: f64,
    spare_thresh: f64,
    percent_used: f64,
    #[serde(default)]
    media_errors: f64,
}

impl SmartLog {
    fn celsius(&self) -> f64 {
        self.temperature - 273.0
    }
}

/// `nvme0` from `/dev/nvme0`
fn short_name(device: &str) -> &str {
    device.rsplit('/').next().unwrap_or(device)
}

fn smart_log(device: &str, timeout: Duration) -> Result<SmartLog> {
    let output = command::run("nvme", &["smart-log", device, "-o", "json"], Some(timeout))?;
    Ok(serde_json::from_str(&output)?)
}

fn do_check(args: &Args, logs: Vec<(String, Result<SmartLog>)>) -> Result<CheckOutcome> {
    let used = Threshold::parse(
        Some(args.used_warning.as_str()),
        &args.used_critical,
        Direction::HighIsBad,
    )?;
    let temp = Threshold::parse(
        Some(args.temp_warning.as_str()),
        &args.temp_critical,
        Direction::HighIsBad,
    )?;

    let mut eval = Evaluation::new();
    if logs.is_empty() {
        eval.fail(CheckError::config("no NVMe devices found"));
    }
    let mut problems = Vec::new();
    for (device, log) in logs {
        let log = match log {
            Ok(log) => log,
            Err(e) => {
                eval.fail(e);
                continue;
            }
        };
        let name = short_name(&device);
        let mut measurements = Measurements::new();
        measurements.insert("percent_used", log.percent_used);
        measurements.insert("temperature", log.celsius());

        if log.critical_warning != 0 {
            eval.record(Status::Critical);
            problems.push(format!(
                "{}: critical warning flags 0x{:02x}",
                name, log.critical_warning
            ));
        }
        if eval.measure(&measurements, "percent_used", &used, None) != Status::Ok {
            problems.push(format!("{}: {}% of rated endurance used", name, log.percent_used));
        }
        if eval.measure(&measurements, "temperature", &temp, None) != Status::Ok {
            problems.push(format!("{}: temperature {}C ({})", name, log.celsius(), temp));
        }
        if log.avail_spare <= log.spare_thresh {
            eval.record(Status::Critical);
            problems.push(format!(
                "{}: available spare {}% at or below threshold {}%",
                name, log.avail_spare, log.spare_thresh
            ));
        } else {
            eval.record(Status::Ok);
        }
        if log.media_errors > 0.0 {
            eval.record(Status::Warning);
            problems.push(format!("{}: {} media errors", name, log.media_errors));
        }

        eval.detail(format!(
            "{}: {}C, {}% used, {}% spare",
            name,
            log.celsius(),
            log.percent_used,
            log.avail_spare
        ));
        eval.perf(format!("{}_temperature", name), log.celsius());
        eval.perf(format!("{}_percent_used", name), log.percent_used);
        eval.perf(format!("{}_avail_spare", name), log.avail_spare);
    }
    for problem in problems {
        eval.detail(problem);
    }
    Ok(eval.finish())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("NVME", args.verbose, || {
        let devices = if args.devices.is_empty() {
            nvme::controllers()?
        } else {
            args.devices.clone()
        };
        let timeout = Duration::from_secs(args.timeout);
        let logs = devices
            .into_iter()
            .map(|dev| {
                let log = smart_log(&dev, timeout);
                (dev, log)
            })
            .collect();
        do_check(&args, logs)
    });
}
