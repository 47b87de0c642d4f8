//! Check whether the running kernel is the newest one installed

use std::io;
use std::path::Path;

use structopt::StructOpt;
use tracing::debug;

use host_checks::error::{CheckError, Result};
use host_checks::harness;
use host_checks::linux::KernelVersion;
use host_checks::outcome::{CheckOutcome, Evaluation};
use host_checks::Status;

const MODULES_DIR: &str = "/lib/modules";
const REBOOT_REQUIRED: &str = "/var/run/reboot-required";
const REBOOT_REQUIRED_PKGS: &str = "/var/run/reboot-required.pkgs";

/// Check that the host is running the newest installed kernel
///
/// The running release comes from uname(2), installed releases are the
/// directories of /lib/modules. A pending reboot flagged by the package
/// manager in /var/run/reboot-required is reported the same way.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-kernel (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        long = "outdated-status",
        help = "Status when a newer kernel is installed or a reboot is required: ok, warning, critical or unknown",
        default_value = "warning"
    )]
    outdated_status: Status,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

/// Everything the check looks at, read up front
#[derive(Debug)]
struct KernelState {
    running: KernelVersion,
    installed: Vec<KernelVersion>,
    /// Packages asking for a reboot, `Some` when a reboot is required
    reboot_required: Option<Vec<String>>,
}

fn installed_kernels_in<P: AsRef<Path>>(dir: P) -> Result<Vec<KernelVersion>> {
    let mut kernels = Vec::new();
    for entry in dir.as_ref().read_dir()? {
        let name = entry?.file_name();
        match name.to_str().map(str::parse::<KernelVersion>) {
            Some(Ok(version)) => kernels.push(version),
            _ => debug!(?name, "not a kernel release"),
        }
    }
    kernels.sort();
    Ok(kernels)
}

fn reboot_required_in<P: AsRef<Path>>(flag: P, pkgs: P) -> Result<Option<Vec<String>>> {
    if !flag.as_ref().exists() {
        return Ok(None);
    }
    match std::fs::read_to_string(pkgs) {
        Ok(contents) => Ok(Some(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        )),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(Some(Vec::new())),
        Err(e) => Err(e.into()),
    }
}

fn running_kernel() -> Result<KernelVersion> {
    let uts = nix::sys::utsname::uname().map_err(io::Error::from)?;
    uts.release().to_string_lossy().parse()
}

fn do_check(args: &Args, state: &KernelState) -> Result<CheckOutcome> {
    let mut eval = Evaluation::new();

    // only a kernel of the same flavour can replace the running one
    let newest = state
        .installed
        .iter()
        .filter(|k| k.flavour() == state.running.flavour())
        .max();
    match newest {
        Some(newest) if *newest > state.running => {
            eval.record(args.outdated_status);
            eval.detail(format!(
                "running {} but {} is installed",
                state.running, newest
            ));
        }
        Some(_) => {
            eval.record(Status::Ok);
            eval.detail(format!("running {}, the newest installed kernel", state.running));
        }
        None => eval.fail(CheckError::MissingMeasurement(format!(
            "kernel releases like {} in {}",
            state.running, MODULES_DIR
        ))),
    }

    if let Some(ref pkgs) = state.reboot_required {
        eval.record(args.outdated_status);
        if pkgs.is_empty() {
            eval.detail("reboot required");
        } else {
            eval.detail(format!("reboot required by: {}", pkgs.join(", ")));
        }
    }
    Ok(eval.finish())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("KERNEL", args.verbose, || {
        let state = KernelState {
            running: running_kernel()?,
            installed: installed_kernels_in(MODULES_DIR)?,
            reboot_required: reboot_required_in(REBOOT_REQUIRED, REBOOT_REQUIRED_PKGS)?,
        };
        do_check(&args, &state)
    });
}
