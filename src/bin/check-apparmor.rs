//! Check that AppArmor is enabled and confining what it should

use std::io;

use regex::Regex;
use structopt::StructOpt;
use tracing::debug;

use host_checks::error::{CheckError, Result};
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::procfs::{self, pid};
use host_checks::sys::apparmor::{self, Confinement, Profile};
use host_checks::threshold::{Bound, Direction, Threshold};
use host_checks::Status;

/// Check AppArmor is enabled, its profiles are enforced, and that
/// processes are confined
///
/// Needs root to read the loaded profiles from securityfs.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-apparmor (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        long = "complain-status",
        help = "Status when any profile is in complain mode: ok, warning, critical or unknown",
        default_value = "ok"
    )]
    complain_status: Status,
    #[structopt(
        long = "min-enforce",
        help = "Go critical with fewer than this many profiles in enforce mode"
    )]
    min_enforce: Option<u64>,
    #[structopt(
        long = "process",
        help = "Processes whose name matches this regex must be confined, may be given multiple times"
    )]
    processes: Vec<String>,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

#[derive(Debug)]
struct ConfinedProcess {
    pid: i32,
    comm: String,
    confinement: Confinement,
}

#[derive(Debug)]
struct AppArmorState {
    enabled: bool,
    profiles: Vec<Profile>,
    processes: Vec<ConfinedProcess>,
}

fn load_state(want_processes: bool) -> Result<AppArmorState> {
    let enabled = match apparmor::enabled() {
        Ok(enabled) => enabled,
        // module not built in
        Err(CheckError::Io(ref e)) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };
    if !enabled {
        return Ok(AppArmorState {
            enabled,
            profiles: Vec::new(),
            processes: Vec::new(),
        });
    }
    let mut processes = Vec::new();
    if want_processes {
        for p in procfs::pids()? {
            let read = pid::Stat::from_pid(p).and_then(|stat| {
                let label = pid::security_label(p)?;
                Ok((stat.comm, label.parse::<Confinement>()?))
            });
            match read {
                Ok((comm, confinement)) => processes.push(ConfinedProcess {
                    pid: p,
                    comm,
                    confinement,
                }),
                Err(e) => debug!(pid = p, error = %e, "skipping process"),
            }
        }
    }
    Ok(AppArmorState {
        enabled,
        profiles: apparmor::profiles()?,
        processes,
    })
}

fn in_mode<'a>(profiles: &'a [Profile], mode: &str) -> Vec<&'a Profile> {
    profiles.iter().filter(|p| p.mode == mode).collect()
}

fn do_check(args: &Args, state: &AppArmorState) -> Result<CheckOutcome> {
    let patterns = args
        .processes
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| CheckError::config(format!("invalid --process pattern: {}", e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut eval = Evaluation::new();
    if !state.enabled {
        eval.record(Status::Critical);
        eval.detail("AppArmor is disabled");
        return Ok(eval.finish());
    }

    let enforce = in_mode(&state.profiles, "enforce");
    let complain = in_mode(&state.profiles, "complain");
    eval.detail(format!(
        "{} profiles loaded: {} enforce, {} complain",
        state.profiles.len(),
        enforce.len(),
        complain.len()
    ));

    if complain.is_empty() {
        eval.record(Status::Ok);
    } else if eval.record(args.complain_status) != Status::Ok {
        for profile in &complain {
            eval.detail(format!("complain: {}", profile.name));
        }
    }

    if let Some(min) = args.min_enforce {
        let mut measurements = Measurements::new();
        measurements.insert("enforce", enforce.len() as f64);
        // "fewer than min" on whole counts
        let threshold = Threshold::new(None, Bound::Absolute(min as f64 - 1.0), Direction::LowIsBad);
        if eval.measure(&measurements, "enforce", &threshold, None) != Status::Ok {
            eval.detail(format!(
                "only {} profiles enforced, expected at least {}",
                enforce.len(),
                min
            ));
        }
    }

    for pattern in &patterns {
        let matching: Vec<&ConfinedProcess> = state
            .processes
            .iter()
            .filter(|p| pattern.is_match(&p.comm))
            .collect();
        if matching.is_empty() {
            eval.detail(format!("no process matches '{}'", pattern));
        }
        for process in matching {
            match process.confinement {
                Confinement::Unconfined => {
                    eval.record(Status::Critical);
                    eval.detail(format!("[{}] {} is unconfined", process.pid, process.comm));
                }
                Confinement::Profile { .. } => {
                    eval.record(Status::Ok);
                }
            }
        }
    }

    eval.perf("enforce", enforce.len() as f64);
    eval.perf("complain", complain.len() as f64);
    Ok(eval.finish())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("APPARMOR", args.verbose, || {
        do_check(&args, &load_state(!args.processes.is_empty())?)
    });
}

#[cfg(test)]
mod unit {
    use structopt::StructOpt;

    use host_checks::sys::apparmor::{Confinement, Profile};
    use host_checks::Status;

    use super::{do_check, AppArmorState, Args, ConfinedProcess};

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    const PROFILES: &str = "\
/usr/sbin/cupsd (enforce)
/usr/sbin/ntpd (enforce)
/usr/bin/man (enforce)
snap.firefox.firefox (complain)
lsb_release (enforce)
";

    fn state() -> AppArmorState {
        AppArmorState {
            enabled: true,
            profiles: PROFILES
                .lines()
                .map(|l| l.parse::<Profile>().unwrap())
                .collect(),
            processes: vec![
                ConfinedProcess {
                    pid: 812,
                    comm: "ntpd".to_owned(),
                    confinement: "/usr/sbin/ntpd (enforce)".parse().unwrap(),
                },
                ConfinedProcess {
                    pid: 901,
                    comm: "nginx".to_owned(),
                    confinement: Confinement::Unconfined,
                },
            ],
        }
    }

    #[test]
    fn usage_is_valid() {
        let args = build_args(vec!["check-apparmor"]);
        assert_eq!(args.complain_status, Status::Ok);
        assert_eq!(args.min_enforce, None);
        let args = build_args(vec![
            "check-apparmor",
            "--complain-status",
            "warning",
            "--min-enforce",
            "3",
            "--process",
            "^ntpd$",
        ]);
        assert_eq!(args.complain_status, Status::Warning);
        assert_eq!(args.min_enforce, Some(3));
        assert_eq!(args.processes, ["^ntpd$"]);
    }

    #[test]
    fn enabled_with_profiles_is_ok() {
        let args = build_args(vec!["check-apparmor"]);
        let outcome = do_check(&args, &state()).unwrap();
        assert_eq!(
            outcome.render("APPARMOR"),
            "APPARMOR OK - 5 profiles loaded: 4 enforce, 1 complain | enforce=4, complain=1"
        );
    }

    #[test]
    fn disabled_is_critical() {
        let args = build_args(vec!["check-apparmor"]);
        let disabled = AppArmorState {
            enabled: false,
            profiles: vec![],
            processes: vec![],
        };
        assert_eq!(
            do_check(&args, &disabled).unwrap().render("APPARMOR"),
            "APPARMOR CRITICAL - AppArmor is disabled"
        );
    }

    #[test]
    fn complain_mode_status() {
        let args = build_args(vec!["check-apparmor", "--complain-status", "warning"]);
        let outcome = do_check(&args, &state()).unwrap();
        assert_eq!(outcome.status, Status::Warning);
        assert_eq!(outcome.details[1], "complain: snap.firefox.firefox");
    }

    #[test]
    fn minimum_enforced_profiles() {
        let args = build_args(vec!["check-apparmor", "--min-enforce", "4"]);
        assert_eq!(do_check(&args, &state()).unwrap().status, Status::Ok);

        let args = build_args(vec!["check-apparmor", "--min-enforce", "5"]);
        let outcome = do_check(&args, &state()).unwrap();
        assert_eq!(outcome.status, Status::Critical);
        assert_eq!(
            outcome.details[1],
            "only 4 profiles enforced, expected at least 5"
        );
    }

    #[test]
    fn processes_must_be_confined() {
        let args = build_args(vec!["check-apparmor", "--process", "^ntpd$"]);
        assert_eq!(do_check(&args, &state()).unwrap().status, Status::Ok);

        let args = build_args(vec![
            "check-apparmor",
            "--process",
            "^ntpd$",
            "--process",
            "^nginx",
            "--process",
            "^postgres",
        ]);
        let outcome = do_check(&args, &state()).unwrap();
        assert_eq!(outcome.status, Status::Critical);
        assert_eq!(
            outcome.details[1..],
            ["[901] nginx is unconfined", "no process matches '^postgres'"]
        );
    }
}
