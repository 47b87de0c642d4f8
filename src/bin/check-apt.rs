//! Check how long ago the apt package lists were updated

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use structopt::StructOpt;
use tracing::debug;

use host_checks::error::{CheckError, Result};
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::threshold::{Direction, Threshold};

const LISTS_DIR: &str = "/var/lib/apt/lists";
const SUCCESS_STAMP: &str = "/var/lib/apt/periodic/update-success-stamp";

/// Check that `apt-get update` has run recently
///
/// The age is taken from the newest file in /var/lib/apt/lists, or from
/// the periodic update-success-stamp when that is newer. Thresholds are in
/// hours.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-apt (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        short = "w",
        long = "warning",
        help = "Warn when the lists are this many hours old",
        default_value = "48"
    )]
    warning: String,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Go critical when the lists are this many hours old",
        default_value = "168"
    )]
    critical: String,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

fn modified(path: &Path) -> io::Result<DateTime<Utc>> {
    Ok(DateTime::from(fs::metadata(path)?.modified()?))
}

/// When the package lists were last refreshed, `None` if there are none
fn last_update_in<P: AsRef<Path>>(lists: P, stamp: P) -> Result<Option<DateTime<Utc>>> {
    let mut newest: Option<DateTime<Utc>> = None;
    for entry in fs::read_dir(lists)? {
        let entry = entry?;
        if entry.file_name() == "lock" || !entry.file_type()?.is_file() {
            continue;
        }
        let mtime = modified(&entry.path())?;
        newest = newest.max(Some(mtime));
    }
    if newest.is_none() {
        return Ok(None);
    }
    match modified(stamp.as_ref()) {
        Ok(mtime) => {
            debug!(%mtime, "update-success-stamp");
            Ok(newest.max(Some(mtime)))
        }
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(newest),
        Err(e) => Err(e.into()),
    }
}

fn do_check(args: &Args, last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<CheckOutcome> {
    let threshold = Threshold::parse(
        Some(args.warning.as_str()),
        &args.critical,
        Direction::HighIsBad,
    )?;
    let mut eval = Evaluation::new();
    let last_update = match last_update {
        Some(t) => t,
        None => {
            eval.fail(CheckError::MissingMeasurement(format!(
                "package lists in {}",
                LISTS_DIR
            )));
            return Ok(eval.finish());
        }
    };
    let hours = ((now - last_update).num_seconds() as f64 / 3600.0 * 100.0).round() / 100.0;
    let mut measurements = Measurements::new();
    measurements.insert("age_hours", hours);
    eval.measure(&measurements, "age_hours", &threshold, None);
    eval.detail(format!(
        "package lists updated {:.1} hours ago ({})",
        hours,
        last_update.format("%Y-%m-%d %H:%M UTC")
    ));
    eval.perf("age_hours", hours);
    Ok(eval.finish())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("APT", args.verbose, || {
        do_check(&args, last_update_in(LISTS_DIR, SUCCESS_STAMP)?, Utc::now())
    });
}

#[cfg(test)]
mod unit {
    use std::fs;

    use chrono::{Duration, TimeZone, Utc};
    use structopt::StructOpt;

    use host_checks::Status;

    use super::{do_check, last_update_in, Args};

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    #[test]
    fn usage_is_valid() {
        let args = build_args(vec!["check-apt"]);
        assert_eq!(args.warning, "48");
        assert_eq!(args.critical, "168");
        let args = build_args(vec!["check-apt", "-w", "24", "-c", "72"]);
        assert_eq!(args.critical, "72");
    }

    #[test]
    fn age_thresholds() {
        let args = build_args(vec!["check-apt"]);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let outcome = do_check(&args, Some(now - Duration::minutes(330)), now).unwrap();
        assert_eq!(
            outcome.render("APT"),
            "APT OK - package lists updated 5.5 hours ago (2024-03-01 06:30 UTC) | age_hours=5.5"
        );
        let outcome = do_check(&args, Some(now - Duration::hours(48)), now).unwrap();
        assert_eq!(outcome.status, Status::Warning);
        let outcome = do_check(&args, Some(now - Duration::days(30)), now).unwrap();
        assert_eq!(outcome.status, Status::Critical);
    }

    #[test]
    fn no_lists_is_unknown() {
        let args = build_args(vec!["check-apt"]);
        let outcome = do_check(&args, None, Utc::now()).unwrap();
        assert_eq!(
            outcome.render("APT"),
            "APT UNKNOWN - evaluation error: missing measurement 'package lists in /var/lib/apt/lists'"
        );
    }

    #[test]
    fn finds_newest_list() {
        let dir = tempfile::tempdir().unwrap();
        let lists = dir.path().join("lists");
        let stamp = dir.path().join("update-success-stamp");
        fs::create_dir_all(lists.join("partial")).unwrap();
        fs::write(lists.join("lock"), "").unwrap();
        assert_eq!(last_update_in(&lists, &stamp).unwrap(), None);

        fs::write(
            lists.join("deb.debian.org_debian_dists_bookworm_InRelease"),
            "Origin: Debian\n",
        )
        .unwrap();
        let updated = last_update_in(&lists, &stamp).unwrap().unwrap();
        assert!(Utc::now() - updated < Duration::minutes(5));

        fs::write(&stamp, "").unwrap();
        assert!(last_update_in(&lists, &stamp).unwrap().unwrap() >= updated);
    }
}
