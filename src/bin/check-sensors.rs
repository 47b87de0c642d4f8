//! Check hardware temperature sensors

use std::collections::HashSet;

use regex::Regex;
use structopt::StructOpt;

use host_checks::error::{CheckError, Result};
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation, Measurements};
use host_checks::sys::class::hwmon::{self, Sensor};
use host_checks::threshold::{Bound, Direction, Threshold};
use host_checks::Status;

/// Check the temperature sensors exposed by the kernel's hwmon drivers
///
/// Every temp*_input under /sys/class/hwmon is checked. With
/// --device-limits a sensor's own max and crit limits, when the driver
/// reports them, replace the warning and critical thresholds.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-sensors (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(
        short = "w",
        long = "warning",
        help = "Warn at this temperature, in Celsius",
        default_value = "80"
    )]
    warning: String,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Go critical at this temperature, in Celsius",
        default_value = "95"
    )]
    critical: String,
    #[structopt(
        long = "device-limits",
        help = "Use each sensor's own max/crit limits where it has them"
    )]
    device_limits: bool,
    #[structopt(
        long = "sensor",
        help = "Only check sensors whose chip/label matches this regex"
    )]
    sensor: Option<String>,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

fn threshold_for(args: &Args, default: &Threshold, sensor: &Sensor) -> Threshold {
    if !args.device_limits {
        return default.clone();
    }
    Threshold::new(
        sensor.max.map(Bound::Absolute).or(default.warning),
        sensor.crit.map(Bound::Absolute).unwrap_or(default.critical),
        Direction::HighIsBad,
    )
}

/// A distinct perf key per sensor, numbering repeats of the same chip and
/// label (one `Core 0` per socket)
fn perf_keys(sensors: &[&Sensor]) -> Vec<String> {
    let mut used = HashSet::new();
    sensors
        .iter()
        .map(|sensor| {
            let base = sensor.perf_key();
            let mut key = base.clone();
            let mut n = 1;
            while !used.insert(key.clone()) {
                n += 1;
                key = format!("{}_{}", base, n);
            }
            key
        })
        .collect()
}

fn do_check(args: &Args, sensors: &[Sensor]) -> Result<CheckOutcome> {
    let default = Threshold::parse(
        Some(args.warning.as_str()),
        &args.critical,
        Direction::HighIsBad,
    )?;
    let filter = match args.sensor {
        Some(ref pattern) => Some(Regex::new(pattern).map_err(|e| {
            CheckError::config(format!("invalid --sensor pattern: {}", e))
        })?),
        None => None,
    };
    let sensors: Vec<&Sensor> = sensors
        .iter()
        .filter(|s| filter.as_ref().map_or(true, |re| re.is_match(&s.name())))
        .collect();

    let mut eval = Evaluation::new();
    let hottest = sensors
        .iter()
        .max_by(|l, r| l.celsius.partial_cmp(&r.celsius).unwrap_or(std::cmp::Ordering::Equal));
    match hottest {
        Some(s) => eval.detail(format!(
            "{} sensors, hottest {} at {}C",
            sensors.len(),
            s.name(),
            s.celsius
        )),
        None => eval.fail(CheckError::MissingMeasurement(match args.sensor {
            Some(ref pattern) => format!("temperature sensor matching '{}'", pattern),
            None => "temperature sensor".to_owned(),
        })),
    }

    let keys = perf_keys(&sensors);
    let mut measurements = Measurements::new();
    for (sensor, key) in sensors.iter().zip(&keys) {
        measurements.insert(key.clone(), sensor.celsius);
    }
    for (sensor, key) in sensors.iter().zip(&keys) {
        let threshold = threshold_for(args, &default, sensor);
        let status = eval.measure(&measurements, key, &threshold, None);
        if status != Status::Ok {
            eval.detail(format!(
                "{} at {}C ({})",
                sensor.name(),
                sensor.celsius,
                threshold
            ));
        }
        eval.perf(key.clone(), sensor.celsius);
    }
    Ok(eval.finish())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("SENSORS", args.verbose, || {
        do_check(&args, &hwmon::temperatures()?)
    });
}

#[cfg(test)]
mod unit {
    use structopt::StructOpt;

    use host_checks::sys::class::hwmon::Sensor;
    use host_checks::Status;

    use super::{do_check, Args};

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    fn sensor(chip: &str, label: &str, celsius: f64, max: Option<f64>, crit: Option<f64>) -> Sensor {
        Sensor {
            chip: chip.to_owned(),
            label: label.to_owned(),
            celsius,
            max,
            crit,
        }
    }

    fn sensors() -> Vec<Sensor> {
        vec![
            sensor("coretemp", "Package id 0", 52.0, Some(80.0), Some(100.0)),
            sensor("coretemp", "Core 0", 50.0, Some(80.0), Some(100.0)),
            sensor("nvme", "Composite", 41.85, Some(84.85), Some(84.85)),
            sensor("acpitz", "temp1", 27.8, None, Some(119.0)),
        ]
    }

    #[test]
    fn usage_is_valid() {
        let args = build_args(vec!["check-sensors"]);
        assert_eq!(args.warning, "80");
        assert_eq!(args.critical, "95");
        assert!(!args.device_limits);
        let args = build_args(vec!["check-sensors", "--device-limits", "--sensor", "^coretemp/"]);
        assert!(args.device_limits);
        assert_eq!(args.sensor.as_ref().unwrap(), "^coretemp/");
    }

    #[test]
    fn cool_sensors_are_ok() {
        let args = build_args(vec!["check-sensors"]);
        let outcome = do_check(&args, &sensors()).unwrap();
        assert_eq!(
            outcome.render("SENSORS"),
            "SENSORS OK - 4 sensors, hottest coretemp/Package id 0 at 52C | \
             coretemp_Package_id_0=52, coretemp_Core_0=50, nvme_Composite=41.85, acpitz_temp1=27.8"
        );
    }

    #[test]
    fn hot_sensors_are_listed() {
        let args = build_args(vec!["check-sensors", "-w", "45", "-c", "51"]);
        let outcome = do_check(&args, &sensors()).unwrap();
        assert_eq!(outcome.status, Status::Critical);
        assert_eq!(
            outcome.details,
            [
                "4 sensors, hottest coretemp/Package id 0 at 52C",
                "coretemp/Package id 0 at 52C (warning >= 45, critical >= 51)",
                "coretemp/Core 0 at 50C (warning >= 45, critical >= 51)",
            ]
        );
    }

    #[test]
    fn device_limits_replace_defaults() {
        let hot_nvme = vec![sensor("nvme", "Composite", 84.85, Some(84.85), Some(84.85))];
        let args = build_args(vec!["check-sensors"]);
        assert_eq!(do_check(&args, &hot_nvme).unwrap().status, Status::Warning);
        let args = build_args(vec!["check-sensors", "--device-limits"]);
        assert_eq!(do_check(&args, &hot_nvme).unwrap().status, Status::Critical);

        // only a crit limit: the default warning still applies
        let warm_acpi = vec![sensor("acpitz", "temp1", 85.0, None, Some(119.0))];
        let outcome = do_check(&args, &warm_acpi).unwrap();
        assert_eq!(outcome.status, Status::Warning);
        assert_eq!(
            outcome.details[1],
            "acpitz/temp1 at 85C (warning >= 80, critical >= 119)"
        );
    }

    #[test]
    fn repeated_names_are_judged_separately() {
        let args = build_args(vec!["check-sensors"]);
        let two_sockets = vec![
            sensor("coretemp", "Core 0", 99.0, Some(80.0), Some(100.0)),
            sensor("coretemp", "Core 0", 40.0, Some(80.0), Some(100.0)),
        ];
        let outcome = do_check(&args, &two_sockets).unwrap();
        assert_eq!(outcome.status, Status::Critical);
        assert_eq!(
            outcome.render("SENSORS"),
            "SENSORS CRITICAL - 2 sensors, hottest coretemp/Core 0 at 99C | \
             coretemp_Core_0=99, coretemp_Core_0_2=40\n\
             coretemp/Core 0 at 99C (warning >= 80, critical >= 95)"
        );
    }

    #[test]
    fn sensor_filter() {
        let args = build_args(vec!["check-sensors", "--sensor", "^nvme/"]);
        let outcome = do_check(&args, &sensors()).unwrap();
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(outcome.perf.len(), 1);

        let args = build_args(vec!["check-sensors", "--sensor", "^gpu"]);
        let outcome = do_check(&args, &sensors()).unwrap();
        assert_eq!(
            outcome.render("SENSORS"),
            "SENSORS UNKNOWN - evaluation error: missing measurement 'temperature sensor matching '^gpu''"
        );
    }

    #[test]
    fn no_sensors_is_unknown() {
        let args = build_args(vec!["check-sensors"]);
        let outcome = do_check(&args, &[]).unwrap();
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(
            outcome.details,
            ["evaluation error: missing measurement 'temperature sensor'"]
        );
    }
}
