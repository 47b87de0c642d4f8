//! Structs and impls for the various files from the /proc filesystem
//!
//! Each file gets a struct to represent its data, with an associated `load`
//! function that reads the real file and a `FromStr` impl that does the
//! parsing.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use scan_fmt::scan_fmt;
use tracing::trace;

use crate::error::{CheckError, Result};

pub mod pid;

/// Read a whole pseudo-file into a String
pub(crate) fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    trace!(path = %path.display(), bytes = contents.len(), "read");
    Ok(contents)
}

lazy_static! {
    static ref IS_DIGIT: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

/// The pids of every process visible in `/proc`
pub fn pids() -> Result<Vec<i32>> {
    pids_in("/proc")
}

pub(crate) fn pids_in<P: AsRef<Path>>(root: P) -> Result<Vec<i32>> {
    let mut pids = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if let Some(fname) = entry.file_name().to_str() {
            // we only care about the pid dirs
            if IS_DIGIT.is_match(fname) {
                pids.push(fname.parse()?);
            }
        }
    }
    pids.sort_unstable();
    Ok(pids)
}

/// Every process that could be loaded, and the errors for those that
/// couldn't
///
/// Processes that exit while we are reading them are skipped silently.
pub fn processes() -> Result<(Vec<pid::Process>, Vec<CheckError>)> {
    let mut procs = Vec::new();
    let mut errors = Vec::new();
    for p in pids()? {
        match pid::Process::from_pid(p) {
            Ok(process) => procs.push(process),
            Err(CheckError::Io(ref e)) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => errors.push(e),
        }
    }
    Ok((procs, errors))
}

// ////////////////////////////////////////////////////////////////////////////
// Memory

/// Overall memory usage on the system
///
/// All values are in KB, as reported by the kernel.
#[derive(PartialEq, Eq, Debug, Default)]
pub struct MemInfo {
    pub total: Option<u64>,
    pub available: Option<u64>,
    pub free: Option<u64>,
    pub cached: Option<u64>,
    pub swap_total: Option<u64>,
    pub swap_free: Option<u64>,
}

impl MemInfo {
    /// Read the data from /proc/meminfo into a `MemInfo`
    pub fn load() -> Result<MemInfo> {
        read_file("/proc/meminfo")?.parse()
    }

    pub fn total_bytes(&self) -> Result<u64> {
        self.total.map(|kb| kb * 1024).ok_or_else(|| {
            CheckError::MissingMeasurement("MemTotal".to_owned())
        })
    }

    /// Memory that can be given to new work without swapping
    ///
    /// Since linux kernel 3.14 this is `MemAvailable`. Before that we
    /// approximate it as Free + Cached, even though that is [almost certain
    /// to be incorrect][].
    ///
    /// [almost certain to be incorrect]: https://github.com/torvalds/linux/commit/34e431b0ae398fc54ea69ff85ec700722c9da773
    pub fn available_bytes(&self) -> Result<u64> {
        match *self {
            MemInfo {
                available: Some(a), ..
            } => Ok(a * 1024),
            MemInfo {
                free: Some(f),
                cached: Some(c),
                ..
            } => Ok((f + c) * 1024),
            _ => Err(CheckError::MissingMeasurement(
                "MemAvailable (or MemFree and Cached)".to_owned(),
            )),
        }
    }
}

impl FromStr for MemInfo {
    type Err = CheckError;

    /// Convert the contents of a string like /proc/meminfo into a MemInfo
    fn from_str(meminfo: &str) -> Result<MemInfo> {
        let mut info = MemInfo::default();
        for line in meminfo.lines() {
            let mut parts = line.split(':');
            let (key, rest) = match (parts.next(), parts.next()) {
                (Some(key), Some(rest)) => (key.trim(), rest),
                _ => continue,
            };
            let slot = match key {
                "MemTotal" => &mut info.total,
                "MemAvailable" => &mut info.available,
                "MemFree" => &mut info.free,
                "Cached" => &mut info.cached,
                "SwapTotal" => &mut info.swap_total,
                "SwapFree" => &mut info.swap_free,
                _ => continue,
            };
            let amount = rest.trim().trim_end_matches("kB").trim();
            *slot = Some(amount.parse().map_err(|e| {
                CheckError::parse(format!(
                    "unable to parse {} from /proc/meminfo line '{}': {}",
                    key, line, e
                ))
            })?);
        }
        Ok(info)
    }
}

/// One line of a pressure stall information file
#[derive(Debug, PartialEq, Default, Clone, Copy)]
pub struct PressureLine {
    pub avg10: f64,
    pub avg60: f64,
    pub avg300: f64,
    /// Total stall time in microseconds
    pub total: u64,
}

/// Pressure stall information, as in `/proc/pressure/memory`
///
/// `some` is the share of time at least one task was stalled, `full` the
/// share of time all non-idle tasks were. Averages are percentages.
#[derive(Debug, PartialEq, Default)]
pub struct Pressure {
    pub some: PressureLine,
    pub full: Option<PressureLine>,
}

impl Pressure {
    /// Memory pressure, only present on kernels built with PSI (4.20+)
    pub fn memory() -> Result<Pressure> {
        read_file("/proc/pressure/memory")?.parse()
    }
}

fn pressure_line(line: &str) -> Result<PressureLine> {
    let mut out = PressureLine::default();
    for field in line.split_whitespace().skip(1) {
        let mut kv = field.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("avg10"), Some(v)) => out.avg10 = v.parse()?,
            (Some("avg60"), Some(v)) => out.avg60 = v.parse()?,
            (Some("avg300"), Some(v)) => out.avg300 = v.parse()?,
            (Some("total"), Some(v)) => out.total = v.parse()?,
            _ => {
                return Err(CheckError::parse(format!(
                    "unexpected field '{}' in pressure line '{}'",
                    field, line
                )))
            }
        }
    }
    Ok(out)
}

impl FromStr for Pressure {
    type Err = CheckError;

    fn from_str(contents: &str) -> Result<Pressure> {
        let mut some = None;
        let mut full = None;
        for line in contents.lines() {
            if line.starts_with("some ") {
                some = Some(pressure_line(line)?);
            } else if line.starts_with("full ") {
                full = Some(pressure_line(line)?);
            }
        }
        Ok(Pressure {
            some: some.ok_or_else(|| CheckError::parse("pressure file has no 'some' line"))?,
            full,
        })
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Counters

/// The counters in `/proc/vmstat`
#[derive(Debug, Default)]
pub struct VmStat(HashMap<String, u64>);

impl VmStat {
    pub fn load() -> Result<VmStat> {
        read_file("/proc/vmstat")?.parse()
    }

    pub fn get(&self, counter: &str) -> Result<u64> {
        self.0
            .get(counter)
            .cloned()
            .ok_or_else(|| CheckError::MissingMeasurement(counter.to_owned()))
    }

    /// Processes killed by the OOM killer since boot (kernel 4.13+)
    pub fn oom_kills(&self) -> Result<u64> {
        self.get("oom_kill")
    }
}

impl FromStr for VmStat {
    type Err = CheckError;

    fn from_str(contents: &str) -> Result<VmStat> {
        let mut counters = HashMap::new();
        for line in contents.lines() {
            let mut parts = line.split_whitespace();
            if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
                counters.insert(name.to_owned(), value.parse()?);
            }
        }
        Ok(VmStat(counters))
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Load and threads

/// The contents of `/proc/loadavg`
///
/// Load average is number of jobs in the run queue (state R) or waiting for
/// disk I/O (state D) averaged over 1, 5, and 15 minutes. The kernel also
/// reports how many scheduling entities (threads) are runnable and exist.
#[derive(PartialEq, Debug)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
    pub runnable: u64,
    pub threads: u64,
    pub last_pid: u32,
}

impl LoadAvg {
    /// Load from the /proc/loadavg file
    pub fn load() -> Result<LoadAvg> {
        read_file("/proc/loadavg")?.parse()
    }
}

impl FromStr for LoadAvg {
    type Err = CheckError;

    fn from_str(contents: &str) -> Result<LoadAvg> {
        let (one, five, fifteen, runnable, threads, last_pid) = scan_fmt!(
            contents.trim(),
            "{} {} {} {d}/{d} {d}",
            f64,
            f64,
            f64,
            u64,
            u64,
            u32
        )
        .map_err(|_| CheckError::parse(format!("unable to parse loadavg '{}'", contents.trim())))?;
        Ok(LoadAvg {
            one,
            five,
            fifteen,
            runnable,
            threads,
            last_pid,
        })
    }
}

/// The system-wide limit on threads, `kernel.threads-max`
pub fn threads_max() -> Result<u64> {
    Ok(read_file("/proc/sys/kernel/threads-max")?.trim().parse()?)
}

// ////////////////////////////////////////////////////////////////////////////
// Testing
