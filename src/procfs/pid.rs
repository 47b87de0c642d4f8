//! Data structures related to the /proc/<pid>/* files

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use super::read_file;
use crate::error::{CheckError, Result};
use crate::linux::PAGESIZE;

pub struct Process {
    pub stat: Stat,
    pub cmdline: CmdLine,
}

impl Process {
    pub fn from_pid<P: fmt::Display + Copy>(p: P) -> Result<Process> {
        Ok(Process {
            stat: Stat::from_pid(p)?,
            cmdline: CmdLine::from_pid(p)?,
        })
    }

    pub fn useful_cmdline(&self) -> String {
        let cmd = self.cmdline.display();
        if cmd.is_empty() {
            self.stat.comm.clone()
        } else {
            cmd
        }
    }

    /// Resident memory in bytes
    pub fn rss_bytes(&self) -> u64 {
        self.stat.rss * (*PAGESIZE)
    }
}

/// The parts of `/proc/[pid]/stat` the checks look at
#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    pub pid: i32,
    pub comm: String,
    pub state: char,
    pub ppid: i32,
    pub num_threads: i64,
    /// Resident set size, in pages
    pub rss: u64,
}

impl Stat {
    pub fn from_pid<P: fmt::Display>(pid: P) -> Result<Stat> {
        read_file(format!("/proc/{}/stat", pid))?.parse()
    }
}

impl FromStr for Stat {
    type Err = CheckError;

    /// Parse the results of /proc/[pid]/stat into a `Stat`
    ///
    /// `comm` may itself contain spaces and parens, so it is everything
    /// between the first `(` and the last `)`.
    fn from_str(s: &str) -> Result<Stat> {
        let bad = |field: &str| CheckError::parse(format!("unable to parse '{}' from stat line '{}'", field, s.trim()));
        let open = s.find('(').ok_or_else(|| bad("comm"))?;
        let close = s.rfind(')').ok_or_else(|| bad("comm"))?;
        if close < open {
            return Err(bad("comm"));
        }
        let pid = s[..open].trim().parse().map_err(|_| bad("pid"))?;
        let comm = s[open + 1..close].to_owned();
        // Fields after comm, starting at field 3 (state) of proc(5)
        let rest: Vec<&str> = s[close + 1..].split_whitespace().collect();
        let field = |idx: usize, name: &str| rest.get(idx).cloned().ok_or_else(|| bad(name));
        Ok(Stat {
            pid,
            comm,
            state: field(0, "state")?.chars().next().ok_or_else(|| bad("state"))?,
            ppid: field(1, "ppid")?.parse().map_err(|_| bad("ppid"))?,
            num_threads: field(17, "num_threads")?
                .parse()
                .map_err(|_| bad("num_threads"))?,
            rss: field(21, "rss")?.parse().map_err(|_| bad("rss"))?,
        })
    }
}

#[derive(Debug)]
pub struct CmdLine {
    line: Vec<String>,
}

impl CmdLine {
    pub fn from_pid<P: fmt::Display>(pid: P) -> Result<CmdLine> {
        let s = read_file(format!("/proc/{}/cmdline", pid))?;
        Ok(CmdLine {
            line: s
                .split('\0')
                .map(String::from)
                .filter(|arg| !arg.is_empty())
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    pub fn display(&self) -> String {
        self.line.join(" ")
    }
}

lazy_static! {
    /// A shared object path: `libc.so`, `libssl.so.3`, `libfoo-1.2.so.0.1`
    static ref SHARED_OBJECT: Regex = Regex::new(r"\.so(\.[0-9]+)*$").unwrap();
}

/// Shared libraries a process maps that have been deleted from disk
///
/// These are what's left after a package upgrade replaced a library but the
/// process using it was never restarted.
pub fn deleted_libraries<P: fmt::Display>(pid: P) -> Result<Vec<String>> {
    Ok(parse_deleted_libraries(&read_file(format!(
        "/proc/{}/maps",
        pid
    ))?))
}

pub(crate) fn parse_deleted_libraries(maps: &str) -> Vec<String> {
    let mut libs = BTreeSet::new();
    for line in maps.lines() {
        let path = match line.splitn(6, char::is_whitespace).nth(5) {
            Some(path) => path.trim(),
            None => continue,
        };
        let path = match path.strip_suffix("(deleted)") {
            Some(path) => path.trim_end(),
            None => continue,
        };
        if path.starts_with('/') && !path.starts_with("/memfd:") && SHARED_OBJECT.is_match(path) {
            libs.insert(path.to_owned());
        }
    }
    libs.into_iter().collect()
}

/// The raw security label of a process, e.g. `unconfined` or
/// `/usr/sbin/ntpd (enforce)`
///
/// Newer kernels keep the AppArmor label in its own directory so that it
/// can't be confused with other LSMs; fall back to the shared file.
pub fn security_label<P: fmt::Display>(pid: P) -> Result<String> {
    let label = read_file(format!("/proc/{}/attr/apparmor/current", pid))
        .or_else(|_| read_file(format!("/proc/{}/attr/current", pid)))?;
    Ok(label.trim_end_matches(|c: char| c == '\0' || c == '\n').to_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_stat_lines() {
        for (i, s) in [
            "529 ((sd-proc)) S 885 885 885 0 -1 107793 24 0 0 0 0 \
             0 0 0 20 0 1 0 7777777 111111111 647 18848888888888888888 1 1 0 \
             0 0 0 0 4096 0 0 0 0 17 15 0 0 0 0 0 0 0 0 0 0 0 0 0",
            "47 (migration/8) S 2 0 0 0 -1 66666668 0 0 0 0 0 14 0 0 -100 0 1 \
             0 25 0 0 18848888888888888888 0 0 0 0 0 0 0 2147483647 0 0 0 0 17 \
             8 99 1 0 0 0 0 0 0 0 0 0 0 0",
            "122 (statsd /app/connection) S 103 103 181 0 -1 304 0626 0 \
             0 0 605 198 0 0 20 0 10 0 71025 1230417920 11878 18848888888888888888 \
             1 1 0 0 0 0 0 4096 16898 0 0 0 17 11 0 0 0 0 0 0 0 0 0 0 0 0 0",
        ]
        .iter()
        .enumerate()
        {
            s.parse::<Stat>()
                .unwrap_or_else(|e| panic!("line {}: {}", i, e));
        }

        let stat: Stat = "122 (statsd /app/connection) S 103 103 181 0 -1 304 0626 0 \
                          0 0 605 198 0 0 20 0 10 0 71025 1230417920 11878 18848888888888888888 \
                          1 1 0 0 0 0 0 4096 16898 0 0 0 17 11 0 0 0 0 0 0 0 0 0 0 0 0 0"
            .parse()
            .unwrap();
        assert_eq!(
            stat,
            Stat {
                pid: 122,
                comm: "statsd /app/connection".to_owned(),
                state: 'S',
                ppid: 103,
                num_threads: 10,
                rss: 11878,
            }
        );

        let stat: Stat = "529 ((sd-proc)) S 885 885 885 0 -1 107793 24 0 0 0 0 \
                          0 0 0 20 0 1 0 7777777 111111111 647 18848888888888888888"
            .parse()
            .unwrap();
        assert_eq!(stat.comm, "(sd-proc)");
        assert_eq!(stat.num_threads, 1);
        assert_eq!(stat.rss, 647);
    }

    #[test]
    fn truncated_stat_is_an_error() {
        assert!("12 (bash) S 1 12".parse::<Stat>().is_err());
        assert!("12 bash S".parse::<Stat>().is_err());
    }

    #[test]
    fn finds_deleted_libraries() {
        let maps = "\
55d0c7a00000-55d0c7a28000 r--p 00000000 fd:01 1311110                    /usr/sbin/sshd
7f1a2b000000-7f1a2b022000 r--p 00000000 fd:01 1835342                    /usr/lib/x86_64-linux-gnu/libc.so.6 (deleted)
7f1a2b022000-7f1a2b19a000 r-xp 00022000 fd:01 1835342                    /usr/lib/x86_64-linux-gnu/libc.so.6 (deleted)
7f1a2b200000-7f1a2b222000 r--p 00000000 fd:01 1835999                    /usr/lib/x86_64-linux-gnu/libssl.so.3 (deleted)
7f1a2b300000-7f1a2b322000 rw-s 00000000 00:05 98765                      /dev/shm/some buffer (deleted)
7f1a2b400000-7f1a2b422000 rw-s 00000000 00:05 98766                      /memfd:pulseaudio.so (deleted)
7f1a2b500000-7f1a2b522000 r--p 00000000 fd:01 1836000                    /usr/lib/x86_64-linux-gnu/libz.so.1.2.13
7ffd3e9a1000-7ffd3e9c2000 rw-p 00000000 00:00 0                          [stack]
7f1a2b600000-7f1a2b601000 rw-p 00000000 00:00 0
";
        assert_eq!(
            parse_deleted_libraries(maps),
            [
                "/usr/lib/x86_64-linux-gnu/libc.so.6",
                "/usr/lib/x86_64-linux-gnu/libssl.so.3",
            ]
        );
    }

    #[test]
    fn can_read_own_process() {
        let me = std::process::id();
        let process = Process::from_pid(me).unwrap();
        assert_eq!(process.stat.pid as u32, me);
        assert!(process.stat.num_threads >= 1);
        assert!(!process.useful_cmdline().is_empty());
        deleted_libraries(me).unwrap();
    }
}
