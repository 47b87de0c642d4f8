//! Standard APIs in Linux

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use nix::unistd::{sysconf, SysconfVar};

use crate::error::{CheckError, Result};

lazy_static! {
    pub static ref PAGESIZE: u64 = match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => size as u64,
        _ => 4096,
    };
}

/// Render a byte count with a binary suffix, e.g. `  9.8K`
pub fn bytes_to_human_size(bytes: u64) -> String {
    let mut bytes = bytes as f64;
    let sizes = ["B", "K", "M", "G", "T"];
    let mut reductions = 0;
    while reductions < sizes.len() - 1 {
        if bytes > 1000.0 {
            bytes /= 1024.0;
            reductions += 1;
        } else {
            break;
        }
    }
    format!("{:>5.1}{}", bytes, sizes[reductions])
}

/// One dot- or dash-separated piece of a kernel release
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Num(u64),
    Text(String),
}

impl Ord for Part {
    fn cmp(&self, other: &Part) -> Ordering {
        match (self, other) {
            (Part::Num(l), Part::Num(r)) => l.cmp(r),
            (Part::Text(l), Part::Text(r)) => l.cmp(r),
            (Part::Num(_), Part::Text(_)) => Ordering::Greater,
            (Part::Text(_), Part::Num(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Part {
    fn partial_cmp(&self, other: &Part) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A kernel release string like `5.15.0-91-generic`, ordered numerically
///
/// `5.15.0-100-generic` sorts after `5.15.0-91-generic`, which a plain
/// string comparison gets wrong.
#[derive(Debug, Clone)]
pub struct KernelVersion {
    release: String,
    parts: Vec<Part>,
}

impl KernelVersion {
    pub fn release(&self) -> &str {
        &self.release
    }

    /// What follows the last numeric component, `generic` in
    /// `5.15.0-100-generic` and `cloud-amd64` in `6.1.0-18-cloud-amd64`
    pub fn flavour(&self) -> &str {
        let release = self.release.as_str();
        let mut start = 0;
        let mut end = 0;
        let separators = release
            .char_indices()
            .filter(|&(_, c)| !c.is_ascii_alphanumeric())
            .chain(std::iter::once((release.len(), '-')));
        for (i, c) in separators {
            if i > start && release[start..i].bytes().all(|b| b.is_ascii_digit()) {
                end = i;
            }
            start = i + c.len_utf8();
        }
        release[end..].trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
    }
}

impl FromStr for KernelVersion {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<KernelVersion> {
        let release = s.trim();
        if !release.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(CheckError::parse(format!(
                "'{}' does not look like a kernel release",
                release
            )));
        }
        let parts = release
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse() {
                Ok(n) => Part::Num(n),
                Err(_) => Part::Text(part.to_owned()),
            })
            .collect();
        Ok(KernelVersion {
            release: release.to_owned(),
            parts,
        })
    }
}

impl PartialEq for KernelVersion {
    fn eq(&self, other: &KernelVersion) -> bool {
        self.parts == other.parts
    }
}

impl Eq for KernelVersion {}

impl Ord for KernelVersion {
    fn cmp(&self, other: &KernelVersion) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl PartialOrd for KernelVersion {
    fn partial_cmp(&self, other: &KernelVersion) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.release)
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn bytes_to_human_size_produces_shortest() {
        let reprs = [
            (999, "999.0B"),
            (9_999, "  9.8K"),
            (9_999_999, "  9.5M"),
            (35_999_999, " 34.3M"),
            (9_999_999_999, "  9.3G"),
            (9_999_999_999_999, "  9.1T"),
            (90_999_999_999_999_999, "82764.0T"),
        ];

        for &(raw, repr) in reprs.iter() {
            assert_eq!(bytes_to_human_size(raw), repr);
        }
    }

    fn kv(s: &str) -> KernelVersion {
        s.parse().unwrap()
    }

    #[test]
    fn kernel_versions_compare_numerically() {
        assert!(kv("5.15.0-100-generic") > kv("5.15.0-91-generic"));
        assert!(kv("6.1.0-18-amd64") > kv("5.10.0-28-amd64"));
        assert!(kv("5.10.0") < kv("5.10.0-1"));
        assert_eq!(kv("5.4.0-1-generic"), kv(" 5.4.0-1-generic\n"));
        assert_eq!(
            vec!["4.19.0", "5.4.10", "5.4.9"]
                .into_iter()
                .map(kv)
                .max()
                .unwrap()
                .release(),
            "5.4.10"
        );
    }

    #[test]
    fn kernel_flavours() {
        assert_eq!(kv("5.15.0-100-generic").flavour(), "generic");
        assert_eq!(kv("6.1.0-18-cloud-amd64").flavour(), "cloud-amd64");
        assert_eq!(kv("6.1.0-18-amd64").flavour(), "amd64");
        assert_eq!(kv("6.1.1-arch1-1").flavour(), "");
        assert_eq!(kv("5.10.0").flavour(), "");
    }

    #[test]
    fn kernel_versions_must_start_with_a_number() {
        assert!("generic".parse::<KernelVersion>().is_err());
        assert!("".parse::<KernelVersion>().is_err());
    }
}
