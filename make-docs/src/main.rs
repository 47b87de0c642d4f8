//! Regenerate `src/scripts.rs` from the `--help` output of every check
//!
//! Run from the repository root after `cargo build`:
//!
//! ```plain
//! cargo run --manifest-path make-docs/Cargo.toml > src/scripts.rs
//! ```

use std::process::Command;

struct Check {
    name: &'static str,
    about: &'static str,
}

const PREAMBLE: &str = "\
Documentation about the various scripts contained herein

Every script prints one status line (plus optional detail lines) and
exits 0, 1, 2 or 3 for OK, WARNING, CRITICAL or UNKNOWN. Set
`HOST_CHECKS_LOG=debug` (or pass `-v`) to log what a script reads and runs
to stderr.
";

const CHECKS: &[Check] = &[
    Check {
        name: "check-memory",
        about: "Linux-only.",
    },
    Check {
        name: "check-oom",
        about: "Linux-only, kernel 4.13 or newer. `--show-victims` needs permission to\nread the kernel log.",
    },
    Check {
        name: "check-kernel",
        about: "Linux-only.",
    },
    Check {
        name: "check-firewall",
        about: "Linux-only. Needs root and iptables.",
    },
    Check {
        name: "check-systemd",
        about: "Linux-only, systemd hosts.",
    },
    Check {
        name: "check-stale-libs",
        about: "Linux-only. Run as root to see every process.",
    },
    Check {
        name: "check-nvme",
        about: "Linux-only. Needs root and nvme-cli.",
    },
    Check {
        name: "check-sensors",
        about: "Linux-only.",
    },
    Check {
        name: "check-threads",
        about: "Linux-only.",
    },
    Check {
        name: "check-apparmor",
        about: "Linux-only. Needs root to read the loaded profiles.",
    },
    Check {
        name: "check-apt",
        about: "Debian and Ubuntu.",
    },
];

fn main() {
    let mut out = comment(PREAMBLE.lines());
    out.push('\n');
    out.push_str(&comment(CHECKS.iter().map(|c| format!("- [{0}](#{0})", c.name))));
    out.push('\n');
    for check in CHECKS {
        out.push_str("//!\n");
        out.push_str(&comment(format!("# {}", check.name).lines()));
        out.push_str("\n//!\n");
        out.push_str(&comment(check.about.lines()));
        out.push_str("\n//!\n");
        out.push_str(&format!("//! ```plain\n//! $ {} --help\n", check.name));
        let help = Command::new(format!("target/debug/{}", check.name))
            .arg("--help")
            .output()
            .unwrap_or_else(|e| panic!("couldn't run {}: {}", check.name, e))
            .stdout;
        let help = String::from_utf8(help)
            .unwrap_or_else(|e| panic!("{} --help is not utf8: {}", check.name, e));
        out.push_str(&comment(help.trim_end().lines()));
        out.push_str("\n//! ```\n");
    }
    print!("{}", out);
}

/// Comment each line in the iterator
fn comment<S: AsRef<str>, I: Iterator<Item = S>>(lines: I) -> String {
    lines
        .map(|line| format!("//! {}", line.as_ref()).trim_end().to_owned())
        .collect::<Vec<String>>()
        .join("\n")
}
