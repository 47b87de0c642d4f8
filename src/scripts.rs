//! Documentation about the various scripts contained herein
//!
//! Every script prints one status line (plus optional detail lines) and
//! exits 0, 1, 2 or 3 for OK, WARNING, CRITICAL or UNKNOWN. Set
//! `HOST_CHECKS_LOG=debug` (or pass `-v`) to log what a script reads and runs
//! to stderr.
//!
//! - [check-memory](#check-memory)
//! - [check-oom](#check-oom)
//! - [check-kernel](#check-kernel)
//! - [check-firewall](#check-firewall)
//! - [check-systemd](#check-systemd)
//! - [check-stale-libs](#check-stale-libs)
//! - [check-nvme](#check-nvme)
//! - [check-sensors](#check-sensors)
//! - [check-threads](#check-threads)
//! - [check-apparmor](#check-apparmor)
//! - [check-apt](#check-apt)
//!
//! # check-memory
//!
//! Linux-only.
//!
//! ```plain
//! $ check-memory --help
//! check-memory (part of host-checks) 0.4.0
//! Check the memory available to new work on this computer
//!
//! Available memory is MemAvailable from /proc/meminfo (MemFree + Cached on kernels that predate it). Thresholds are the
//! minimum amount that must stay available, either absolute (512M, 2G) or a percent of total memory.
//!
//! USAGE:
//!     check-memory [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!     -c, --critical <critical>                    Go critical when available memory is at or below this [default: 5%]
//!         --pressure-critical <pressure-critical>
//!             Go critical when memory pressure (some avg10, percent) is at or above this
//!         --pressure-warning <pressure-warning>
//!             Warn when memory pressure (some avg10, percent) is at or above this
//!         --show-hogs <count>                      Show <count> most ram-intensive processes. [default: 0]
//!     -w, --warning <warning>                      Warn when available memory is at or below this [default: 10%]
//! ```
//!
//! # check-oom
//!
//! Linux-only, kernel 4.13 or newer. `--show-victims` needs permission to
//! read the kernel log.
//!
//! ```plain
//! $ check-oom --help
//! check-oom (part of host-checks) 0.4.0
//! Check how many processes the kernel's OOM killer has killed since boot
//!
//! The count comes from the oom_kill counter in /proc/vmstat, available on kernels 4.13 and newer.
//!
//! USAGE:
//!     check-oom [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help            Prints help information
//!         --show-victims    List killed processes from the kernel log (runs dmesg)
//!     -V, --version         Prints version information
//!     -v, --verbose         Log what is read to stderr
//!
//! OPTIONS:
//!     -c, --critical <critical>    Go critical at this many OOM kills [default: 1]
//!         --timeout <timeout>      Seconds to wait for dmesg [default: 10]
//!     -w, --warning <warning>      Warn at this many OOM kills
//! ```
//!
//! # check-kernel
//!
//! Linux-only.
//!
//! ```plain
//! $ check-kernel --help
//! check-kernel (part of host-checks) 0.4.0
//! Check that the host is running the newest installed kernel
//!
//! The running release comes from uname(2), installed releases are the directories of /lib/modules. A pending reboot
//! flagged by the package manager in /var/run/reboot-required is reported the same way.
//!
//! USAGE:
//!     check-kernel [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!         --outdated-status <outdated-status>
//!             Status when a newer kernel is installed or a reboot is required: ok, warning, critical or unknown
//!             [default: warning]
//! ```
//!
//! # check-firewall
//!
//! Linux-only. Needs root and iptables.
//!
//! ```plain
//! $ check-firewall --help
//! check-firewall (part of host-checks) 0.4.0
//! Check that the rules loaded in the kernel are the rules saved on disk
//!
//! Compares the output of iptables-save (ip6tables-save with --ipv6) with the ruleset that is restored at boot.
//! Comments, packet counters and COMMIT lines are ignored. Each chain must hold the same rules in the same order.
//!
//! USAGE:
//!     check-firewall [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!         --ipv6       Check the IPv6 firewall
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!         --mismatch-status <mismatch-status>
//!             Status when the live rules differ: ok, warning, critical or unknown [default: critical]
//!         --rules-file <rules-file>
//!             Saved rules to compare against [default: /etc/iptables/rules.v4 or rules.v6]
//!         --timeout <timeout>                    Seconds to wait for iptables-save [default: 10]
//! ```
//!
//! # check-systemd
//!
//! Linux-only, systemd hosts.
//!
//! ```plain
//! $ check-systemd --help
//! check-systemd (part of host-checks) 0.4.0
//! Check for failed systemd units, and that required units are running
//!
//! Reads the unit list from `systemctl list-units --all`. Any unit in the failed state counts against the thresholds
//! unless it matches --ignore. Every --unit must exist and be active, otherwise the check is critical.
//!
//! USAGE:
//!     check-systemd [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!     -c, --critical <critical>    Go critical at this many failed units [default: 1]
//!         --ignore <ignore>        Don't count failed units matching this regex
//!         --timeout <timeout>      Seconds to wait for systemctl [default: 10]
//!         --unit <units>...        A unit that must be active, may be given multiple times
//!     -w, --warning <warning>      Warn at this many failed units
//! ```
//!
//! # check-stale-libs
//!
//! Linux-only. Run as root to see every process.
//!
//! ```plain
//! $ check-stale-libs --help
//! check-stale-libs (part of host-checks) 0.4.0
//! Check for processes that need a restart after a library upgrade
//!
//! A process that maps a shared library which has since been deleted from disk is still running the old code, and so
//! any security fix in the new version does not apply to it. Needs root to see every process.
//!
//! USAGE:
//!     check-stale-libs [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!     -c, --critical <critical>        Go critical at this many processes using deleted libraries [default: 50]
//!         --max-listed <max-listed>    List at most this many processes [default: 10]
//!     -w, --warning <warning>          Warn at this many processes using deleted libraries [default: 1]
//! ```
//!
//! # check-nvme
//!
//! Linux-only. Needs root and nvme-cli.
//!
//! ```plain
//! $ check-nvme --help
//! check-nvme (part of host-checks) 0.4.0
//! Check the health of NVMe drives
//!
//! Runs `nvme smart-log DEVICE -o json` for every device (by default every controller in /sys/class/nvme) and looks at
//! the controller's critical warning flags, wear, temperature, spare capacity and media errors. Needs root and nvme-cli.
//!
//! USAGE:
//!     check-nvme [FLAGS] [OPTIONS] [devices]...
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!         --temp-critical <temp-critical>    Go critical at this temperature, in Celsius [default: 70]
//!         --temp-warning <temp-warning>      Warn at this temperature, in Celsius [default: 60]
//!         --timeout <timeout>                Seconds to wait for each nvme command [default: 10]
//!         --used-critical <used-critical>    Go critical when percent used reaches this [default: 90]
//!         --used-warning <used-warning>
//!             Warn when the drive's estimated wear (percent used) reaches this [default: 80]
//!
//! ARGS:
//!     <devices>...    Devices to check, e.g. /dev/nvme0 [default: all controllers]
//! ```
//!
//! # check-sensors
//!
//! Linux-only.
//!
//! ```plain
//! $ check-sensors --help
//! check-sensors (part of host-checks) 0.4.0
//! Check the temperature sensors exposed by the kernel's hwmon drivers
//!
//! Every temp*_input under /sys/class/hwmon is checked. With --device-limits a sensor's own max and crit limits, when
//! the driver reports them, replace the warning and critical thresholds.
//!
//! USAGE:
//!     check-sensors [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!         --device-limits    Use each sensor's own max/crit limits where it has them
//!     -h, --help             Prints help information
//!     -V, --version          Prints version information
//!     -v, --verbose          Log what is read to stderr
//!
//! OPTIONS:
//!     -c, --critical <critical>    Go critical at this temperature, in Celsius [default: 95]
//!         --sensor <sensor>        Only check sensors whose chip/label matches this regex
//!     -w, --warning <warning>      Warn at this temperature, in Celsius [default: 80]
//! ```
//!
//! # check-threads
//!
//! Linux-only.
//!
//! ```plain
//! $ check-threads --help
//! check-threads (part of host-checks) 0.4.0
//! Check how close the system is to running out of threads
//!
//! The thread count is the number of scheduling entities from /proc/loadavg, the limit is kernel.threads-max.
//! Thresholds may be absolute counts or a percent of the limit.
//!
//! USAGE:
//!     check-threads [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!     -c, --critical <critical>    Go critical at this many threads [default: 90%]
//!         --show-hogs <count>      Show <count> processes with the most threads. [default: 0]
//!     -w, --warning <warning>      Warn at this many threads [default: 80%]
//! ```
//!
//! # check-apparmor
//!
//! Linux-only. Needs root to read the loaded profiles.
//!
//! ```plain
//! $ check-apparmor --help
//! check-apparmor (part of host-checks) 0.4.0
//! Check AppArmor is enabled, its profiles are enforced, and that processes are confined
//!
//! Needs root to read the loaded profiles from securityfs.
//!
//! USAGE:
//!     check-apparmor [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!         --complain-status <complain-status>
//!             Status when any profile is in complain mode: ok, warning, critical or unknown [default: ok]
//!         --min-enforce <min-enforce>
//!             Go critical with fewer than this many profiles in enforce mode
//!         --process <processes>...
//!             Processes whose name matches this regex must be confined, may be given multiple times
//! ```
//!
//! # check-apt
//!
//! Debian and Ubuntu.
//!
//! ```plain
//! $ check-apt --help
//! check-apt (part of host-checks) 0.4.0
//! Check that `apt-get update` has run recently
//!
//! The age is taken from the newest file in /var/lib/apt/lists, or from the periodic update-success-stamp when that is
//! newer. Thresholds are in hours.
//!
//! USAGE:
//!     check-apt [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!     -v, --verbose    Log what is read to stderr
//!
//! OPTIONS:
//!     -c, --critical <critical>    Go critical when the lists are this many hours old [default: 168]
//!     -w, --warning <warning>      Warn when the lists are this many hours old [default: 48]
//! ```
