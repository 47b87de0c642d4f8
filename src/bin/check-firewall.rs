//! Check that the live firewall matches the saved ruleset

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use structopt::StructOpt;

use host_checks::command;
use host_checks::error::Result;
use host_checks::harness;
use host_checks::outcome::{CheckOutcome, Evaluation};
use host_checks::Status;

/// Check that the rules loaded in the kernel are the rules saved on disk
///
/// Compares the output of iptables-save (ip6tables-save with --ipv6) with
/// the ruleset that is restored at boot. Comments, packet counters and
/// COMMIT lines are ignored. Each chain must hold the same rules in the same
/// order.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-firewall (part of host-checks)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(long = "ipv6", help = "Check the IPv6 firewall")]
    ipv6: bool,
    #[structopt(
        long = "rules-file",
        help = "Saved rules to compare against [default: /etc/iptables/rules.v4 or rules.v6]",
        parse(from_os_str)
    )]
    rules_file: Option<PathBuf>,
    #[structopt(
        long = "mismatch-status",
        help = "Status when the live rules differ: ok, warning, critical or unknown",
        default_value = "critical"
    )]
    mismatch_status: Status,
    #[structopt(
        long = "timeout",
        help = "Seconds to wait for iptables-save",
        default_value = "10"
    )]
    timeout: u64,
    #[structopt(short = "v", long = "verbose", help = "Log what is read to stderr")]
    verbose: bool,
}

impl Args {
    fn rules_file(&self) -> PathBuf {
        match (&self.rules_file, self.ipv6) {
            (Some(path), _) => path.clone(),
            (None, false) => PathBuf::from("/etc/iptables/rules.v4"),
            (None, true) => PathBuf::from("/etc/iptables/rules.v6"),
        }
    }

    fn save_command(&self) -> &'static str {
        if self.ipv6 {
            "ip6tables-save"
        } else {
            "iptables-save"
        }
    }
}

lazy_static! {
    // "[0:0]" chain counters and the "-c"-style prefix counters
    static ref COUNTERS: Regex = Regex::new(r"\s*\[[0-9]+:[0-9]+\]\s*").unwrap();
}

/// One line of a ruleset, qualified by the table and chain it belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Rule {
    table: String,
    chain: String,
    line: String,
}

impl Rule {
    fn is_append(&self) -> bool {
        self.line.starts_with("-A ")
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", self.table, self.line)
    }
}

/// `:INPUT DROP` and `-A INPUT ...` both belong to INPUT
fn chain_of(line: &str) -> String {
    let mut words = line.split_whitespace();
    match words.next() {
        Some(first) if first.starts_with(':') => first[1..].to_owned(),
        Some(_) => words.next().unwrap_or_default().to_owned(),
        None => String::new(),
    }
}

/// The comparable content of iptables-save output, in file order
fn normalise(ruleset: &str) -> Vec<Rule> {
    let mut table = String::new();
    let mut rules = Vec::new();
    for line in ruleset.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line == "COMMIT" {
            continue;
        }
        if let Some(name) = line.strip_prefix('*') {
            table = name.to_owned();
            continue;
        }
        let line = COUNTERS.replace_all(line, " ").trim().to_owned();
        rules.push(Rule {
            table: table.clone(),
            chain: chain_of(&line),
            line,
        });
    }
    rules
}

/// Rules of `ours` with no counterpart in `theirs`, a repeated rule needs
/// as many counterparts as it has repeats
fn unmatched<'a>(ours: &'a [Rule], theirs: &[Rule]) -> Vec<&'a Rule> {
    let mut available: BTreeMap<Rule, usize> = BTreeMap::new();
    for rule in theirs {
        *available.entry(rule.clone()).or_insert(0) += 1;
    }
    ours.iter()
        .filter(|rule| match available.get_mut(*rule) {
            Some(n) if *n > 0 => {
                *n -= 1;
                false
            }
            _ => true,
        })
        .collect()
}

fn by_chain(rules: &[Rule]) -> BTreeMap<(String, String), Vec<String>> {
    let mut chains: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for rule in rules {
        chains
            .entry((rule.table.clone(), rule.chain.clone()))
            .or_default()
            .push(rule.line.clone());
    }
    chains
}

/// Chains holding the same rules in a different order, as `[table] chain`
fn reordered(live: &[Rule], saved: &[Rule]) -> Vec<String> {
    let live = by_chain(live);
    by_chain(saved)
        .into_iter()
        .filter(|(key, lines)| live.get(key) != Some(lines))
        .map(|((table, chain), _)| format!("[{}] {}", table, chain))
        .collect()
}

fn do_check(args: &Args, saved_from: &str, live: &str, saved: &str) -> Result<CheckOutcome> {
    let live = normalise(live);
    let saved = normalise(saved);
    let missing = unmatched(&saved, &live);
    let extra = unmatched(&live, &saved);

    let mut eval = Evaluation::new();
    if !missing.is_empty() || !extra.is_empty() {
        eval.record(args.mismatch_status);
        eval.detail(format!(
            "live rules differ from {}: {} missing, {} extra",
            saved_from,
            missing.len(),
            extra.len()
        ));
        for rule in missing {
            eval.detail(format!("missing: {}", rule));
        }
        for rule in extra {
            eval.detail(format!("extra: {}", rule));
        }
    } else {
        // same rules, so only the order within a chain can differ
        let chains = reordered(&live, &saved);
        if chains.is_empty() {
            eval.record(Status::Ok);
            eval.detail(format!(
                "live rules match {} ({} rules)",
                saved_from,
                live.iter().filter(|r| r.is_append()).count()
            ));
        } else {
            eval.record(args.mismatch_status);
            eval.detail(format!(
                "live rules are ordered differently from {} in {} chains",
                saved_from,
                chains.len()
            ));
            for chain in chains {
                eval.detail(format!("reordered: {}", chain));
            }
        }
    }
    eval.perf("live_rules", live.iter().filter(|r| r.is_append()).count() as f64);
    eval.perf("saved_rules", saved.iter().filter(|r| r.is_append()).count() as f64);
    Ok(eval.finish())
}

fn read_saved(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)).into())
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::from_args();
    harness::run("FIREWALL", args.verbose, || {
        let rules_file = args.rules_file();
        let saved = read_saved(&rules_file)?;
        let live = command::run(
            args.save_command(),
            &[],
            Some(Duration::from_secs(args.timeout)),
        )?;
        do_check(&args, &rules_file.display().to_string(), &live, &saved)
    });
}
