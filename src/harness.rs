//! The process boundary every check binary goes through

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};

use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::outcome::CheckOutcome;

/// Environment variable holding a `tracing` filter, e.g. `host_checks=trace`
pub const LOG_ENV: &str = "HOST_CHECKS_LOG";

/// Send logs to stderr
///
/// Monitoring systems only read stdout, so logging is off unless asked for
/// with `verbose` or `HOST_CHECKS_LOG`.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "off" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Run `check`, print its outcome, and exit with its status code
///
/// Errors and panics inside `check` become `UNKNOWN`.
pub fn run<F>(check_name: &str, verbose: bool, check: F) -> !
where
    F: FnOnce() -> Result<CheckOutcome>,
{
    init_logging(verbose);
    let outcome = outcome_of(check);
    println!("{}", outcome.render(check_name));
    outcome.status.exit()
}

/// Run `check` and convert every way it can fail into an outcome
pub fn outcome_of<F>(check: F) -> CheckOutcome
where
    F: FnOnce() -> Result<CheckOutcome>,
{
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let result = panic::catch_unwind(AssertUnwindSafe(check));
    panic::set_hook(previous_hook);

    match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            tracing::debug!(error = ?e, "check failed");
            CheckOutcome::from_error(&e)
        }
        Err(payload) => CheckOutcome::unknown(format!("panic: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown cause".to_owned()
    }
}

#[cfg(test)]
mod unit {
    use super::outcome_of;
    use crate::error::CheckError;
    use crate::outcome::CheckOutcome;
    use crate::Status;

    #[test]
    fn passes_outcomes_through() {
        let outcome = outcome_of(|| Ok(CheckOutcome::unknown("fine")));
        assert_eq!(outcome.details, ["fine"]);

        let outcome = outcome_of(|| {
            Ok(CheckOutcome::new(
                Status::Warning,
                vec![],
                Default::default(),
            ))
        });
        assert_eq!(outcome.status, Status::Warning);
    }

    #[test]
    fn errors_become_unknown() {
        let outcome = outcome_of(|| {
            let n: u64 = "twelve".parse()?;
            Ok(CheckOutcome::unknown(n.to_string()))
        });
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(
            outcome.render("TEST"),
            "TEST UNKNOWN - parse error: invalid digit found in string"
        );

        let outcome = outcome_of(|| Err(CheckError::MissingMeasurement("temp".into())));
        assert_eq!(
            outcome.details,
            ["evaluation error: missing measurement 'temp'"]
        );
    }

    #[test]
    fn panics_become_unknown() {
        let outcome = outcome_of(|| panic!("index out of bounds"));
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(outcome.details, ["panic: index out of bounds"]);

        let outcome = outcome_of(|| -> crate::error::Result<CheckOutcome> {
            let v: Vec<u8> = Vec::new();
            panic!("bad index {}", v.len())
        });
        assert_eq!(outcome.details, ["panic: bad index 0"]);
    }
}
