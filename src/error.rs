//! The one error type every check reports through
//!
//! Every variant ends up as an `UNKNOWN` outcome, see
//! [`CheckOutcome::from_error`](crate::outcome::CheckOutcome::from_error).

use std::fmt;
use std::io;
use std::num;
use std::result::Result as StdResult;

use derive_more::From;

#[derive(Debug, From)]
pub enum CheckError {
    /// A file or pseudo-file could not be read
    Io(io::Error),
    /// An external command could not be run, timed out, or failed
    #[from(ignore)]
    Command { program: String, message: String },
    /// Text we read did not look the way we expected
    #[from(ignore)]
    Parse(String),
    /// Invalid or contradictory thresholds or flags
    #[from(ignore)]
    Config(String),
    /// A measurement needed for evaluation was never collected
    #[from(ignore)]
    MissingMeasurement(String),
    /// Nothing was evaluated at all
    #[from(ignore)]
    NoChecks,
    InvalidInt(num::ParseIntError),
    InvalidFloat(num::ParseFloatError),
    InvalidJson(serde_json::Error),
}

impl CheckError {
    pub fn parse<S: Into<String>>(msg: S) -> CheckError {
        CheckError::Parse(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> CheckError {
        CheckError::Config(msg.into())
    }

    /// The short name shown before the message in UNKNOWN outcomes
    pub fn kind(&self) -> &'static str {
        use self::CheckError::*;
        match *self {
            Io(_) => "io error",
            Command { .. } => "command error",
            Parse(_) | InvalidInt(_) | InvalidFloat(_) | InvalidJson(_) => "parse error",
            Config(_) => "configuration error",
            MissingMeasurement(_) | NoChecks => "evaluation error",
        }
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter) -> StdResult<(), fmt::Error> {
        use self::CheckError::*;
        match self {
            Io(e) => write!(f, "{}", e),
            Command { program, message } => write!(f, "{}: {}", program, message),
            Parse(msg) => write!(f, "{}", msg),
            Config(msg) => write!(f, "{}", msg),
            MissingMeasurement(name) => write!(f, "missing measurement '{}'", name),
            NoChecks => write!(f, "no checks configured"),
            InvalidInt(e) => write!(f, "{}", e),
            InvalidFloat(e) => write!(f, "{}", e),
            InvalidJson(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CheckError {}

pub type Result<T> = StdResult<T, CheckError>;
