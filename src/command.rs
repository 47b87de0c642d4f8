//! Run external programs and collect what they print

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{CheckError, Result};

/// How often we look at a child that has not exited yet
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The captured result of running a program
#[derive(Debug)]
pub struct Output {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, optionally killing it after `timeout`
///
/// A non-zero exit status is an error carrying the program's stderr.
pub fn run(program: &str, args: &[&str], timeout: Option<Duration>) -> Result<String> {
    let output = run_unchecked(program, args, timeout)?;
    if output.status.success() {
        Ok(output.stdout)
    } else {
        let stderr = output.stderr.trim();
        Err(CheckError::Command {
            program: program.to_owned(),
            message: if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                format!("exited with {}: {}", output.status, stderr)
            },
        })
    }
}

/// Like `run`, but hand back the output whatever the exit status was
pub fn run_unchecked(program: &str, args: &[&str], timeout: Option<Duration>) -> Result<Output> {
    debug!(program, ?args, "running");
    let command_error = |message: String| CheckError::Command {
        program: program.to_owned(),
        message,
    };
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| command_error(format!("unable to start: {}", e)))?;

    // Drain both pipes while we wait so a chatty child can't fill them and
    // block forever.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        Some(timeout) => wait_with_deadline(&mut child, timeout)
            .map_err(|e| command_error(format!("{}", e)))?
            .ok_or_else(|| {
                command_error(format!("timed out after {}s", timeout.as_secs_f64()))
            })?,
        None => child
            .wait()
            .map_err(|e| command_error(format!("{}", e)))?,
    };

    let output = Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    };
    debug!(program, status = %output.status, bytes = output.stdout.len(), "finished");
    Ok(output)
}

/// Read a pipe to the end, replacing invalid UTF-8 rather than dropping it
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut contents = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut contents) {
                debug!(error = %e, read = contents.len(), "pipe closed early");
            }
        }
        String::from_utf8_lossy(&contents).into_owned()
    })
}

/// Wait for `child`, killing it if it outlives `timeout`
///
/// Returns `None` if it had to be killed.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
