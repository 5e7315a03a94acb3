// Executes external commands and arbitrary blocking operations under a hard
// wall-clock deadline. No signal-based alarms: a worker thread races the
// deadline on a rendezvous channel, or a spawned child is polled and reaped
// if it overruns.

use crossbeam_channel::{bounded, RecvTimeoutError};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Failure modes exposed by the runner's specializations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// The operation did not finish before its deadline.
    Timeout,
    /// The child process exited with a non-zero status.
    NonZeroExit(i32),
    /// The child process could not be spawned at all.
    SpawnFailed(String),
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::Timeout => write!(f, "operation timed out"),
            RunnerError::NonZeroExit(code) => write!(f, "command exited with status {code}"),
            RunnerError::SpawnFailed(msg) => write!(f, "failed to spawn command: {msg}"),
        }
    }
}

impl std::error::Error for RunnerError {}

/// Runs an arbitrary blocking closure on a detached thread, and waits for it
/// on a rendezvous channel up to `deadline`. Used for in-process network
/// probes (the CMC HTTP GET) where no child process is involved.
pub fn call_with_deadline<T, F>(op: F, deadline: Duration) -> Result<T, RunnerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(op());
    });
    match rx.recv_timeout(deadline) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
            Err(RunnerError::Timeout)
        }
    }
}

/// Spawns `command`, polling for completion against `deadline`. Returns
/// `(exit_ok, exit_code, stdout)`: `exit_code` is the child's raw status
/// code whenever it actually exited (success or not), `None` on timeout or
/// a failure to spawn. Stderr is discarded. Stdout is decoded best-effort
/// (invalid UTF-8 bytes are replaced).
pub fn run_with_deadline(command: &mut Command, deadline: Duration) -> (bool, Option<i32>, String) {
    command.stdout(Stdio::piped()).stderr(Stdio::null());
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(_) => return (false, None, String::new()),
    };

    let start = Instant::now();
    let poll_interval = Duration::from_millis(20);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let mut stdout_buf = Vec::new();
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_end(&mut stdout_buf);
                }
                if status.success() {
                    return (true, status.code(), String::from_utf8_lossy(&stdout_buf).into_owned());
                }
                return (false, status.code(), String::new());
            }
            Ok(None) => {
                if start.elapsed() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return (false, None, String::new());
                }
                thread::sleep(poll_interval);
            }
            Err(_) => return (false, None, String::new()),
        }
    }
}

/// Runs `command` under `deadline`; returns stdout on success,
/// `RunnerError::Timeout` otherwise (a non-zero exit and a true timeout
/// both collapse to `Timeout` here -- `check_call` below is the
/// specialization that tells them apart).
pub fn check_output(command: &mut Command, deadline: Duration) -> Result<String, RunnerError> {
    let (ok, _code, out) = run_with_deadline(command, deadline);
    if ok {
        Ok(out)
    } else {
        Err(RunnerError::Timeout)
    }
}

/// Runs `command` under `deadline`, discarding stdout; distinguishes a true
/// timeout (or a failure to spawn) from a clean but non-zero exit, which
/// `run_with_deadline` reports via the child's own `status.code()`.
pub fn check_call(command: &mut Command, deadline: Duration) -> Result<(), RunnerError> {
    let (ok, code, _) = run_with_deadline(command, deadline);
    if ok {
        Ok(())
    } else if let Some(code) = code {
        Err(RunnerError::NonZeroExit(code))
    } else {
        Err(RunnerError::Timeout)
    }
}
