//! Fake probes and a recording emitter shared by the integration tests.

use r2lab_monitor::emitter::Emitter;
use r2lab_monitor::runner::RunnerError;
use r2lab_monitor::stages::cmc::CmcProbe;
use r2lab_monitor::stages::ping::PingProbe;
use r2lab_monitor::stages::shell::{ShellError, ShellProbe};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Canned CMC responses keyed by hostname (e.g. `reboot07`).
#[derive(Default)]
pub struct FakeCmcProbe {
    pub responses: HashMap<String, Result<String, RunnerError>>,
}

impl CmcProbe for FakeCmcProbe {
    fn status(&self, host: &str, _deadline: Duration) -> Result<String, RunnerError> {
        self.responses.get(host).cloned().unwrap_or(Err(RunnerError::Timeout))
    }
}

/// Canned shell-probe outcomes keyed by hostname (e.g. `fit07`).
#[derive(Default)]
pub struct FakeShellProbe {
    pub responses: HashMap<String, Result<String, ShellError>>,
}

impl ShellProbe for FakeShellProbe {
    fn run(&self, host: &str, _command: &str, _tcp: Duration, _banner: Duration) -> Result<String, ShellError> {
        self.responses.get(host).cloned().unwrap_or(Err(ShellError::ConnectFailed))
    }
}

/// Canned ping verdicts keyed by hostname.
#[derive(Default)]
pub struct FakePingProbe {
    pub verdicts: HashMap<String, bool>,
}

impl PingProbe for FakePingProbe {
    fn ping(&self, host: &str, _deadline: Duration) -> bool {
        *self.verdicts.get(host).unwrap_or(&false)
    }
}

/// Captures every emitted `(channel, payload)` pair for assertions instead
/// of writing to a real sidecar socket.
#[derive(Default)]
pub struct RecordingEmitter {
    pub emitted: Mutex<Vec<(String, String)>>,
}

impl Emitter for RecordingEmitter {
    fn emit(&self, channel: &str, payload: String) {
        self.emitted.lock().expect("recording emitter mutex poisoned").push((channel.to_string(), payload));
    }
}

impl RecordingEmitter {
    pub fn new() -> Self {
        RecordingEmitter::default()
    }

    pub fn batches(&self) -> Vec<(String, String)> {
        self.emitted.lock().expect("recording emitter mutex poisoned").clone()
    }
}
