// Stage 1 -- CMC status. Each node's chassis-management controller exposes
// a tiny HTTP endpoint at reboot<ID>/status; "on" continues to Stage 2,
// anything else (including timeout) ends the node's cycle here.

use crate::config::Config;
use crate::info_table::{FieldOverlay, InfoTable};
use crate::runner::{call_with_deadline, RunnerError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Composes the CMC hostname for a node id, e.g. `reboot07`.
pub fn cmc_hostname(id: u32) -> String {
    format!("reboot{id:02}")
}

/// Abstracts the CMC's HTTP GET so tests can substitute canned responses
/// without touching a real network.
pub trait CmcProbe: Send + Sync {
    fn status(&self, host: &str, deadline: Duration) -> Result<String, RunnerError>;
}

/// Production probe: a single `GET http://<host>/status` under `deadline`,
/// run through the Timed Command Runner so a hung socket cannot stall the
/// cycle.
pub struct UreqCmcProbe;

impl CmcProbe for UreqCmcProbe {
    fn status(&self, host: &str, deadline: Duration) -> Result<String, RunnerError> {
        let url = format!("http://{host}/status");
        call_with_deadline(
            move || ureq::get(&url).call().ok().and_then(|resp| resp.into_string().ok()),
            deadline,
        )
        .and_then(|body| body.ok_or(RunnerError::Timeout))
    }
}

/// Runs Stage 1 over `ids` using the given probe, returning the ids that
/// continue to Stage 2 (those reporting "on"). Checked once per node: if
/// `running` goes false mid-loop (a termination signal), the remaining
/// ids are abandoned untouched rather than run out to their own timeouts.
pub fn run_with_probe(
    probe: &dyn CmcProbe,
    ids: &HashSet<u32>,
    table: &mut InfoTable,
    config: &Config,
    running: &AtomicBool,
) -> HashSet<u32> {
    let mut remaining = HashSet::new();
    for &id in ids {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let host = cmc_hostname(id);
        match probe.status(&host, config.timeout_curl) {
            Ok(body) if body.trim() == "on" => {
                table.insert_or_refine(id, &[FieldOverlay::cmc("on")]);
                remaining.insert(id);
            }
            Ok(body) if body.trim() == "off" => {
                tracing::debug!(node = id, "CMC reports off");
                table.insert_or_refine(id, &[FieldOverlay::cmc("off"), FieldOverlay::padding_off()]);
            }
            Ok(body) => {
                tracing::debug!(node = id, body = %body.trim(), "CMC returned unexpected body");
                table.insert_or_refine(id, &[FieldOverlay::cmc("fail"), FieldOverlay::padding_off()]);
            }
            Err(err) => {
                tracing::debug!(node = id, error = %err, "CMC status probe failed");
                table.insert_or_refine(id, &[FieldOverlay::cmc("fail"), FieldOverlay::padding_off()]);
            }
        }
    }
    remaining
}

/// Runs Stage 1 with the real HTTP probe.
pub fn run(ids: &HashSet<u32>, table: &mut InfoTable, config: &Config, running: &AtomicBool) -> HashSet<u32> {
    run_with_probe(&UreqCmcProbe, ids, table, config, running)
}
