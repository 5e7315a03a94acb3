// Cycle Orchestrator -- runs Stage 1 -> Stage 2 -> Stage 3 over the
// configured node population once per cycle, emitting a batch after each
// stage and logging the one-line summary.

use crate::config::Config;
use crate::emitter::Emitter;
use crate::history::HistoryStore;
use crate::info_table::InfoTable;
use crate::stages::cmc::{CmcProbe, UreqCmcProbe};
use crate::stages::ping::{PingProbe, SystemPingProbe};
use crate::stages::shell::{Ssh2ShellProbe, ShellProbe};
use crate::stages::{cmc, ping, shell};
use crate::telemetry::ProbeCounters;
use crate::util;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Ceiling on how long the inter-cycle sleep waits before re-checking
/// `running`, so a termination signal arriving during the idle gap between
/// cycles is also noticed promptly rather than only at the next wake-up.
const SLEEP_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Orchestrator {
    all_ids: HashSet<u32>,
    table: InfoTable,
    history: HistoryStore,
    config: Config,
    counters: ProbeCounters,
    cycles_run: u64,
    cmc_probe: Box<dyn CmcProbe>,
    shell_probe: Box<dyn ShellProbe>,
    ping_probe: Box<dyn PingProbe>,
}

impl Orchestrator {
    /// Builds an orchestrator wired to the real network/SSH/ICMP probes.
    pub fn new(all_ids: HashSet<u32>, config: Config, counters: ProbeCounters) -> Self {
        Self::with_probes(all_ids, config, counters, Box::new(UreqCmcProbe), Box::new(Ssh2ShellProbe), Box::new(SystemPingProbe))
    }

    /// Builds an orchestrator with injected probes, letting tests substitute
    /// fakes for each stage's transport.
    pub fn with_probes(
        all_ids: HashSet<u32>,
        config: Config,
        counters: ProbeCounters,
        cmc_probe: Box<dyn CmcProbe>,
        shell_probe: Box<dyn ShellProbe>,
        ping_probe: Box<dyn PingProbe>,
    ) -> Self {
        Orchestrator {
            all_ids,
            table: InfoTable::new(),
            history: HistoryStore::new(),
            config,
            counters,
            cycles_run: 0,
            cmc_probe,
            shell_probe,
            ping_probe,
        }
    }

    /// The accumulated per-node records, as of the last completed cycle.
    pub fn table(&self) -> &InfoTable {
        &self.table
    }

    /// Runs cycles until the run budget is exhausted or `running` goes
    /// false. `running` is checked between cycles, during the inter-cycle
    /// sleep, and between stages within a cycle -- a termination signal is
    /// expected to flip it from another thread, causing the current cycle
    /// to abandon whatever stage it's mid-way through instead of running
    /// every remaining node out to its own timeout.
    pub fn run(&mut self, emitter: &dyn Emitter, running: &AtomicBool) {
        loop {
            self.run_cycle(emitter, running);
            self.cycles_run += 1;
            if !running.load(Ordering::SeqCst) {
                break;
            }
            if self.config.runs != 0 && self.cycles_run >= self.config.runs {
                break;
            }
            sleep_while_running(self.config.cycle, running);
        }
    }

    #[tracing::instrument(name = "run_cycle", skip(self, emitter, running))]
    fn run_cycle(&mut self, emitter: &dyn Emitter, running: &AtomicBool) {
        let start = Instant::now();

        let mut focus = self.all_ids.clone();
        let remaining1 =
            cmc::run_with_probe(self.cmc_probe.as_ref(), &focus, &mut self.table, &self.config, running);
        let claimed1 = difference(&focus, &remaining1);
        self.emit_batch(emitter, &claimed1);
        self.record_cmc_outcomes(&claimed1);
        if !running.load(Ordering::SeqCst) {
            return;
        }

        focus = remaining1;
        let remaining2 = shell::run_with_probe(
            self.shell_probe.as_ref(),
            &focus,
            &mut self.table,
            &mut self.history,
            &self.config,
            running,
        );
        let claimed2 = difference(&focus, &remaining2);
        self.emit_batch(emitter, &claimed2);
        self.record_ssh_outcomes(&claimed2);
        if !running.load(Ordering::SeqCst) {
            return;
        }

        focus = remaining2;
        let remaining3 =
            ping::run_with_probe(self.ping_probe.as_ref(), &focus, &mut self.table, &self.config, running);
        let claimed3 = difference(&focus, &remaining3);
        self.emit_batch(emitter, &claimed3);
        self.record_ping_outcomes(&claimed3);

        if !remaining3.is_empty() {
            tracing::warn!(ids = ?remaining3, "OOPS - unexpected remaining nodes");
        }

        self.history.age_and_evict(&refreshed_keys(&self.table, &claimed2));

        let mask = util::build_summary_mask(self.table.iter(), self.config.max_index);
        let elapsed = start.elapsed();
        tracing::info!(
            target: "monitor_summary",
            mask = %mask,
            pass1 = claimed1.len(),
            pass2 = claimed2.len(),
            pass3 = claimed3.len(),
            total = claimed1.len() + claimed2.len() + claimed3.len(),
            elapsed_s = elapsed.as_secs(),
            elapsed_ms = elapsed.subsec_millis(),
            "{mask} - {} + {} + {} = {} - {} s {} ms",
            claimed1.len(),
            claimed2.len(),
            claimed3.len(),
            claimed1.len() + claimed2.len() + claimed3.len(),
            elapsed.as_secs(),
            elapsed.subsec_millis(),
        );
    }

    fn emit_batch(&self, emitter: &dyn Emitter, ids: &HashSet<u32>) {
        if ids.is_empty() {
            return;
        }
        let payload = self.table.to_json_batch(ids);
        emitter.emit("r2lab-news", payload);
    }

    fn record_cmc_outcomes(&self, claimed: &HashSet<u32>) {
        for &id in claimed {
            if let Some(info) = self.table.locate(id) {
                if matches!(info.cmc_on_off.as_deref(), Some("off") | Some("fail")) {
                    self.counters.record_cmc_fail();
                }
            }
        }
    }

    fn record_ssh_outcomes(&self, claimed: &HashSet<u32>) {
        for &id in claimed {
            if let Some(info) = self.table.locate(id) {
                if info.control_ssh.as_deref() == Some("off") {
                    self.counters.record_ssh_off();
                }
            }
        }
    }

    fn record_ping_outcomes(&self, claimed: &HashSet<u32>) {
        for &id in claimed {
            if let Some(info) = self.table.locate(id) {
                if info.control_ping.as_deref() == Some("off") {
                    self.counters.record_ping_off();
                }
            }
        }
    }
}

fn difference(focus: &HashSet<u32>, remaining: &HashSet<u32>) -> HashSet<u32> {
    focus.difference(remaining).copied().collect()
}

/// Sleeps up to `duration`, but in `SLEEP_POLL_INTERVAL` slices so a
/// termination signal flipping `running` during the gap between cycles is
/// noticed well before the full inter-cycle wait elapses.
fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(SLEEP_POLL_INTERVAL));
    }
}

/// The set of history keys touched while processing `claimed` this cycle,
/// used to drive `HistoryStore::age_and_evict`.
fn refreshed_keys(table: &InfoTable, claimed: &HashSet<u32>) -> std::collections::HashSet<crate::history::HistoryKey> {
    let mut keys = std::collections::HashSet::new();
    for &id in claimed {
        if let Some(info) = table.locate(id) {
            for (device, dir) in info.wlan_rates.keys() {
                keys.insert((id, *device, *dir));
            }
        }
    }
    keys
}
