// tests/property_tests.rs
use proptest::prelude::*;
use r2lab_monitor::config::Config;
use r2lab_monitor::history::HistoryStore;
use r2lab_monitor::info_table::{FieldOverlay, InfoTable, WlanDirection};
use r2lab_monitor::runner::RunnerError;
use r2lab_monitor::stages::cmc::{self, CmcProbe};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const MAX_IDS: usize = 40;

fn config() -> Config {
    Config::from(&r2lab_monitor::cli::Args {
        verbose: false,
        cycle: 0.0,
        runs: 0,
        sidecar_url: "ws://x:443/".into(),
        output: None,
        no_wlan: false,
        max_index: None,
        stats_json: false,
        otel_endpoint: None,
        nodes: vec![],
    })
}

/// Every id maps to exactly one of four CMC outcomes; a probe built from
/// this map answers deterministically for any id in the generated set.
#[derive(Debug, Clone, Copy)]
enum CmcOutcome {
    On,
    Off,
    Garbage,
    Timeout,
}

fn arb_outcome() -> impl Strategy<Value = CmcOutcome> {
    prop_oneof![
        Just(CmcOutcome::On),
        Just(CmcOutcome::Off),
        Just(CmcOutcome::Garbage),
        Just(CmcOutcome::Timeout),
    ]
}

/// A set of ids paired with an independently chosen outcome for each.
fn arb_ids_with_outcomes() -> impl Strategy<Value = Vec<(u32, CmcOutcome)>> {
    prop::collection::hash_set(1..=500u32, 0..=MAX_IDS)
        .prop_flat_map(|ids| {
            let ids: Vec<u32> = ids.into_iter().collect();
            let len = ids.len();
            (Just(ids), prop::collection::vec(arb_outcome(), len))
        })
        .prop_map(|(ids, outcomes)| ids.into_iter().zip(outcomes).collect())
}

struct ScriptedCmcProbe {
    responses: HashMap<String, Result<String, RunnerError>>,
}

impl CmcProbe for ScriptedCmcProbe {
    fn status(&self, host: &str, _deadline: Duration) -> Result<String, RunnerError> {
        self.responses.get(host).cloned().unwrap_or(Err(RunnerError::Timeout))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The ids a stage hands back ("remaining") and the ids it claims are
    /// always a strict partition of the focus set it was given: no id is
    /// dropped, none is duplicated into both buckets.
    #[test]
    fn cmc_stage_claim_set_partitions_focus(scripted in arb_ids_with_outcomes()) {
        let ids: HashSet<u32> = scripted.iter().map(|(id, _)| *id).collect();
        let responses = scripted
            .iter()
            .map(|(id, outcome)| {
                let host = cmc::cmc_hostname(*id);
                let response = match outcome {
                    CmcOutcome::On => Ok("on".to_string()),
                    CmcOutcome::Off => Ok("off".to_string()),
                    CmcOutcome::Garbage => Ok("what".to_string()),
                    CmcOutcome::Timeout => Err(RunnerError::Timeout),
                };
                (host, response)
            })
            .collect();
        let probe = ScriptedCmcProbe { responses };

        let mut table = InfoTable::new();
        let remaining = cmc::run_with_probe(&probe, &ids, &mut table, &config(), &AtomicBool::new(true));

        prop_assert!(remaining.is_subset(&ids));
        let claimed: HashSet<u32> = ids.difference(&remaining).copied().collect();
        prop_assert!(remaining.is_disjoint(&claimed));
        let reunited: HashSet<u32> = remaining.union(&claimed).copied().collect();
        prop_assert_eq!(reunited, ids.clone());

        // Every claimed id only ever claimed because it did NOT report "on".
        for id in &claimed {
            let outcome = scripted.iter().find(|(oid, _)| oid == id).unwrap().1;
            prop_assert!(!matches!(outcome, CmcOutcome::On));
        }
        // Every id still in focus reported "on".
        for id in &remaining {
            let outcome = scripted.iter().find(|(oid, _)| oid == id).unwrap().1;
            prop_assert!(matches!(outcome, CmcOutcome::On));
        }
    }
}

fn arb_overlay() -> impl Strategy<Value = FieldOverlay> {
    (
        prop::option::of("(on|off|fail)"),
        prop::option::of("(on|off)"),
        prop::option::of("(on|off)"),
        prop::option::of("[a-z-]{3,10}"),
    )
        .prop_map(|(cmc_on_off, control_ssh, control_ping, os_release)| FieldOverlay {
            cmc_on_off,
            control_ssh,
            control_ping,
            os_release,
            wlan_rates: Vec::new(),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Applying the same overlay sequence twice leaves the record exactly
    /// where the first application left it -- `insert_or_refine` overwrites
    /// fields, it never accumulates or toggles them.
    #[test]
    fn insert_or_refine_is_idempotent(overlays in prop::collection::vec(arb_overlay(), 0..8)) {
        let mut once = InfoTable::new();
        once.insert_or_refine(1, &overlays);
        let first = once.locate(1).unwrap().clone();

        once.insert_or_refine(1, &overlays);
        let second = once.locate(1).unwrap().clone();

        prop_assert_eq!(first.cmc_on_off, second.cmc_on_off);
        prop_assert_eq!(first.control_ssh, second.control_ssh);
        prop_assert_eq!(first.control_ping, second.control_ping);
        prop_assert_eq!(first.os_release, second.os_release);
    }

    /// Splitting one `insert_or_refine` call with N overlays into N
    /// single-overlay calls (same order) must produce the same record --
    /// overlay application is associative under the "later wins" rule.
    #[test]
    fn insert_or_refine_is_associative_over_overlay_order(overlays in prop::collection::vec(arb_overlay(), 0..8)) {
        let mut combined = InfoTable::new();
        combined.insert_or_refine(1, &overlays);

        let mut sequential = InfoTable::new();
        for overlay in &overlays {
            sequential.insert_or_refine(1, std::slice::from_ref(overlay));
        }

        let a = combined.locate(1).unwrap();
        let b = sequential.locate(1).unwrap();
        prop_assert_eq!(&a.cmc_on_off, &b.cmc_on_off);
        prop_assert_eq!(&a.control_ssh, &b.control_ssh);
        prop_assert_eq!(&a.control_ping, &b.control_ping);
        prop_assert_eq!(&a.os_release, &b.os_release);
    }
}

/// A monotonically non-decreasing byte counter paired with a strictly
/// increasing timestamp, the shape a real `/sys/class/net/.../rx_bytes`
/// poll sequence takes.
fn arb_monotonic_samples() -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::vec((0u32..1_000_000, 1u32..3600), 0..30).prop_map(|deltas| {
        let mut bytes = 0u64;
        let mut timestamp = 0.0f64;
        deltas
            .into_iter()
            .map(|(byte_delta, time_delta)| {
                bytes += byte_delta as u64;
                timestamp += time_delta as f64;
                (bytes, timestamp)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Feeding a strictly increasing timestamp series into `HistoryStore`
    /// never yields a rate before the second sample, and every computed
    /// rate is non-negative (a non-decreasing counter over a positive time
    /// delta can't produce a negative bits/sec figure).
    #[test]
    fn history_rate_is_defined_only_from_the_second_sample_onward(samples in arb_monotonic_samples()) {
        let mut history = HistoryStore::new();
        let key = (5u32, 0u8, WlanDirection::Rx);

        for (index, (bytes, timestamp)) in samples.iter().enumerate() {
            let sample = history.sample(key, *bytes, *timestamp);
            if index == 0 {
                prop_assert!(sample.rate_bps.is_none());
            } else if let Some(rate) = sample.rate_bps {
                prop_assert!(rate >= 0.0);
            }
        }
    }

    /// Replaying the exact same (bytes, timestamp) pair twice in a row
    /// (a stalled poll reusing the previous tick) never produces a rate --
    /// `dt <= 0.0` is rejected rather than divided by.
    #[test]
    fn history_rejects_non_positive_time_delta(bytes in 0u64..1_000_000_000, timestamp in 0.0f64..1_000_000.0) {
        let mut history = HistoryStore::new();
        let key = (5u32, 0u8, WlanDirection::Rx);
        history.sample(key, bytes, timestamp);
        let repeat = history.sample(key, bytes + 1, timestamp);
        prop_assert!(repeat.rate_bps.is_none());
    }
}
