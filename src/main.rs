// Main application entry point. Parses arguments, validates the sidecar
// URL, wires signal handling, and runs the cycle orchestrator until the
// run budget is exhausted or a termination signal arrives.

use r2lab_monitor::cli::{self, default_nodes, normalize_node_arg};
use r2lab_monitor::config::Config;
use r2lab_monitor::emitter::{Emitter, WebSocketEmitter};
use r2lab_monitor::orchestrator::Orchestrator;
use r2lab_monitor::telemetry::{self, ProbeCounters};
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn resolve_node_ids(args: &cli::Args) -> std::collections::HashSet<u32> {
    if args.nodes.is_empty() {
        default_nodes().into_iter().collect()
    } else {
        args.nodes.iter().filter_map(|token| normalize_node_arg(token)).collect()
    }
}

fn main() {
    let args = cli::parse_args();
    let config = Config::from(&args);
    let meter = telemetry::init_tracing(&config);
    let counters = ProbeCounters::new(meter.as_ref());

    let emitter: Box<dyn Emitter> = match WebSocketEmitter::new(&config.sidecar_url) {
        Ok(emitter) => Box::new(emitter),
        Err(e) => {
            tracing::error!(error = %e, url = %config.sidecar_url, "malformed sidecar URL");
            exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_for_signal = running.clone();
    let mut signals = match Signals::new([SIGHUP, SIGQUIT, SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            exit(1);
        }
    };
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            tracing::warn!(signal = sig, "received termination signal");
            running_for_signal.store(false, Ordering::SeqCst);
        }
    });

    let all_ids = resolve_node_ids(&args);
    let mut orchestrator = Orchestrator::new(all_ids, config, counters);

    orchestrator.run(emitter.as_ref(), &running);

    emitter.close();

    if !running.load(Ordering::SeqCst) {
        exit(1);
    }
}
