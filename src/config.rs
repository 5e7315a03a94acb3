use std::time::Duration;

/// Immutable settings derived from `cli::Args`, shared read-only across the
/// orchestrator, stage functions and the emitter thread.
#[derive(Clone, Debug)]
pub struct Config {
    pub cycle: Duration,
    pub runs: u64,
    pub sidecar_url: String,
    pub output: Option<String>,
    pub report_wlan: bool,
    pub max_index: Option<usize>,
    pub stats_json: bool,
    pub verbose: bool,
    pub otel_endpoint: Option<String>,
    pub log_filter: String,

    pub timeout_curl: Duration,
    pub timeout_ssh_tcp: Duration,
    pub timeout_ssh_banner: Duration,
    pub timeout_ping: Duration,
}

impl From<&crate::cli::Args> for Config {
    fn from(a: &crate::cli::Args) -> Self {
        Self {
            cycle: Duration::from_secs_f64(a.cycle.max(0.0)),
            runs: a.runs,
            sidecar_url: a.sidecar_url.clone(),
            output: a.output.clone(),
            report_wlan: !a.no_wlan,
            max_index: a.max_index,
            stats_json: a.stats_json,
            verbose: a.verbose,
            otel_endpoint: a.otel_endpoint.clone(),
            log_filter: if a.verbose { "r2lab_monitor=debug".to_string() } else { "r2lab_monitor=info".to_string() },
            timeout_curl: Duration::from_secs_f64(1.0),
            timeout_ssh_tcp: Duration::from_secs_f64(0.8),
            timeout_ssh_banner: Duration::from_secs_f64(0.7),
            timeout_ping: Duration::from_secs_f64(1.0),
        }
    }
}
