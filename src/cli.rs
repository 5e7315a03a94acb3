use clap::Parser;

/// Periodic, multi-stage prober for the r2lab wireless testbed.
///
/// For each configured node, on every cycle: query its chassis-management
/// controller, fall back to an admin shell probe for OS release and
/// wireless byte rates, and fall back further to a plain control ping.
/// Results are streamed incrementally to the sidecar message bus as they
/// become available within the cycle.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "Periodic, multi-stage prober for the r2lab wireless testbed.\n\
Every cycle, for each node, runs CMC status -> admin shell -> control ping in order, \
emitting a batch to the sidecar bus after each stage completes.\n\
\n\
EXAMPLES:\n\
  # Default: probe nodes 1..37 forever, 3s between cycles\n\
  r2lab-monitor\n\
\n\
  # Probe a handful of nodes, 5 cycles, verbose\n\
  r2lab-monitor -v -c 5 -r 5 1 2 3\n\
\n\
  # Disable wireless rate reporting, log to a file\n\
  r2lab-monitor -w -o /var/log/r2lab-monitor.log\n\
\n\
See README for more details."
)]
pub struct Args {
    /// Verbose logging.
    #[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Cycle duration in seconds between successive probing passes.
    #[arg(short = 'c', long, default_value = "3.0", value_name = "SEC")]
    pub cycle: f64,

    /// Number of cycles to run; 0 means run forever.
    #[arg(short = 'r', long, default_value = "0", value_name = "N")]
    pub runs: u64,

    /// Sidecar URL (scheme://host:port) that receives the news feed.
    #[arg(short = 's', long, default_value = "ws://r2lab.example:443/", value_name = "URL")]
    pub sidecar_url: String,

    /// Append-mode log file; defaults to stdout.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<String>,

    /// Disable wireless rx/tx rate reporting.
    #[arg(short = 'w', long, action = clap::ArgAction::SetTrue)]
    pub no_wlan: bool,

    /// Show the one-line summary mask in the context of 1..N, padding
    /// untouched positions with '_'.
    #[arg(short = 'm', long, value_name = "N")]
    pub max_index: Option<usize>,

    /// Emit statistics/summaries as JSON lines instead of human-readable text.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stats_json: bool,

    /// OTLP endpoint for probe-outcome metrics; unset disables metrics export.
    #[arg(long, value_name = "URL")]
    pub otel_endpoint: Option<String>,

    /// Nodes to probe: integers, or strings containing digits (e.g. "fit07").
    /// Defaults to 1..37 when empty.
    #[arg(value_name = "NODE")]
    pub nodes: Vec<String>,
}

pub fn parse_args() -> Args {
    Args::parse()
}

/// Matches a leading/embedded run of digits in a CLI node token, mirroring
/// the original `[^0-9]*(?P<id>\d+)` pattern: `"fit07"` -> `7`.
pub fn normalize_node_arg(token: &str) -> Option<u32> {
    let digits: String = token.chars().skip_while(|c| !c.is_ascii_digit()).take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Default node population, 1..=37, used when no positional nodes are given.
pub fn default_nodes() -> Vec<u32> {
    (1..=37).collect()
}
