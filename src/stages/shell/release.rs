// Line-oriented parser for the concatenated remote command's stdout:
// release-file greps, a GNURADIO: version marker, and (optionally) a
// `head` dump of wireless byte counters. A direct port of the four-regex
// state machine in the original monitor, kept total (never panics, never
// returns an error) -- see SPEC_FULL.md for why that collapses one of the
// spec's failure branches into the ordinary "other" default.

use crate::info_table::WlanDirection;
use once_cell::sync::Lazy;
use regex::Regex;

static UBUNTU_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^DISTRIB_RELEASE=(?P<ver>[0-9.]+)").unwrap());
static FEDORA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Fedora release (?P<ver>\d+)").unwrap());
static GNURADIO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^GNURADIO:(?P<ver>[0-9.]+)$").unwrap());
static RXTX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^==> /sys/class/net/wlan(?P<device>[0-9])/statistics/(?P<dir>rx|tx)_bytes <==").unwrap()
});
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// A single `(device, direction, bytes)` reading scraped from a `head`
/// dump of `/sys/class/net/wlan?/statistics/{rx,tx}_bytes`.
pub type WlanSample = (u8, WlanDirection, u64);

pub struct ParsedShellOutput {
    pub os_release: String,
    pub wlan_samples: Vec<WlanSample>,
}

/// Parses the concatenated remote command's stdout per `spec.md` §4.3.
/// Default flavour is `"other"`; a GNURADIO version (if present) is always
/// appended as a `-gnuradio-<ver>` suffix regardless of flavour.
pub fn parse(output: &str) -> ParsedShellOutput {
    let mut flavour = "other".to_string();
    let mut extension = String::new();
    let mut pending_key: Option<(u8, WlanDirection)> = None;
    let mut samples = Vec::new();

    for raw_line in output.lines() {
        let line = raw_line.trim_end_matches('\r');

        if let Some(caps) = UBUNTU_RE.captures(line) {
            flavour = format!("ubuntu-{}", &caps["ver"]);
            continue;
        }
        if let Some(caps) = FEDORA_RE.captures(line) {
            flavour = format!("fedora-{}", &caps["ver"]);
            continue;
        }
        if let Some(caps) = GNURADIO_RE.captures(line) {
            extension.push_str(&format!("-gnuradio-{}", &caps["ver"]));
            continue;
        }
        if let Some(caps) = RXTX_RE.captures(line) {
            let device: u8 = caps["device"].parse().unwrap_or(0);
            let dir = WlanDirection::parse(&caps["dir"]).expect("regex only matches rx|tx");
            pending_key = Some((device, dir));
            continue;
        }
        if NUMBER_RE.is_match(line) {
            if let Some(key) = pending_key.take() {
                if let Ok(bytes) = line.parse::<u64>() {
                    samples.push((key.0, key.1, bytes));
                }
                continue;
            }
        }
        pending_key = None;
    }

    ParsedShellOutput { os_release: format!("{flavour}{extension}"), wlan_samples: samples }
}
