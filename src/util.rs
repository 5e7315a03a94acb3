//! Formatting helpers shared by the orchestrator and telemetry init.

use crate::info_table::NodeInfo;
use std::time::Duration;

/// Formats a `std::time::Duration` into a human-readable string.
#[inline]
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// One mask character per node, precedence matching the original
/// `one_char_summary`: CMC status first, then ping, then ssh, then release
/// flavour.
pub fn one_char_summary(info: &NodeInfo) -> char {
    if let Some(v) = &info.cmc_on_off {
        if v != "on" {
            return '.';
        }
    }
    if let Some(v) = &info.control_ping {
        if v != "on" {
            return 'o';
        }
    }
    if let Some(v) = &info.control_ssh {
        if v != "on" {
            return '0';
        }
    }
    if let Some(release) = &info.os_release {
        if release.contains("fedora") {
            return 'F';
        }
        if release.contains("ubuntu") {
            return 'U';
        }
    }
    '^'
}

/// Builds the one-line mask for the cycle's current table state. Without
/// `max_index`, one character per record in table order. With it, a fixed
/// `max_index`-wide string indexed by node id (1-based), `'_'` for any
/// position no record claims.
pub fn build_summary_mask<'a>(records: impl Iterator<Item = &'a NodeInfo>, max_index: Option<usize>) -> String {
    match max_index {
        None => records.map(one_char_summary).collect(),
        Some(width) => {
            let mut mask = vec!['_'; width];
            for info in records {
                if info.id >= 1 && (info.id as usize) <= width {
                    mask[info.id as usize - 1] = one_char_summary(info);
                }
            }
            mask.into_iter().collect()
        }
    }
}
