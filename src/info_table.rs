// Defines NodeInfo, the sparse per-node record, and InfoTable, the ordered
// in-memory collection the orchestrator and stages share. Mirrors the
// "list of dicts, locate by id" design of the original monitor: insertion
// order is preserved and matters for the one-line summary display.

use serde::Serialize;
use std::collections::BTreeMap;

/// Wireless traffic direction for a `wlanK_<dir>_rate` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WlanDirection {
    Rx,
    Tx,
}

impl WlanDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            WlanDirection::Rx => "rx",
            WlanDirection::Tx => "tx",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rx" => Some(WlanDirection::Rx),
            "tx" => Some(WlanDirection::Tx),
            _ => None,
        }
    }
}

/// One record per monitored node. Optional fields are `None` until a stage
/// has observed them; once set, later stages and cycles may overwrite them
/// but never remove them (removal is not part of the core's contract).
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub id: u32,
    pub cmc_on_off: Option<String>,
    pub control_ssh: Option<String>,
    pub control_ping: Option<String>,
    pub os_release: Option<String>,
    /// Keyed by (device index, direction) -> bits/sec. Sparse: absent devices
    /// are simply not in the map, `clear_wireless` zeroes existing keys.
    pub wlan_rates: BTreeMap<(u8, WlanDirection), f64>,
}

impl NodeInfo {
    pub fn new(id: u32) -> Self {
        NodeInfo { id, ..Default::default() }
    }

    /// Overlay a set of field updates onto this record, in the given order.
    /// Later overlays win on conflicting keys, matching
    /// `dict.update(override)` chained calls in the source.
    pub fn apply_overlay(&mut self, overlay: &FieldOverlay) {
        if let Some(v) = &overlay.cmc_on_off {
            self.cmc_on_off = Some(v.clone());
        }
        if let Some(v) = &overlay.control_ssh {
            self.control_ssh = Some(v.clone());
        }
        if let Some(v) = &overlay.control_ping {
            self.control_ping = Some(v.clone());
        }
        if let Some(v) = &overlay.os_release {
            self.os_release = Some(v.clone());
        }
        for (k, v) in &overlay.wlan_rates {
            self.wlan_rates.insert(*k, *v);
        }
    }

    /// Set every wireless rate field currently present to 0.0, matching
    /// `cleanup_wlan_infos`. A no-op if no wireless fields have ever been
    /// observed for this node.
    pub fn clear_wireless(&mut self) {
        for v in self.wlan_rates.values_mut() {
            *v = 0.0;
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("id".into(), serde_json::Value::from(self.id));
        if let Some(v) = &self.cmc_on_off {
            obj.insert("cmc_on_off".into(), serde_json::Value::from(v.clone()));
        }
        if let Some(v) = &self.control_ssh {
            obj.insert("control_ssh".into(), serde_json::Value::from(v.clone()));
        }
        if let Some(v) = &self.control_ping {
            obj.insert("control_ping".into(), serde_json::Value::from(v.clone()));
        }
        if let Some(v) = &self.os_release {
            obj.insert("os_release".into(), serde_json::Value::from(v.clone()));
        }
        for ((device, dir), rate) in &self.wlan_rates {
            let key = format!("wlan{device}_{}_rate", dir.as_str());
            obj.insert(key, serde_json::Value::from(*rate));
        }
        serde_json::Value::Object(obj)
    }
}

/// A partial update to apply to a `NodeInfo` via `apply_overlay`. Fields left
/// `None`/empty are untouched, matching a Python dict update with a subset
/// of keys.
#[derive(Debug, Clone, Default)]
pub struct FieldOverlay {
    pub cmc_on_off: Option<String>,
    pub control_ssh: Option<String>,
    pub control_ping: Option<String>,
    pub os_release: Option<String>,
    pub wlan_rates: Vec<((u8, WlanDirection), f64)>,
}

impl FieldOverlay {
    pub fn cmc(value: &str) -> Self {
        FieldOverlay { cmc_on_off: Some(value.to_string()), ..Default::default() }
    }

    pub fn padding_off() -> Self {
        FieldOverlay {
            control_ping: Some("off".to_string()),
            control_ssh: Some("off".to_string()),
            ..Default::default()
        }
    }

    pub fn padding_shell_ok() -> Self {
        FieldOverlay {
            control_ping: Some("on".to_string()),
            control_ssh: Some("on".to_string()),
            ..Default::default()
        }
    }

    pub fn ssh_off() -> Self {
        FieldOverlay { control_ssh: Some("off".to_string()), ..Default::default() }
    }

    pub fn ping(value: &str) -> Self {
        FieldOverlay { control_ping: Some(value.to_string()), ..Default::default() }
    }

    pub fn os_release(value: &str) -> Self {
        FieldOverlay { os_release: Some(value.to_string()), ..Default::default() }
    }
}

/// Ordered collection of `NodeInfo`, one per node ever observed. Insertion
/// order is preserved across cycles: the same record is updated in place,
/// never replaced or reordered.
#[derive(Debug, Clone, Default)]
pub struct InfoTable {
    records: Vec<NodeInfo>,
}

impl Serialize for NodeInfo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl InfoTable {
    pub fn new() -> Self {
        InfoTable::default()
    }

    /// Linear scan by id; population is small and ordering matters for
    /// display, so no secondary index is maintained.
    pub fn locate(&self, id: u32) -> Option<&NodeInfo> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn locate_mut(&mut self, id: u32) -> Option<&mut NodeInfo> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Locate `id` or create it at the end of the table, then apply each
    /// overlay in order (later overlays win on conflicting keys).
    pub fn insert_or_refine(&mut self, id: u32, overlays: &[FieldOverlay]) {
        if self.locate(id).is_none() {
            self.records.push(NodeInfo::new(id));
        }
        let record = self.locate_mut(id).expect("just inserted");
        for overlay in overlays {
            record.apply_overlay(overlay);
        }
    }

    pub fn clear_wireless(&mut self, id: u32) {
        if let Some(record) = self.locate_mut(id) {
            record.clear_wireless();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeInfo> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// JSON array (InfoTable order) of the records whose id is in `ids`,
    /// the exact payload shape a batch is emitted as.
    pub fn to_json_batch(&self, ids: &std::collections::HashSet<u32>) -> String {
        let values: Vec<serde_json::Value> =
            self.records.iter().filter(|r| ids.contains(&r.id)).map(NodeInfo::to_json).collect();
        serde_json::Value::Array(values).to_string()
    }
}
