//! Hop table for hop-report (mtr) sessions.
//!
//! Slots are kept for every index from 1 up to the highest reported hop, so
//! a skipped hop shows up as an unknown placeholder rather than a gap. Hops the
//! backend hides are flagged stale but keep their last data.

use serde::{Deserialize, Serialize};

/// Column headings for hop index 0
pub const HEADER: [&str; 8] = ["Hop", "Host", "Loss%", "Rcvd", "Sent", "Best", "Avg", "Worst"];

/// Host column placeholder for unknown hops
pub const UNKNOWN_HOST_DISPLAY: &str = "*";

/// One data line of the wire format, fields already decoded for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopData {
    pub index: usize,
    pub host: String,
    pub address: String,
    /// Formatted percentage, or the raw field when it did not parse
    pub loss: String,
    pub received: String,
    pub sent: String,
    pub best: String,
    pub avg: String,
    pub worst: String,
}

/// A (host, address) pair seen at a hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub host: String,
    pub address: String,
}

impl HostEntry {
    /// `host [address]`, or just the host when both are the same
    pub fn display(&self) -> String {
        if self.host == self.address {
            self.host.clone()
        } else {
            format!("{} [{}]", self.host, self.address)
        }
    }
}

/// Accumulated data for one populated hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopObservation {
    /// First-seen order; keyed by address
    pub hosts: Vec<HostEntry>,
    pub loss: String,
    pub received: String,
    pub sent: String,
    pub best: String,
    pub avg: String,
    pub worst: String,
}

impl HopObservation {
    fn from_data(data: HopData) -> Self {
        let mut obs = Self {
            hosts: Vec::new(),
            loss: String::new(),
            received: String::new(),
            sent: String::new(),
            best: String::new(),
            avg: String::new(),
            worst: String::new(),
        };
        obs.merge(data);
        obs
    }

    /// Add or update the reporting host and take stats from this report
    fn merge(&mut self, data: HopData) {
        match self.hosts.iter_mut().find(|h| h.address == data.address) {
            Some(entry) => entry.host = data.host,
            None => self.hosts.push(HostEntry {
                host: data.host,
                address: data.address,
            }),
        }
        self.loss = data.loss;
        self.received = data.received;
        self.sent = data.sent;
        self.best = data.best;
        self.avg = data.avg;
        self.worst = data.worst;
    }
}

/// State of a single hop index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HopSlot {
    /// Never reported, or explicitly reported as unknown
    #[default]
    Unknown,
    Populated {
        observation: HopObservation,
        /// Hidden by the backend; data kept for de-emphasized display
        stale: bool,
    },
}

impl HopSlot {
    pub fn observation(&self) -> Option<&HopObservation> {
        match self {
            Self::Unknown => None,
            Self::Populated { observation, .. } => Some(observation),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Populated { stale: true, .. })
    }
}

/// How a row should be painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowState {
    Unknown,
    Live,
    Stale,
}

/// One display row, ready for a table widget or an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRow {
    pub index: usize,
    /// One entry per host, first-seen order
    pub hosts: Vec<String>,
    pub loss: String,
    pub received: String,
    pub sent: String,
    pub best: String,
    pub avg: String,
    pub worst: String,
    pub state: RowState,
}

impl HopRow {
    /// Hosts joined with `sep`, for single-line renderers
    pub fn host_label(&self, sep: &str) -> String {
        self.hosts.join(sep)
    }
}

/// Ordered, gap-filled table of hops 1..=N
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopTable {
    /// `slots[i]` holds hop index `i + 1`
    slots: Vec<HopSlot>,
    max_hops: usize,
}

impl HopTable {
    pub fn new(max_hops: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_hops),
            max_hops,
        }
    }

    /// Number of hop slots (highest index seen)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Slot for a hop index (1-indexed)
    pub fn slot(&self, index: usize) -> Option<&HopSlot> {
        if index == 0 {
            None
        } else {
            self.slots.get(index - 1)
        }
    }

    /// Backfill up to `index` and return its slot. Index 0 is the header and
    /// indices past `max_hops` are dropped.
    fn ensure(&mut self, index: usize) -> Option<&mut HopSlot> {
        if index == 0 || index > self.max_hops {
            return None;
        }
        if self.slots.len() < index {
            self.slots.resize(index, HopSlot::Unknown);
        }
        Some(&mut self.slots[index - 1])
    }

    /// Apply a data line. Returns false when the index is out of range.
    pub fn apply_hop_data(&mut self, data: HopData) -> bool {
        let Some(slot) = self.ensure(data.index) else {
            return false;
        };
        match slot {
            HopSlot::Populated { observation, stale } => {
                *stale = false;
                observation.merge(data);
            }
            HopSlot::Unknown => {
                *slot = HopSlot::Populated {
                    observation: HopObservation::from_data(data),
                    stale: false,
                };
            }
        }
        true
    }

    /// Mark a populated hop stale. Never creates a slot.
    pub fn apply_directive(&mut self, index: usize) -> bool {
        if index == 0 {
            return false;
        }
        match self.slots.get_mut(index - 1) {
            Some(HopSlot::Populated { stale, .. }) => {
                *stale = true;
                true
            }
            _ => false,
        }
    }

    /// Replace a hop with the unknown placeholder, dropping whatever it held
    pub fn apply_unknown(&mut self, index: usize) -> bool {
        match self.ensure(index) {
            Some(slot) => {
                *slot = HopSlot::Unknown;
                true
            }
            None => false,
        }
    }

    /// Display rows in ascending hop order
    pub fn rows(&self) -> Vec<HopRow> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                HopSlot::Unknown => HopRow {
                    index: i + 1,
                    hosts: vec![UNKNOWN_HOST_DISPLAY.to_string()],
                    loss: String::new(),
                    received: String::new(),
                    sent: String::new(),
                    best: String::new(),
                    avg: String::new(),
                    worst: String::new(),
                    state: RowState::Unknown,
                },
                HopSlot::Populated { observation, stale } => HopRow {
                    index: i + 1,
                    hosts: observation.hosts.iter().map(HostEntry::display).collect(),
                    loss: observation.loss.clone(),
                    received: observation.received.clone(),
                    sent: observation.sent.clone(),
                    best: observation.best.clone(),
                    avg: observation.avg.clone(),
                    worst: observation.worst.clone(),
                    state: if *stale { RowState::Stale } else { RowState::Live },
                },
            })
            .collect()
    }
}
