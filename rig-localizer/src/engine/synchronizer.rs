//! Frame-group synchronization.
//!
//! Collects one resolved scan per rig sensor and emits a [`FrameSet`] each
//! time every slot is filled. A newer scan from the same sensor replaces an
//! unflushed one (last write wins). Partial sets left at end of stream are
//! never emitted.

use std::collections::HashMap;

use crate::error::{LocalizerError, Result};

use super::RigScan;

/// Index of a sensor within a [`RigLayout`].
pub type SensorSlot = usize;

/// Fixed set of distinct rig sensor labels.
#[derive(Debug, Clone)]
pub struct RigLayout {
    labels: Vec<String>,
    slots: HashMap<String, SensorSlot>,
}

impl RigLayout {
    /// Layout from a non-empty list of distinct labels.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        if labels.is_empty() {
            return Err(LocalizerError::Config(
                "rig layout needs at least one sensor label".into(),
            ));
        }

        let mut slots = HashMap::with_capacity(labels.len());
        let mut owned = Vec::with_capacity(labels.len());
        for (slot, label) in labels.iter().enumerate() {
            let label = label.as_ref().to_string();
            if slots.insert(label.clone(), slot).is_some() {
                return Err(LocalizerError::Config(format!(
                    "duplicate rig sensor label '{}'",
                    label
                )));
            }
            owned.push(label);
        }

        Ok(Self {
            labels: owned,
            slots,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn slot_of(&self, label: &str) -> Option<SensorSlot> {
        self.slots.get(label).copied()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// One synchronized capture: exactly one scan per layout sensor, in slot
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSet {
    scans: Vec<RigScan>,
}

impl FrameSet {
    /// Build from completely filled slots; `None` if any slot is empty.
    fn from_slots(slots: &mut [Option<RigScan>]) -> Option<Self> {
        if slots.iter().any(Option::is_none) {
            return None;
        }
        let scans = slots.iter_mut().filter_map(Option::take).collect();
        Some(Self { scans })
    }

    pub fn scans(&self) -> &[RigScan] {
        &self.scans
    }

    pub fn scans_mut(&mut self) -> &mut [RigScan] {
        &mut self.scans
    }

    pub fn into_scans(self) -> Vec<RigScan> {
        self.scans
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Total point count across all scans.
    pub fn point_count(&self) -> usize {
        self.scans.iter().map(|s| s.points.len()).sum()
    }

    /// Capture time of the earliest scan.
    pub fn timestamp_us(&self) -> u64 {
        self.scans.iter().map(|s| s.timestamp_us).min().unwrap_or(0)
    }
}

/// Slot array keyed by sensor, emitting complete sets.
#[derive(Debug)]
pub struct FrameGroupSynchronizer {
    layout: RigLayout,
    slots: Vec<Option<RigScan>>,
    groups_emitted: usize,
    /// Scans that never reach a group: displaced slot occupants and
    /// unknown labels.
    ungrouped: Vec<RigScan>,
}

impl FrameGroupSynchronizer {
    pub fn new(layout: RigLayout) -> Self {
        let slots = vec![None; layout.len()];
        Self {
            layout,
            slots,
            groups_emitted: 0,
            ungrouped: Vec::new(),
        }
    }

    pub fn layout(&self) -> &RigLayout {
        &self.layout
    }

    /// Place `scan` in its sensor's slot; returns a set once all slots
    /// are filled.
    pub fn ingest(&mut self, scan: RigScan) -> Option<FrameSet> {
        let Some(slot) = self.layout.slot_of(&scan.sensor_label) else {
            log::warn!(
                "Scan at {} us has unknown sensor label '{}', not grouped",
                scan.timestamp_us,
                scan.sensor_label
            );
            self.ungrouped.push(scan);
            return None;
        };

        if let Some(previous) = self.slots[slot].replace(scan) {
            log::debug!(
                "{} scan at {} us replaced before its group completed",
                previous.sensor_label,
                previous.timestamp_us
            );
            self.ungrouped.push(previous);
        }

        let set = FrameSet::from_slots(&mut self.slots)?;
        self.groups_emitted += 1;
        Some(set)
    }

    /// Number of complete sets emitted so far.
    pub fn groups_emitted(&self) -> usize {
        self.groups_emitted
    }

    /// Number of slots currently filled.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// End of stream: drop the partial set and hand back every scan that
    /// never made it into a group.
    pub fn finish(mut self) -> Vec<RigScan> {
        let partial: Vec<RigScan> = self.slots.iter_mut().filter_map(Option::take).collect();
        if !partial.is_empty() {
            log::info!(
                "Dropping trailing partial group ({} of {} sensors)",
                partial.len(),
                self.layout.len()
            );
        }
        self.ungrouped.extend(partial);
        self.ungrouped
    }
}
