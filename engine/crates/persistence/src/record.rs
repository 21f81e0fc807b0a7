use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Durable collection/upload progress for one save slot.
///
/// Sets are written as ascending JSON arrays; duplicates in a hand-edited
/// file collapse on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionRecord {
    pub collected_locations: BTreeSet<u32>,
    pub uploaded_locations: BTreeSet<u32>,
    pub latest_message_displayed: u64,
}

impl CollectionRecord {
    /// Collected locations the server has not acknowledged yet, ascending.
    pub fn pending_locations(&self) -> Vec<u32> {
        self.collected_locations
            .difference(&self.uploaded_locations)
            .copied()
            .collect()
    }

    /// Restore `uploaded ⊆ collected` by growing `collected`.
    /// Returns the locations that had to be added.
    pub fn repair(&mut self) -> Vec<u32> {
        if self.is_consistent() {
            return Vec::new();
        }
        let missing: Vec<u32> = self
            .uploaded_locations
            .difference(&self.collected_locations)
            .copied()
            .collect();
        self.collected_locations.extend(missing.iter().copied());
        missing
    }

    pub fn is_consistent(&self) -> bool {
        self.uploaded_locations.is_subset(&self.collected_locations)
    }
}
