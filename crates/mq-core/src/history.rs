use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::raster::MaskRaster;

/// Number of snapshots kept, the current one included.
pub const HISTORY_LIMIT: usize = 10;

/// An encoded mask (base64 PNG). Opaque outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskSnapshot(String);

impl MaskSnapshot {
    pub fn capture(raster: &MaskRaster) -> Result<Self> {
        Ok(Self(raster.to_base64_png()?))
    }

    pub fn decode(&self) -> Result<MaskRaster> {
        MaskRaster::from_base64_png(&self.0)
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }
}

/// Bounded undo stack of mask snapshots. The back entry is the rendered mask.
#[derive(Debug, Clone, Default)]
pub struct MaskHistory {
    entries: VecDeque<MaskSnapshot>,
}

impl MaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = MaskSnapshot>) -> Self {
        let mut history = Self::new();
        for entry in entries {
            history.push(entry);
        }
        history
    }

    /// Appends a snapshot, dropping the oldest past [`HISTORY_LIMIT`].
    pub fn push(&mut self, snapshot: MaskSnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > HISTORY_LIMIT {
            self.entries.pop_front();
        }
    }

    /// Drops the latest snapshot and returns the one now current.
    /// The floor entry is never removed.
    pub fn undo(&mut self) -> Option<&MaskSnapshot> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop_back();
        self.entries.back()
    }

    pub fn latest(&self) -> Option<&MaskSnapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<MaskSnapshot> {
        self.entries.iter().cloned().collect()
    }
}
