use crate::snapshot::{Payload, SnapshotError};
use rollback_common::{SnapshotIndex, Timestamp};
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// One checkpoint in a snapshot history.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub index: SnapshotIndex,
    pub timestamp: Timestamp,
    pub payload: Payload,
    /// SHA-256 of the payload at capture time.
    pub digest: String,
}

impl SnapshotEntry {
    pub fn new(index: SnapshotIndex, timestamp: Timestamp, payload: Payload) -> Self {
        let digest = payload.digest();
        Self {
            index,
            timestamp,
            payload,
            digest,
        }
    }

    /// Recompute the payload digest and compare against the recorded one.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        let actual = self.payload.digest();
        if actual != self.digest {
            return Err(SnapshotError::IntegrityMismatch {
                expected: self.digest.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Append-only, ordered list of snapshots with stable indices.
///
/// With a retention limit the oldest entries are evicted once the limit is
/// exceeded. Indices of evicted entries are never reused.
#[derive(Debug, Default)]
pub struct SnapshotHistory {
    entries: VecDeque<SnapshotEntry>,
    next_index: SnapshotIndex,
    retention: Option<NonZeroUsize>,
}

impl SnapshotHistory {
    /// Create an unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history keeping at most `limit` snapshots.
    pub fn with_retention(limit: Option<NonZeroUsize>) -> Self {
        Self {
            retention: limit,
            ..Self::default()
        }
    }

    /// Append a payload and return its freshly assigned index.
    pub fn push(&mut self, payload: Payload) -> SnapshotIndex {
        self.push_at(Timestamp::now(), payload)
    }

    /// Append a payload captured at a known instant.
    pub fn push_at(&mut self, timestamp: Timestamp, payload: Payload) -> SnapshotIndex {
        let index = self.next_index;
        self.next_index = index.next();
        self.entries
            .push_back(SnapshotEntry::new(index, timestamp, payload));
        self.enforce_retention();
        index
    }

    /// Re-insert an entry with a pre-assigned index (archive import).
    ///
    /// Indices must arrive in increasing order; an index at or below the
    /// latest one is rejected and returned.
    pub fn insert(&mut self, entry: SnapshotEntry) -> Result<(), SnapshotEntry> {
        if entry.index < self.next_index {
            return Err(entry);
        }
        self.next_index = entry.index.next();
        self.entries.push_back(entry);
        self.enforce_retention();
        Ok(())
    }

    /// Look up a retained snapshot.
    pub fn get(&self, index: SnapshotIndex) -> Option<&SnapshotEntry> {
        let oldest = self.entries.front()?.index;
        if index < oldest {
            return None;
        }
        // Indices are contiguous except across import gaps, so try the
        // direct offset first.
        let offset = (index.0 - oldest.0) as usize;
        match self.entries.get(offset) {
            Some(entry) if entry.index == index => Some(entry),
            _ => self
                .entries
                .binary_search_by_key(&index, |e| e.index)
                .ok()
                .and_then(|pos| self.entries.get(pos)),
        }
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest_index(&self) -> Option<SnapshotIndex> {
        self.entries.front().map(|e| e.index)
    }

    pub fn latest_index(&self) -> Option<SnapshotIndex> {
        self.entries.back().map(|e| e.index)
    }

    /// Index the next snapshot will receive.
    pub fn next_index(&self) -> SnapshotIndex {
        self.next_index
    }

    pub fn retention(&self) -> Option<NonZeroUsize> {
        self.retention
    }

    /// Retained snapshots, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    fn enforce_retention(&mut self) {
        let Some(limit) = self.retention else {
            return;
        };
        while self.entries.len() > limit.get() {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::debug!(index = %evicted.index, "evicting snapshot");
            }
        }
    }
}
