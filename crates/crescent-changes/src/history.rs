//! Bounded record of applied changes, newest last.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use crescent_types::ChangeSource;
use serde::{Deserialize, Serialize};

use crate::change::FormChange;

/// One applied change, resolved against the state it was applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The resolved change.
    pub change: FormChange,
    /// The creature's mutation flag before the change.
    pub prior_mutated: bool,
    /// When the change was applied.
    pub recorded_at: DateTime<Utc>,
}

/// Capacity-bounded change history with oldest-first eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ChangeHistory {
    /// An empty history holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an entry, returning the evicted oldest entry when full.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// The most recent entry.
    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Remove and return the most recent entry.
    pub fn pop_newest(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_back()
    }

    /// Up to `count` most recent changes, newest first.
    pub fn recent(&self, count: usize) -> Vec<&FormChange> {
        self.entries.iter().rev().take(count).map(|e| &e.change).collect()
    }

    /// Number of recorded changes per source.
    pub fn counts_by_source(&self) -> BTreeMap<ChangeSource, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            let count: &mut usize = counts.entry(entry.change.source()).or_default();
            *count = count.saturating_add(1);
        }
        counts
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crescent_types::Size;

    use super::*;
    use crate::delta::PhysicalChange;

    fn entry(source: ChangeSource) -> HistoryEntry {
        HistoryEntry {
            change: FormChange::new(source)
                .with_physical(PhysicalChange::default().with_size(Size::Large)),
            prior_mutated: false,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut history = ChangeHistory::new(3);
        let first = entry(ChangeSource::Manual);
        let first_id = first.change.id();
        assert!(history.push(first).is_none());
        history.push(entry(ChangeSource::Manual));
        history.push(entry(ChangeSource::Manual));
        let evicted = history.push(entry(ChangeSource::Stress)).unwrap();
        assert_eq!(evicted.change.id(), first_id);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut history = ChangeHistory::new(100);
        for _ in 0..250 {
            history.push(entry(ChangeSource::Environment));
            assert!(history.len() <= history.capacity());
        }
        assert_eq!(history.len(), 100);
    }

    #[test]
    fn recent_is_newest_first_and_counts_by_source() {
        let mut history = ChangeHistory::new(10);
        history.push(entry(ChangeSource::Manual));
        let newest = entry(ChangeSource::Stress);
        let newest_id = newest.change.id();
        history.push(newest);
        assert_eq!(history.recent(1)[0].id(), newest_id);
        let counts = history.counts_by_source();
        assert_eq!(counts.get(&ChangeSource::Manual), Some(&1));
        assert_eq!(counts.get(&ChangeSource::Stress), Some(&1));
    }

    #[test]
    fn history_survives_json_snapshot() {
        let mut history = ChangeHistory::new(4);
        history.push(entry(ChangeSource::Evolution));
        let json = serde_json::to_string(&history).unwrap();
        let restored: ChangeHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, history);
    }
}
