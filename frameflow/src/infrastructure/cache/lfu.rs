// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory LFU Store
//!
//! Bounded store of `(bus, globalcontext)` snapshots serving the explicit
//! snapshot / restore control steps that branch mid-pipeline. Eviction is
//! least-frequently-used; ties within the minimum frequency break by least
//! recency (insertion order within the frequency bucket).
//!
//! Keys are integers assigned at insertion (the store's size at the moment
//! of the put), so a pipeline that snapshots three times can restore the
//! second snapshot with `restore_snapshot(1)`.
//!
//! The store's full internal state - capacity, `min_freq`, entries with
//! frequencies, bucket ordering - serializes into an [`LfuSnapshot`] that is
//! persisted inside every on-disk checkpoint blob and restored with it, so a
//! resumed run sees the same snapshot keys a crash-free run would.

use frameflow_domain::CachedState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use indexmap::IndexSet;

/// Default number of resident snapshots.
pub const DEFAULT_CAPACITY: usize = 3;

/// Bounded LFU store of pipeline state snapshots.
#[derive(Debug, Default)]
pub struct LfuStore {
    capacity: usize,
    min_freq: u64,
    entries: HashMap<u64, (CachedState, u64)>,
    buckets: BTreeMap<u64, IndexSet<u64>>,
}

/// Serializable image of the store's internal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LfuSnapshot {
    capacity: usize,
    min_freq: u64,
    entries: Vec<LfuEntry>,
    buckets: Vec<(u64, Vec<u64>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LfuEntry {
    key: u64,
    state: CachedState,
    freq: u64,
}

impl LfuStore {
    /// Creates a store holding at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        LfuStore {
            capacity,
            min_freq: 0,
            entries: HashMap::new(),
            buckets: BTreeMap::new(),
        }
    }

    /// Gets the configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident snapshots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no snapshots are resident
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Minimum access frequency among resident keys, zero when empty
    pub fn min_freq(&self) -> u64 {
        self.min_freq
    }

    /// Resident keys, unordered.
    pub fn keys(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    /// Access frequency of a resident key
    pub fn freq_of(&self, key: u64) -> Option<u64> {
        self.entries.get(&key).map(|(_, freq)| *freq)
    }

    /// Inserts a snapshot, evicting the least-frequently-used entry when the
    /// store is full. Returns the assigned key, or `None` when capacity is
    /// zero.
    ///
    /// The key is the store's size at insertion time. When eviction has made
    /// that key resident already, the entry's value is refreshed and the
    /// access counts as a hit.
    pub fn put(&mut self, state: CachedState) -> Option<u64> {
        if self.capacity == 0 {
            return None;
        }
        let key = self.entries.len() as u64;

        if self.entries.contains_key(&key) {
            if let Some((value, _)) = self.entries.get_mut(&key) {
                *value = state;
            }
            self.touch(key);
            return Some(key);
        }

        if self.entries.len() >= self.capacity {
            self.evict_least_frequent();
        }

        self.entries.insert(key, (state, 1));
        self.buckets.entry(1).or_default().insert(key);
        self.min_freq = 1;
        Some(key)
    }

    /// Retrieves a snapshot by key, incrementing its frequency.
    pub fn get(&mut self, key: u64) -> Option<CachedState> {
        if !self.touch(key) {
            return None;
        }
        self.entries.get(&key).map(|(state, _)| state.clone())
    }

    /// Drops every snapshot and resets the frequency bookkeeping.
    pub fn reset(&mut self) {
        self.min_freq = 0;
        self.entries.clear();
        self.buckets.clear();
    }

    /// Captures the internal state for checkpoint persistence.
    pub fn snapshot(&self) -> LfuSnapshot {
        let buckets: Vec<(u64, Vec<u64>)> = self
            .buckets
            .iter()
            .map(|(freq, keys)| (*freq, keys.iter().copied().collect()))
            .collect();
        let entries = buckets
            .iter()
            .flat_map(|(_, keys)| keys.iter())
            .filter_map(|key| {
                self.entries.get(key).map(|(state, freq)| LfuEntry {
                    key: *key,
                    state: state.clone(),
                    freq: *freq,
                })
            })
            .collect();
        LfuSnapshot {
            capacity: self.capacity,
            min_freq: self.min_freq,
            entries,
            buckets,
        }
    }

    /// Replaces the internal state with a previously captured snapshot.
    pub fn restore(&mut self, snapshot: LfuSnapshot) {
        self.capacity = snapshot.capacity;
        self.min_freq = snapshot.min_freq;
        self.entries = snapshot
            .entries
            .into_iter()
            .map(|entry| (entry.key, (entry.state, entry.freq)))
            .collect();
        self.buckets = snapshot
            .buckets
            .into_iter()
            .map(|(freq, keys)| (freq, keys.into_iter().collect()))
            .collect();
    }

    /// Moves a key one frequency bucket up, keeping `min_freq` equal to the
    /// minimum frequency among resident keys.
    fn touch(&mut self, key: u64) -> bool {
        let Some((_, freq)) = self.entries.get(&key) else {
            return false;
        };
        let freq = *freq;
        if let Some(bucket) = self.buckets.get_mut(&freq) {
            bucket.shift_remove(&key);
            if bucket.is_empty() {
                self.buckets.remove(&freq);
            }
        }
        let next = freq + 1;
        self.buckets.entry(next).or_default().insert(key);
        if let Some((_, f)) = self.entries.get_mut(&key) {
            *f = next;
        }
        self.min_freq = self.buckets.keys().next().copied().unwrap_or(0);
        true
    }

    /// Evicts the front of the minimum-frequency bucket (LFU, then LRU).
    fn evict_least_frequent(&mut self) {
        let Some(bucket) = self.buckets.get_mut(&self.min_freq) else {
            return;
        };
        let evicted = bucket.shift_remove_index(0);
        if bucket.is_empty() {
            self.buckets.remove(&self.min_freq);
        }
        if let Some(key) = evicted {
            self.entries.remove(&key);
        }
        self.min_freq = self.buckets.keys().next().copied().unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameflow_domain::{Context, ParameterBus};
    use serde_json::json;

    fn state(tag: i64) -> CachedState {
        let mut bus = ParameterBus::new();
        bus.set("tag", json!(tag));
        CachedState {
            bus,
            globalcontext: Context::new("globalcontext").unwrap(),
        }
    }

    #[test]
    fn test_keys_are_assigned_in_order() {
        let mut store = LfuStore::new(3);
        assert_eq!(store.put(state(0)), Some(0));
        assert_eq!(store.put(state(1)), Some(1));
        assert_eq!(store.put(state(2)), Some(2));
    }

    #[test]
    fn test_eviction_prefers_least_frequent() {
        // put(A)=k0, put(B)=k1, get(k0), put(C)=k2:
        // k1 is least frequently used and must go.
        let mut store = LfuStore::new(2);
        store.put(state(0)).unwrap();
        store.put(state(1)).unwrap();
        assert!(store.get(0).is_some());
        assert_eq!(store.put(state(2)), Some(2));

        let mut resident = store.keys();
        resident.sort_unstable();
        assert_eq!(resident, vec![0, 2]);
        assert_eq!(store.min_freq(), 1);

        // The survivor's frequency keeps counting.
        assert!(store.get(0).is_some());
        assert_eq!(store.freq_of(0), Some(3));
    }

    #[test]
    fn test_lru_breaks_frequency_ties() {
        let mut store = LfuStore::new(2);
        store.put(state(0)).unwrap();
        store.put(state(1)).unwrap();
        // Both at freq 1: key 0 was inserted first and is evicted.
        store.put(state(2)).unwrap();
        let mut resident = store.keys();
        resident.sort_unstable();
        assert_eq!(resident, vec![1, 2]);
    }

    #[test]
    fn test_min_freq_tracks_resident_minimum() {
        let mut store = LfuStore::new(3);
        store.put(state(0)).unwrap();
        store.put(state(1)).unwrap();
        store.get(0);
        store.get(0);
        store.get(1);
        // freqs: k0=3, k1=2
        assert_eq!(store.min_freq(), 2);
    }

    #[test]
    fn test_zero_capacity_rejects_puts() {
        let mut store = LfuStore::new(0);
        assert_eq!(store.put(state(0)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_missing_key() {
        let mut store = LfuStore::new(2);
        assert!(store.get(7).is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut store = LfuStore::new(2);
        store.put(state(0)).unwrap();
        store.put(state(1)).unwrap();
        store.get(1);

        let image = store.snapshot();
        let encoded = serde_json::to_string(&image).unwrap();
        let decoded: LfuSnapshot = serde_json::from_str(&encoded).unwrap();

        let mut restored = LfuStore::new(0);
        restored.restore(decoded);
        assert_eq!(restored.capacity(), 2);
        assert_eq!(restored.min_freq(), store.min_freq());
        assert_eq!(restored.freq_of(1), Some(2));
        assert_eq!(restored.get(0).unwrap(), state(0));
    }
}
