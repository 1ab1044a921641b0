// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Circular sample buffer with monotonic sequencing, plus the current/last
//! value maps and active-condition lists.
//!
//! One shared counter serializes the total order across all devices: sequence
//! allocation, buffer append and current-map update happen in a single
//! critical section, so a reader observing `lastSequence = L` sees every
//! observation with sequence `<= L` fully applied.

use crate::error::QueryError;
use crate::schema::{Category, DataItem};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// Default sample buffer capacity; production deployments configure far more.
pub const DEFAULT_BUFFER_SIZE: usize = 10;
/// Default cap on `current?at=` replay work.
pub const DEFAULT_REPLAY_CAP: usize = 131_072;

/// Identifies one data item of one device in the value maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub uuid: String,
    pub item_id: String,
}

impl ItemKey {
    #[must_use]
    pub fn new(uuid: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            item_id: item_id.into(),
        }
    }
}

/// Condition severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionLevel {
    Normal,
    Warning,
    Fault,
    Unavailable,
}

impl ConditionLevel {
    /// Parse the SHDR spelling.
    #[must_use]
    pub fn parse(s: &str) -> Option<ConditionLevel> {
        match s {
            "NORMAL" => Some(ConditionLevel::Normal),
            "WARNING" => Some(ConditionLevel::Warning),
            "FAULT" => Some(ConditionLevel::Fault),
            "UNAVAILABLE" => Some(ConditionLevel::Unavailable),
            _ => None,
        }
    }

    /// Element name in an MTConnectStreams document.
    #[must_use]
    pub fn element_name(&self) -> &'static str {
        match self {
            ConditionLevel::Normal => "Normal",
            ConditionLevel::Warning => "Warning",
            ConditionLevel::Fault => "Fault",
            ConditionLevel::Unavailable => "Unavailable",
        }
    }
}

/// The five SHDR condition fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionEntry {
    pub level: ConditionLevel,
    pub native_code: String,
    pub native_severity: String,
    pub qualifier: String,
    pub message: String,
}

/// Observation payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationValue {
    /// EVENT/SAMPLE scalar, kept as the adapter's string spelling.
    Scalar(String),
    Condition(ConditionEntry),
}

/// A single value written by the ingest pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub sequence: u64,
    pub uuid: String,
    pub item_id: String,
    pub category: Category,
    pub timestamp: String,
    pub value: ObservationValue,
}

impl Observation {
    /// Condition native code, empty for scalars.
    #[must_use]
    pub fn native_code(&self) -> &str {
        match &self.value {
            ObservationValue::Condition(entry) => entry.native_code.as_str(),
            ObservationValue::Scalar(_) => "",
        }
    }
}

/// Active-condition bookkeeping for one data item.
///
/// `active` is the alarm list (distinct native codes); `last` remembers the
/// most recent condition observation even after a clear, so `current` can
/// render a `Normal` element with a real timestamp and sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionState {
    pub active: Vec<Observation>,
    pub last: Option<Observation>,
}

/// Coherent view of the current values, tagged with the sequence window at
/// snapshot time.
#[derive(Debug, Clone)]
pub struct CurrentSnapshot {
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub next_sequence: u64,
    pub values: HashMap<ItemKey, Observation>,
    pub conditions: HashMap<ItemKey, ConditionState>,
}

/// Ordered slice returned by `sample`.
#[derive(Debug, Clone)]
pub struct SampleSlice {
    pub first_sequence: u64,
    pub last_sequence: u64,
    /// `min(from + count, lastSequence + 1)` - where the next poll resumes.
    pub next_sequence: u64,
    pub observations: Vec<Observation>,
}

struct StoreInner {
    buffer: VecDeque<Observation>,
    next_sequence: u64,
    current: HashMap<ItemKey, Observation>,
    last: HashMap<ItemKey, Observation>,
    conditions: HashMap<ItemKey, ConditionState>,
}

impl StoreInner {
    fn first_sequence(&self) -> u64 {
        self.buffer
            .front()
            .map_or(self.next_sequence, |obs| obs.sequence)
    }

    fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }
}

/// Process-wide observation store: bounded FIFO ring plus current/last maps.
///
/// Exclusive writer, shared readers.
pub struct DataStore {
    capacity: usize,
    replay_cap: usize,
    inner: RwLock<StoreInner>,
}

impl DataStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_replay_cap(capacity, DEFAULT_REPLAY_CAP)
    }

    #[must_use]
    pub fn with_replay_cap(capacity: usize, replay_cap: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            replay_cap: replay_cap.max(1),
            inner: RwLock::new(StoreInner {
                buffer: VecDeque::with_capacity(capacity.max(1).min(65_536)),
                next_sequence: 1,
                current: HashMap::new(),
                last: HashMap::new(),
                conditions: HashMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence of the oldest retained observation (equals `next_sequence`
    /// when the buffer is empty).
    #[must_use]
    pub fn first_sequence(&self) -> u64 {
        self.inner.read().first_sequence()
    }

    /// Sequence of the newest observation (0 before the first ingest).
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.inner.read().last_sequence()
    }

    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.inner.read().next_sequence
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().buffer.is_empty()
    }

    /// Apply one observation. Returns the allocated sequence, or `None` when
    /// the value was suppressed as a duplicate.
    ///
    /// Duplicate suppression applies to EVENT/SAMPLE only: a value equal to
    /// the current one consumes no sequence and does not advance the
    /// last-value map.
    pub fn ingest(
        &self,
        uuid: &str,
        item: &DataItem,
        timestamp: &str,
        value: ObservationValue,
    ) -> Option<u64> {
        let mut inner = self.inner.write();
        let key = ItemKey::new(uuid, item.id.as_str());

        if item.category != Category::Condition {
            if let Some(current) = inner.current.get(&key) {
                if current.value == value {
                    return None;
                }
            }
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        let observation = Observation {
            sequence,
            uuid: uuid.to_string(),
            item_id: item.id.clone(),
            category: item.category,
            timestamp: timestamp.to_string(),
            value,
        };

        if inner.buffer.len() == self.capacity {
            inner.buffer.pop_front();
        }
        inner.buffer.push_back(observation.clone());

        match item.category {
            Category::Event | Category::Sample => {
                if let Some(previous) = inner.current.insert(key.clone(), observation) {
                    inner.last.insert(key, previous);
                }
            }
            Category::Condition => {
                apply_condition(&mut inner.conditions, key, observation);
            }
        }

        Some(sequence)
    }

    /// Snapshot of the latest value per data item.
    #[must_use]
    pub fn current(&self) -> CurrentSnapshot {
        let inner = self.inner.read();
        CurrentSnapshot {
            first_sequence: inner.first_sequence(),
            last_sequence: inner.last_sequence(),
            next_sequence: inner.next_sequence,
            values: inner.current.clone(),
            conditions: inner.conditions.clone(),
        }
    }

    /// Prior distinct value for one data item (never advanced by suppressed
    /// duplicates).
    #[must_use]
    pub fn last_value(&self, key: &ItemKey) -> Option<Observation> {
        self.inner.read().last.get(key).cloned()
    }

    /// State as of historical sequence `at`, reconstructed by replaying the
    /// retained buffer onto an empty state. Only observations still inside
    /// the buffer window participate.
    pub fn current_at(&self, at: u64) -> Result<CurrentSnapshot, QueryError> {
        let inner = self.inner.read();
        let first = inner.first_sequence();
        let last = inner.last_sequence();
        if at < first || at > last {
            return Err(QueryError::OutOfRange(format!(
                "'at' must be between {first} and {last}"
            )));
        }
        let span = (at - first + 1) as usize;
        if span > self.replay_cap {
            return Err(QueryError::OutOfRange(format!(
                "'at' replays {span} observations, limit is {}",
                self.replay_cap
            )));
        }

        let mut values = HashMap::new();
        let mut conditions: HashMap<ItemKey, ConditionState> = HashMap::new();
        for observation in inner.buffer.iter().take_while(|o| o.sequence <= at) {
            let key = ItemKey::new(observation.uuid.as_str(), observation.item_id.as_str());
            match observation.category {
                Category::Condition => {
                    apply_condition(&mut conditions, key, observation.clone());
                }
                Category::Event | Category::Sample => {
                    values.insert(key, observation.clone());
                }
            }
        }

        Ok(CurrentSnapshot {
            first_sequence: first,
            last_sequence: last,
            next_sequence: inner.next_sequence,
            values,
            conditions,
        })
    }

    /// Ordered slice `[from, min(from + count - 1, lastSequence)]`.
    ///
    /// `from == nextSequence` is accepted and yields an empty slice (the
    /// streaming path polls at the tail).
    pub fn sample(&self, from: u64, count: usize) -> Result<SampleSlice, QueryError> {
        if count < 1 {
            return Err(QueryError::OutOfRange(
                "'count' must be greater than or equal to 1".to_string(),
            ));
        }
        if count > self.capacity {
            return Err(QueryError::OutOfRange(format!(
                "'count' must be less than or equal to the buffer size ({})",
                self.capacity
            )));
        }

        let inner = self.inner.read();
        let first = inner.first_sequence();
        let last = inner.last_sequence();
        if from < first || from > last + 1 {
            return Err(QueryError::OutOfRange(format!(
                "'from' must be between {first} and {}",
                last + 1
            )));
        }

        let end = (from + count as u64).min(last + 1); // exclusive
        let observations = inner
            .buffer
            .iter()
            .filter(|o| o.sequence >= from && o.sequence < end)
            .cloned()
            .collect();

        Ok(SampleSlice {
            first_sequence: first,
            last_sequence: last,
            next_sequence: end,
            observations,
        })
    }
}

/// Condition-list transition for one incoming condition observation.
///
/// Two-tier clear rule: NORMAL with an empty native code clears the whole
/// list; NORMAL with a code removes only that entry. UNAVAILABLE replaces the
/// list (the state is unknown, stale codes must not survive). WARNING/FAULT
/// upsert by native code, so distinct codes coexist.
fn apply_condition(
    conditions: &mut HashMap<ItemKey, ConditionState>,
    key: ItemKey,
    observation: Observation,
) {
    let ObservationValue::Condition(entry) = &observation.value else {
        return;
    };
    let state = conditions.entry(key).or_default();
    // Any definite report supersedes an UNAVAILABLE placeholder.
    if entry.level != ConditionLevel::Unavailable {
        state.active.retain(|o| {
            !matches!(&o.value, ObservationValue::Condition(e)
                if e.level == ConditionLevel::Unavailable)
        });
    }
    match entry.level {
        ConditionLevel::Normal if entry.native_code.is_empty() => {
            state.active.clear();
        }
        ConditionLevel::Normal => {
            let code = entry.native_code.as_str();
            state.active.retain(|o| o.native_code() != code);
        }
        ConditionLevel::Unavailable => {
            state.active.clear();
            state.active.push(observation.clone());
        }
        ConditionLevel::Warning | ConditionLevel::Fault => {
            let code = entry.native_code.as_str();
            match state.active.iter_mut().find(|o| o.native_code() == code) {
                Some(slot) => *slot = observation.clone(),
                None => state.active.push(observation.clone()),
            }
        }
    }
    state.last = Some(observation);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TS: &str = "2014-08-11T08:32:54.028533Z";

    fn event_item(id: &str) -> DataItem {
        DataItem {
            id: id.to_string(),
            name: Some(id.to_string()),
            item_type: "EXECUTION".to_string(),
            sub_type: None,
            category: Category::Event,
            units: None,
            native_units: None,
        }
    }

    fn condition_item(id: &str) -> DataItem {
        DataItem {
            id: id.to_string(),
            name: Some(id.to_string()),
            item_type: "TEMPERATURE".to_string(),
            sub_type: None,
            category: Category::Condition,
            units: None,
            native_units: None,
        }
    }

    fn scalar(v: &str) -> ObservationValue {
        ObservationValue::Scalar(v.to_string())
    }

    fn condition(level: ConditionLevel, code: &str) -> ObservationValue {
        ObservationValue::Condition(ConditionEntry {
            level,
            native_code: code.to_string(),
            native_severity: "1".to_string(),
            qualifier: String::new(),
            message: String::new(),
        })
    }

    #[test]
    fn test_sequences_start_at_one_and_increase() {
        let store = DataStore::new(10);
        assert_eq!(store.next_sequence(), 1);
        assert_eq!(store.first_sequence(), 1);
        assert_eq!(store.last_sequence(), 0);

        let item = event_item("e1");
        assert_eq!(store.ingest("000", &item, TS, scalar("a")), Some(1));
        assert_eq!(store.ingest("000", &item, TS, scalar("b")), Some(2));
        assert_eq!(store.next_sequence(), 3);
        assert_eq!(store.first_sequence(), 1);
        assert_eq!(store.last_sequence(), 2);
    }

    #[test]
    fn test_eviction_advances_first_sequence() {
        let store = DataStore::new(3);
        let item = event_item("e1");
        for i in 0..5 {
            store.ingest("000", &item, TS, scalar(&i.to_string()));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.first_sequence(), 3);
        assert_eq!(store.last_sequence(), 5);
        // Window bound: last - first + 1 <= capacity.
        assert!(store.last_sequence() - store.first_sequence() + 1 <= 3);
    }

    #[test]
    fn test_duplicate_suppression_consumes_no_sequence() {
        let store = DataStore::new(10);
        let item = event_item("avail");
        assert_eq!(store.ingest("000", &item, TS, scalar("AVAILABLE")), Some(1));
        assert_eq!(store.ingest("000", &item, TS, scalar("AVAILABLE")), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_sequence(), 2);

        let snapshot = store.current();
        let key = ItemKey::new("000", "avail");
        assert_eq!(
            snapshot.values.get(&key).map(|o| &o.value),
            Some(&scalar("AVAILABLE"))
        );
    }

    #[test]
    fn test_suppressed_duplicate_does_not_advance_last() {
        let store = DataStore::new(10);
        let item = event_item("exec");
        let key = ItemKey::new("000", "exec");

        store.ingest("000", &item, TS, scalar("READY"));
        store.ingest("000", &item, TS, scalar("ACTIVE"));
        assert_eq!(store.last_value(&key).map(|o| o.value), Some(scalar("READY")));

        // Suppressed duplicate: current stays ACTIVE, last stays READY.
        store.ingest("000", &item, TS, scalar("ACTIVE"));
        assert_eq!(store.last_value(&key).map(|o| o.value), Some(scalar("READY")));
    }

    #[test]
    fn test_distinct_condition_codes_coexist() {
        let store = DataStore::new(10);
        let item = condition_item("htemp");
        let key = ItemKey::new("000", "htemp");

        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "HTEMP"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Fault, "OVERLOAD"));

        let snapshot = store.current();
        let state = snapshot.conditions.get(&key).expect("state");
        let codes: Vec<&str> = state.active.iter().map(|o| o.native_code()).collect();
        assert_eq!(codes, vec!["HTEMP", "OVERLOAD"]);
    }

    #[test]
    fn test_condition_upsert_by_native_code() {
        let store = DataStore::new(10);
        let item = condition_item("htemp");
        let key = ItemKey::new("000", "htemp");

        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "HTEMP"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Fault, "HTEMP"));

        let snapshot = store.current();
        let state = snapshot.conditions.get(&key).expect("state");
        assert_eq!(state.active.len(), 1);
        match &state.active[0].value {
            ObservationValue::Condition(entry) => {
                assert_eq!(entry.level, ConditionLevel::Fault);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_normal_with_code_clears_only_that_entry() {
        let store = DataStore::new(10);
        let item = condition_item("htemp");
        let key = ItemKey::new("000", "htemp");

        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "HTEMP"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Fault, "OVERLOAD"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Normal, "HTEMP"));

        let snapshot = store.current();
        let state = snapshot.conditions.get(&key).expect("state");
        let codes: Vec<&str> = state.active.iter().map(|o| o.native_code()).collect();
        assert_eq!(codes, vec!["OVERLOAD"]);
    }

    #[test]
    fn test_normal_without_code_clears_all() {
        let store = DataStore::new(10);
        let item = condition_item("Cloadc");
        let key = ItemKey::new("000", "Cloadc");

        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "A"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Fault, "B"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Normal, ""));

        let snapshot = store.current();
        let state = snapshot.conditions.get(&key).expect("state");
        assert!(state.active.is_empty());
        // The clearing observation remains visible for Normal rendering.
        let last = state.last.as_ref().expect("last");
        assert_eq!(last.sequence, 3);
    }

    #[test]
    fn test_unavailable_replaces_active_list() {
        let store = DataStore::new(10);
        let item = condition_item("htemp");
        let key = ItemKey::new("000", "htemp");

        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "HTEMP"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Unavailable, ""));

        let snapshot = store.current();
        let state = snapshot.conditions.get(&key).expect("state");
        assert_eq!(state.active.len(), 1);
        match &state.active[0].value {
            ObservationValue::Condition(entry) => {
                assert_eq!(entry.level, ConditionLevel::Unavailable);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_definite_condition_supersedes_unavailable() {
        let store = DataStore::new(10);
        let item = condition_item("htemp");
        let key = ItemKey::new("000", "htemp");

        store.ingest("000", &item, TS, condition(ConditionLevel::Unavailable, ""));
        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "HTEMP"));

        let snapshot = store.current();
        let state = snapshot.conditions.get(&key).expect("state");
        let codes: Vec<&str> = state.active.iter().map(|o| o.native_code()).collect();
        assert_eq!(codes, vec!["HTEMP"]);
    }

    #[test]
    fn test_conditions_never_suppressed() {
        let store = DataStore::new(10);
        let item = condition_item("htemp");
        let value = condition(ConditionLevel::Warning, "HTEMP");
        assert_eq!(store.ingest("000", &item, TS, value.clone()), Some(1));
        assert_eq!(store.ingest("000", &item, TS, value), Some(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_sample_range_and_next_sequence() {
        let store = DataStore::new(10);
        let item = event_item("e1");
        for i in 0..6 {
            store.ingest("000", &item, TS, scalar(&i.to_string()));
        }

        let slice = store.sample(2, 3).expect("sample");
        let seqs: Vec<u64> = slice.observations.iter().map(|o| o.sequence).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert_eq!(slice.next_sequence, 5);

        // count clamps at the tail.
        let slice = store.sample(5, 10).expect("sample");
        let seqs: Vec<u64> = slice.observations.iter().map(|o| o.sequence).collect();
        assert_eq!(seqs, vec![5, 6]);
        assert_eq!(slice.next_sequence, 7);

        // from == nextSequence yields an empty slice.
        let slice = store.sample(7, 5).expect("sample");
        assert!(slice.observations.is_empty());
        assert_eq!(slice.next_sequence, 7);
    }

    #[test]
    fn test_sample_boundary_violations() {
        let store = DataStore::new(5);
        let item = event_item("e1");
        for i in 0..8 {
            store.ingest("000", &item, TS, scalar(&i.to_string()));
        }
        // Buffer holds [4, 8].
        let err = store.sample(3, 2).expect_err("from below window");
        assert_eq!(err.code(), "OUT_OF_RANGE");

        let err = store.sample(4, 0).expect_err("count zero");
        assert!(err.to_string().contains("must be greater than or equal to 1"));

        let err = store.sample(4, 6).expect_err("count above capacity");
        assert_eq!(err.code(), "OUT_OF_RANGE");

        let err = store.sample(10, 2).expect_err("from beyond next");
        assert_eq!(err.code(), "OUT_OF_RANGE");
    }

    #[test]
    fn test_current_at_replays_window() {
        let store = DataStore::new(10);
        let item = event_item("e1");
        for value in ["a", "b", "c"] {
            store.ingest("000", &item, TS, scalar(value));
        }

        let key = ItemKey::new("000", "e1");
        let snapshot = store.current_at(2).expect("replay");
        assert_eq!(snapshot.values.get(&key).map(|o| &o.value), Some(&scalar("b")));

        let snapshot = store.current_at(3).expect("replay");
        assert_eq!(snapshot.values.get(&key).map(|o| &o.value), Some(&scalar("c")));
    }

    #[test]
    fn test_current_at_replays_condition_semantics() {
        let store = DataStore::new(10);
        let item = condition_item("htemp");
        let key = ItemKey::new("000", "htemp");

        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "A"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Warning, "B"));
        store.ingest("000", &item, TS, condition(ConditionLevel::Normal, ""));

        let snapshot = store.current_at(2).expect("replay");
        let state = snapshot.conditions.get(&key).expect("state");
        assert_eq!(state.active.len(), 2);

        let snapshot = store.current_at(3).expect("replay");
        let state = snapshot.conditions.get(&key).expect("state");
        assert!(state.active.is_empty());
    }

    #[test]
    fn test_current_at_out_of_range() {
        let store = DataStore::new(3);
        let item = event_item("e1");
        for i in 0..5 {
            store.ingest("000", &item, TS, scalar(&i.to_string()));
        }
        // Window is [3, 5].
        assert!(store.current_at(2).is_err());
        assert!(store.current_at(6).is_err());
        assert!(store.current_at(3).is_ok());
    }

    #[test]
    fn test_current_at_honors_replay_cap() {
        let store = DataStore::with_replay_cap(10, 2);
        let item = event_item("e1");
        for i in 0..5 {
            store.ingest("000", &item, TS, scalar(&i.to_string()));
        }
        assert!(store.current_at(2).is_ok());
        let err = store.current_at(4).expect_err("span 4 over cap 2");
        assert_eq!(err.code(), "OUT_OF_RANGE");
    }

    #[test]
    fn test_snapshot_window_is_coherent() {
        let store = DataStore::new(10);
        let item = event_item("e1");
        store.ingest("000", &item, TS, scalar("x"));
        store.ingest("000", &item, TS, scalar("y"));

        let snapshot = store.current();
        assert_eq!(snapshot.first_sequence, 1);
        assert_eq!(snapshot.last_sequence, 2);
        assert_eq!(snapshot.next_sequence, 3);
    }
}
