//! The typed, mutable metric primitive: counter, gauge, histogram, unique-set.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// The kind of a [`Metric`]. Assigned at first use and immutable thereafter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Monotonically increasing value; `Increment`/`IncrementBy`.
    Counter,
    /// Point-in-time value; `Set`.
    Gauge,
    /// Distribution of observed values; `Observe`.
    Histogram,
    /// Set of distinct strings; `AddUnique`.
    UniqueSet,
}

/// Serializable snapshot of a metric's current state, returned by [`Metric::snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshotValue {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub count: i64,
    pub last_update: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<std::collections::HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_set: Option<Vec<String>>,
}

/// The mutable state guarded by a metric's lock. `value`, `count`, `last_update`, the
/// observation sequence, and the unique-set all live behind the same lock so a reader never
/// observes a torn state straddling two of those fields (§4.1).
struct MetricState {
    value: f64,
    count: i64,
    last_update: DateTime<Utc>,
    tags: Option<std::collections::HashMap<String, String>>,
    observations: Option<Vec<f64>>,
    unique_set: Option<HashSet<String>>,
}

/// A named, typed, concurrently-mutable metric.
///
/// `name` and `kind` are immutable after construction and read without locking; all other
/// fields live behind a single [`parking_lot::Mutex`] per metric (fine-grained locking, per
/// §5 — unrelated metrics never contend with each other).
pub struct Metric {
    name: String,
    kind: MetricKind,
    state: Mutex<MetricState>,
}

impl Metric {
    /// Constructs a new metric of the given kind, zeroed, stamped with the current time.
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        let now = Utc::now();
        let (observations, unique_set) = match kind {
            MetricKind::Histogram => (Some(Vec::new()), None),
            MetricKind::UniqueSet => (None, Some(HashSet::new())),
            MetricKind::Counter | MetricKind::Gauge => (None, None),
        };
        Self {
            name: name.into(),
            kind,
            state: Mutex::new(MetricState {
                value: 0.0,
                count: 0,
                last_update: now,
                tags: None,
                observations,
                unique_set,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.state.lock().value
    }

    pub fn count(&self) -> i64 {
        self.state.lock().count
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.state.lock().last_update
    }

    /// `Counter::Increment` — `value += 1, count += 1`. A no-op of matching shape on other
    /// kinds is intentionally not special-cased; callers are expected to use the matching
    /// operation for the metric's kind (§4.1: mismatches are tolerated silently).
    pub fn increment(&self) {
        self.increment_by(1.0);
    }

    /// `Counter::IncrementBy(v)` — `value += v, count += 1`.
    pub fn increment_by(&self, v: f64) {
        let mut state = self.state.lock();
        state.value += v;
        state.count += 1;
        state.last_update = Utc::now();
    }

    /// `Gauge::Set(v)` — `value = v`; `count` is left unchanged.
    pub fn set(&self, v: f64) {
        let mut state = self.state.lock();
        state.value = v;
        state.last_update = Utc::now();
    }

    /// `Histogram::Observe(v)` — appends to the observation sequence and accumulates `value`
    /// and `count`. Per §4.1 this is deliberately kind-agnostic: `Observe` on any kind still
    /// appends to the sequence, to permit later histogram derivation.
    pub fn observe(&self, v: f64) {
        let mut state = self.state.lock();
        state.value += v;
        state.count += 1;
        state.last_update = Utc::now();
        state.observations.get_or_insert_with(Vec::new).push(v);
    }

    /// `UniqueSet::AddUnique(s)` — inserts into the set; `count` becomes `|set|`. A no-op on
    /// metrics that were not created as `UniqueSet` (kind/operation mismatches are tolerated
    /// silently, §4.1).
    pub fn add_unique(&self, s: &str) {
        let mut state = self.state.lock();
        let Some(set) = state.unique_set.as_mut() else {
            return;
        };
        set.insert(s.to_string());
        state.count = set.len() as i64;
        state.last_update = Utc::now();
    }

    /// `value / count` for any kind with `count > 0`; `0.0` otherwise.
    pub fn average(&self) -> f64 {
        let state = self.state.lock();
        if state.count > 0 {
            state.value / state.count as f64
        } else {
            0.0
        }
    }

    /// Attaches/overwrites the tag map.
    pub fn set_tags(&self, tags: std::collections::HashMap<String, String>) {
        self.state.lock().tags = Some(tags);
    }

    /// A serializable point-in-time copy of this metric's state.
    pub fn snapshot(&self) -> MetricSnapshotValue {
        let state = self.state.lock();
        MetricSnapshotValue {
            name: self.name.clone(),
            kind: self.kind,
            value: state.value,
            count: state.count,
            last_update: state.last_update,
            tags: state.tags.clone(),
            observations: state.observations.clone(),
            unique_set: state
                .unique_set
                .as_ref()
                .map(|set| set.iter().cloned().collect()),
        }
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &state.value)
            .field("count", &state.count)
            .finish()
    }
}
