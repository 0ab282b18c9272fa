//! The name→[`Metric`] container with linearizable get-or-create.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use super::metric::{Metric, MetricKind, MetricSnapshotValue};

/// A concurrent mapping from metric name to [`Metric`], backed by [`DashMap`] so the
/// get-or-create path (§4.2) never needs a single map-wide lock for reads — only insertion
/// contends, and only on the affected shard.
pub struct MetricSnapshot {
    metrics: DashMap<String, Arc<Metric>>,
    created_at: RwLock<DateTime<Utc>>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self {
            metrics: DashMap::new(),
            created_at: RwLock::new(Utc::now()),
        }
    }

    /// Returns the existing metric by name if present (the requested `kind` is ignored once a
    /// metric exists — kind wins at first use); otherwise constructs and inserts one with
    /// `kind`. Two concurrent calls with the same `name` are guaranteed to return the same
    /// `Arc<Metric>`.
    pub fn get_or_create(&self, name: &str, kind: MetricKind) -> Arc<Metric> {
        if let Some(existing) = self.metrics.get(name) {
            return existing.clone();
        }
        self.metrics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Metric::new(name, kind)))
            .clone()
    }

    /// Read-only lookup; does not create.
    pub fn get(&self, name: &str) -> Option<Arc<Metric>> {
        self.metrics.get(name).map(|entry| entry.clone())
    }

    /// A shallow copy of the name→metric mapping; `Metric` references are shared, so reading
    /// a value from the returned map observes live state, not a point-in-time deep copy.
    pub fn snapshot(&self) -> HashMap<String, Arc<Metric>> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// A fully-materialized, serializable copy of every metric's current value.
    pub fn snapshot_values(&self) -> HashMap<String, MetricSnapshotValue> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Replaces the map with an empty one and bumps the creation timestamp.
    pub fn reset(&self) {
        self.metrics.clear();
        *self.created_at.write() = Utc::now();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        *self.created_at.read()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Default for MetricSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
