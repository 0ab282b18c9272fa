//! Typed metric primitives and their name-keyed container.

pub mod metric;
pub mod snapshot;

pub use metric::{Metric, MetricKind, MetricSnapshotValue};
pub use snapshot::MetricSnapshot;
