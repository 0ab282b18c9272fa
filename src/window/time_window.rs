//! A single tumbling time window: a bounded `[start, end)` bucket wrapping a [`MetricSnapshot`].

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::metrics::MetricSnapshot;

/// A bounded `[start, start + duration)` bucket of window-scoped metrics.
///
/// `closed` is an [`AtomicBool`] rather than a field behind the window-manager's lock: reads
/// (`is_active`, `should_close`) and the one-way `close` transition must be cheap and
/// lock-free from the hot event path, and monotonicity (§3: "closed is monotonic") is exactly
/// what a compare-and-swap on a bool gives us for free.
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    duration: Duration,
    metrics: MetricSnapshot,
    closed: AtomicBool,
}

impl TimeWindow {
    /// Constructs a new, open window starting at the (already-aligned) `start` instant.
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            end: start + duration,
            duration,
            metrics: MetricSnapshot::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn metrics(&self) -> &MetricSnapshot {
        &self.metrics
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `!closed && t < end`.
    pub fn is_active(&self, t: DateTime<Utc>) -> bool {
        !self.closed() && t < self.end
    }

    /// `!closed && t > end`. A boundary event at exactly `t == end` belongs to the next
    /// window, per §9.
    pub fn should_close(&self, t: DateTime<Utc>) -> bool {
        !self.closed() && t > self.end
    }

    /// Idempotent: closing an already-closed window is a no-op. Returns whether this call was
    /// the one that performed the transition (useful for "invoked exactly once" callers).
    pub fn close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Truncates `t` down to the nearest multiple of `duration` since the Unix epoch — the
/// window-alignment rule from §3/§4.4 ("`start = floor(t, duration)`").
pub fn floor_to_duration(t: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    let duration_ms = duration.num_milliseconds().max(1);
    let t_ms = t.timestamp_millis();
    let floored_ms = t_ms.div_euclid(duration_ms) * duration_ms;
    DateTime::from_timestamp_millis(floored_ms).unwrap_or(t)
}
