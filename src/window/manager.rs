//! Owns the set of [`TimeWindow`]s: alignment, lookup, expiry, and cleanup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::time_window::{floor_to_duration, TimeWindow};

/// The windows collection plus its insertion order, behind one lock.
///
/// §5 is explicit that the window manager holds "a collection-wide lock for
/// insert/expire/cleanup" — unlike [`crate::metrics::MetricSnapshot`], which can lean on
/// `DashMap`'s sharded locking, window lifecycle operations (`GetOrCreateWindow`,
/// `CloseExpiredWindows`, `Cleanup`) all need to reason about the whole collection at once, so
/// a single `Mutex` is the simpler and correct choice here.
struct Windows {
    by_start: HashMap<DateTime<Utc>, Arc<TimeWindow>>,
    order: Vec<DateTime<Utc>>,
}

/// Manages the tumbling windows for a fixed `duration`.
pub struct WindowManager {
    duration: Duration,
    windows: Mutex<Windows>,
}

impl WindowManager {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            windows: Mutex::new(Windows {
                by_start: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the window for the aligned bucket containing `t`, creating it if absent. At
    /// most one window exists per aligned start (§4.4 invariant); if a window for this start
    /// already exists — open or closed — its identity is returned so that a caller who is
    /// still holding a reference from before a concurrent `Close()` keeps seeing the same
    /// window object.
    pub fn get_or_create_window(&self, t: DateTime<Utc>) -> Arc<TimeWindow> {
        let start = floor_to_duration(t, self.duration);
        let mut windows = self.windows.lock();
        if let Some(existing) = windows.by_start.get(&start) {
            return existing.clone();
        }
        let window = Arc::new(TimeWindow::new(start, self.duration));
        windows.by_start.insert(start, window.clone());
        windows.order.push(start);
        window
    }

    /// Closes every window whose `should_close(now)` holds, returning them in the order
    /// encountered (not necessarily ordered by start time; closure itself is idempotent).
    pub fn close_expired_windows(&self, now: DateTime<Utc>) -> Vec<Arc<TimeWindow>> {
        let windows = self.windows.lock();
        let mut closed = Vec::new();
        for start in &windows.order {
            if let Some(window) = windows.by_start.get(start) {
                if window.should_close(now) {
                    window.close();
                    closed.push(window.clone());
                }
            }
        }
        closed
    }

    /// Drops closed windows whose `end` is older than `now - keep`. Open windows are always
    /// retained regardless of age.
    pub fn cleanup(&self, now: DateTime<Utc>, keep: Duration) {
        let mut windows = self.windows.lock();
        let horizon = now - keep;
        let mut retained_order = Vec::with_capacity(windows.order.len());
        for start in std::mem::take(&mut windows.order) {
            let drop = windows
                .by_start
                .get(&start)
                .map(|w| w.closed() && w.end() < horizon)
                .unwrap_or(true);
            if drop {
                windows.by_start.remove(&start);
            } else {
                retained_order.push(start);
            }
        }
        windows.order = retained_order;
    }

    /// Open (not closed) windows, in insertion order.
    pub fn active_windows(&self) -> Vec<Arc<TimeWindow>> {
        let windows = self.windows.lock();
        windows
            .order
            .iter()
            .filter_map(|start| windows.by_start.get(start))
            .filter(|w| !w.closed())
            .cloned()
            .collect()
    }

    /// Total windows currently tracked (open and closed-but-not-yet-cleaned).
    pub fn window_count(&self) -> usize {
        self.windows.lock().by_start.len()
    }
}
