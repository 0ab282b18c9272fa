//! The aggregation engine: event → metric mapping, global + window updates, the periodic
//! flush loop, and window-closed callback dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::event::Event;
use crate::metrics::{MetricKind, MetricSnapshot, MetricSnapshotValue};
use crate::window::{TimeWindow, WindowManager};

/// Number of window durations a closed window is retained for before [`WindowManager::cleanup`]
/// drops it (§4.5.4: "nominal retention: 5 minutes for a 1-minute window").
const CLEANUP_RETENTION_FACTOR: i32 = 5;

type WindowClosedCallback = dyn Fn(Arc<TimeWindow>) + Send + Sync;

/// Snapshot of aggregate statistics returned by [`Aggregator::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_events: i64,
    pub unique_users: i64,
    pub unique_sessions: i64,
    pub active_windows: usize,
    pub metrics_count: usize,
    pub uptime_secs: i64,
}

/// Translates events into global and per-window metric updates and owns the window lifecycle.
///
/// The global [`MetricSnapshot`] and the [`WindowManager`] are exclusively owned here (§3); the
/// window manager sits behind a [`parking_lot::RwLock`] only so that [`Aggregator::reset`] can
/// swap it out wholesale for a fresh one — the hot path (`process_event`) only ever takes a
/// read lock, under which the manager's own internal locking does the real work.
pub struct Aggregator {
    global: MetricSnapshot,
    windows: RwLock<WindowManager>,
    window_duration: Duration,
    flush_interval: StdDuration,
    callback: RwLock<Option<Arc<WindowClosedCallback>>>,
    started_at: DateTime<Utc>,
}

impl Aggregator {
    /// Constructs an aggregator with the given tumbling-window width and flush-loop period.
    /// No logger is injected (§9 Open Question): this crate, like the rest of the codebase,
    /// logs through the ambient `tracing` facade.
    pub fn new(window_duration: Duration, flush_interval: StdDuration) -> Self {
        Self {
            global: MetricSnapshot::new(),
            windows: RwLock::new(WindowManager::new(window_duration)),
            window_duration,
            flush_interval,
            callback: RwLock::new(None),
            started_at: Utc::now(),
        }
    }

    /// Registers the single window-closed callback. Replaces any previously-registered one.
    pub fn set_window_closed_callback<F>(&self, callback: F)
    where
        F: Fn(Arc<TimeWindow>) + Send + Sync + 'static,
    {
        *self.callback.write() = Some(Arc::new(callback));
    }

    /// §4.5.1: updates global metrics, then — only if the event's timestamp still falls
    /// within the active lifetime of its window — updates that window's metrics too. Safe to
    /// call concurrently from any number of workers.
    pub fn process_event(&self, event: &Event) {
        self.update_global_metrics(event);

        let window = self.windows.read().get_or_create_window(event.timestamp);
        if window.is_active(event.timestamp) {
            Self::update_window_metrics(window.metrics(), event);
        } else {
            debug!(
                event_id = %event.id,
                window_start = %window.start(),
                "event timestamp outside active window lifetime; window metrics skipped"
            );
        }
    }

    fn update_global_metrics(&self, event: &Event) {
        self.global
            .get_or_create("total_events", MetricKind::Counter)
            .increment();
        self.global
            .get_or_create(
                &format!("events_by_type:{}", event.event_type),
                MetricKind::Counter,
            )
            .increment();

        if let Some(user_id) = event.user_id() {
            self.global
                .get_or_create("unique_users", MetricKind::UniqueSet)
                .add_unique(user_id);
        }
        if let Some(session_id) = event.session_id() {
            self.global
                .get_or_create("unique_sessions", MetricKind::UniqueSet)
                .add_unique(session_id);
        }

        match event.event_type.as_str() {
            "pageview" => {
                self.global
                    .get_or_create("pageviews", MetricKind::Counter)
                    .increment();
                if let Some(page) = event.property_str("page") {
                    self.global
                        .get_or_create("unique_pages", MetricKind::UniqueSet)
                        .add_unique(page);
                    self.global
                        .get_or_create(&format!("page_views:{page}"), MetricKind::Counter)
                        .increment();
                }
            }
            "click" => {
                self.global
                    .get_or_create("clicks", MetricKind::Counter)
                    .increment();
                if let Some(element) = event.property_str("element") {
                    self.global
                        .get_or_create(&format!("clicks:{element}"), MetricKind::Counter)
                        .increment();
                }
            }
            "purchase" => {
                self.global
                    .get_or_create("purchases", MetricKind::Counter)
                    .increment();
                if let Some(amount) = event.property_f64("amount") {
                    self.global
                        .get_or_create("revenue", MetricKind::Counter)
                        .increment_by(amount);
                    self.global
                        .get_or_create("revenue_histogram", MetricKind::Histogram)
                        .observe(amount);
                }
            }
            _ => {}
        }
    }

    fn update_window_metrics(window_metrics: &MetricSnapshot, event: &Event) {
        window_metrics
            .get_or_create("events", MetricKind::Counter)
            .increment();
        window_metrics
            .get_or_create(&format!("events:{}", event.event_type), MetricKind::Counter)
            .increment();
        if let Some(user_id) = event.user_id() {
            window_metrics
                .get_or_create("active_users", MetricKind::UniqueSet)
                .add_unique(user_id);
        }
    }

    /// Spawns the dedicated flush-loop task (§4.5.4). Ticks at `flush_interval`, closing
    /// expired windows, dispatching the window-closed callback, and pruning windows past the
    /// cleanup horizon. Exits when `shutdown` is set to `true`, performing one final sweep
    /// first so in-flight windows are not silently lost.
    pub fn spawn_flush_loop(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.flush_interval);
            info!(interval_secs = self.flush_interval.as_secs(), "flush loop started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep(Utc::now());
                    }
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            self.sweep(Utc::now());
            info!("flush loop exited after final sweep");
        })
    }

    fn sweep(&self, now: DateTime<Utc>) {
        let closed = self.windows.read().close_expired_windows(now);
        for window in &closed {
            self.dispatch_window_closed(window);
        }
        self.windows
            .read()
            .cleanup(now, self.window_duration * CLEANUP_RETENTION_FACTOR);
    }

    fn dispatch_window_closed(&self, window: &Arc<TimeWindow>) {
        let callback = self.callback.read().clone();
        let Some(callback) = callback else {
            return;
        };
        let window = window.clone();
        let start = window.start();
        let end = window.end();
        let outcome = catch_unwind(AssertUnwindSafe(|| (*callback)(window)));
        if outcome.is_err() {
            error!(%start, %end, "window-closed callback panicked; isolated, loop continues");
        }
    }

    /// A shallow copy of the global name→metric mapping.
    pub fn global_metrics(&self) -> std::collections::HashMap<String, MetricSnapshotValue> {
        self.global.snapshot_values()
    }

    /// The current value of a single global metric, if it exists.
    pub fn global_metric_value(&self, name: &str) -> Option<f64> {
        self.global.get(name).map(|m| m.value())
    }

    /// Open windows, in insertion order.
    pub fn active_windows(&self) -> Vec<Arc<TimeWindow>> {
        self.windows.read().active_windows()
    }

    pub fn stats(&self) -> Stats {
        let total_events = self
            .global
            .get("total_events")
            .map(|m| m.count())
            .unwrap_or(0);
        let unique_users = self
            .global
            .get("unique_users")
            .map(|m| m.count())
            .unwrap_or(0);
        let unique_sessions = self
            .global
            .get("unique_sessions")
            .map(|m| m.count())
            .unwrap_or(0);
        let windows = self.windows.read();
        Stats {
            total_events,
            unique_users,
            unique_sessions,
            active_windows: windows.active_windows().len(),
            metrics_count: self.global.len(),
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
        }
    }

    /// Clears global metrics and replaces the window manager with a fresh one. Intended for
    /// tests, not normal operation.
    pub fn reset(&self) {
        warn!("aggregator reset invoked");
        self.global.reset();
        *self.windows.write() = WindowManager::new(self.window_duration);
    }
}
