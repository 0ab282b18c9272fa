//! Real-time event aggregation engine.
//!
//! Accepts a stream of analytics events through a bounded, non-blocking ingress queue, fans
//! them out to a worker pool that folds each event into a set of global counters/gauges/
//! histograms/unique-sets and into the metrics of whichever tumbling time window the event's
//! timestamp falls in, and periodically closes windows whose lifetime has elapsed, notifying a
//! caller-registered callback.
//!
//! # Example
//!
//! ```rust
//! use event_aggregator::config::ServiceConfig;
//! use event_aggregator::lifecycle::Service;
//! use event_aggregator::event::Event;
//! use std::collections::HashMap;
//!
//! # async fn run() {
//! let config = ServiceConfig::default();
//! let service = Service::start(&config);
//!
//! let event = Event {
//!     id: String::new(),
//!     event_type: "pageview".to_string(),
//!     timestamp: chrono::Utc::now(),
//!     user_id: Some("user_42".to_string()),
//!     session_id: None,
//!     properties: HashMap::new(),
//! }
//! .normalize()
//! .unwrap();
//!
//! service.queue().try_enqueue(event).unwrap();
//! service.shutdown().await;
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod lifecycle;
pub mod metrics;
pub mod window;

pub use aggregator::{Aggregator, Stats};
pub use config::ServiceConfig;
pub use error::{AggregatorError, Result};
pub use event::{Event, MAX_BATCH_SIZE};
pub use ingest::{IngressQueue, WorkerPool};
pub use lifecycle::Service;
pub use metrics::{Metric, MetricKind, MetricSnapshot, MetricSnapshotValue};
pub use window::{TimeWindow, WindowManager};

/// Crate version, surfaced by the HTTP demonstration binary's `/health` and `/ready` endpoints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
