//! Startup and graceful shutdown orchestration, wiring the ingress queue, worker pool, and
//! aggregator flush loop into a single handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::config::ServiceConfig;
use crate::ingest::{IngressQueue, WorkerPool};

/// Owns the running pieces of the aggregation engine: the aggregator itself, the ingress
/// queue's producer handle, the worker pool draining it, and the flush-loop task. Mirrors the
/// teacher pipeline's `initialize`/`shutdown` component lifecycle (§ ambient stack), collapsed
/// to the single component this crate has.
pub struct Service {
    aggregator: Arc<Aggregator>,
    queue: IngressQueue,
    shutdown_tx: watch::Sender<bool>,
    worker_pool: Option<WorkerPool>,
    flush_handle: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl Service {
    /// Builds the aggregator, ingress queue, and worker pool from `config`, and spawns the
    /// flush loop. Returns immediately; the worker pool and flush loop run in the background.
    pub fn start(config: &ServiceConfig) -> Self {
        let aggregator = Arc::new(Aggregator::new(
            config.window_duration(),
            config.flush_interval(),
        ));
        let (queue, receiver) = IngressQueue::new(config.processing.buffer_size);
        let worker_pool = WorkerPool::spawn(
            config.processing.worker_count,
            receiver,
            aggregator.clone(),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let flush_handle = aggregator.clone().spawn_flush_loop(shutdown_rx);

        info!(
            worker_count = config.processing.worker_count,
            buffer_size = config.processing.buffer_size,
            window_size_secs = config.window.size_secs,
            "aggregation service started"
        );

        Self {
            aggregator,
            queue,
            shutdown_tx,
            worker_pool: Some(worker_pool),
            flush_handle: Some(flush_handle),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// A cloneable producer handle onto the ingress queue, for HTTP handlers or any other
    /// ingestion entry point to share.
    pub fn queue(&self) -> IngressQueue {
        self.queue.clone()
    }

    /// Stops accepting new work and drains in-flight events within a bounded deadline.
    ///
    /// Per §9's resolution of the shutdown Open Question, this is a conservative bounded
    /// drain: the queue's own producer handle is dropped (closing the channel so workers see
    /// `None` once they've drained what's buffered), the flush loop is signalled to perform its
    /// final sweep and exit, and both are given up to `shutdown_timeout` to finish. A drain
    /// that overruns the deadline is logged and abandoned rather than awaited indefinitely —
    /// any other live [`IngressQueue`] clones (e.g. held by an HTTP handler) still need to stop
    /// accepting new events for the channel to actually close; that coordination is the
    /// caller's responsibility (see `src/bin/ingestion-service.rs`).
    pub async fn shutdown(mut self) {
        info!("shutdown requested");
        drop(self.queue);
        let _ = self.shutdown_tx.send(true);

        if let Some(pool) = self.worker_pool.take() {
            let worker_count = pool.worker_count();
            if tokio::time::timeout(self.shutdown_timeout, pool.join())
                .await
                .is_err()
            {
                warn!(
                    worker_count,
                    "worker pool did not drain within the shutdown timeout; abandoning in-flight events"
                );
            }
        }

        if let Some(handle) = self.flush_handle.take() {
            if tokio::time::timeout(self.shutdown_timeout, handle)
                .await
                .is_err()
            {
                warn!("flush loop did not exit within the shutdown timeout");
            }
        }

        info!("shutdown complete");
    }
}
