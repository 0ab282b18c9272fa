//! The worker pool that drains the ingress queue and feeds the aggregator.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::queue::IngressReceiver;
use crate::aggregator::Aggregator;
use crate::event::Event;

/// `worker_count` tasks pulling from one shared receiver.
///
/// `tokio::sync::mpsc::Receiver` only supports a single logical consumer, so fanning a single
/// channel out to several concurrent workers needs the receiver itself behind a lock — the
/// `Arc<tokio::sync::Mutex<Receiver<T>>>` idiom, rather than standing up one channel per
/// worker. Shutdown is driven entirely by channel closure: once every [`super::IngressQueue`]
/// clone is dropped, `recv()` returns `None` for every worker and the pool drains naturally —
/// the bounded wait for that to happen is [`crate::lifecycle`]'s job, not this pool's.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` tasks, each repeatedly locking `receiver`, pulling the next event,
    /// and handing it to `aggregator.process_event`. `worker_count` of zero spawns no tasks —
    /// the pool simply never drains (callers are expected to treat that as a configuration
    /// error upstream, e.g. `ServiceConfig` validation).
    pub fn spawn(
        worker_count: usize,
        receiver: IngressReceiver,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        let shared = Arc::new(AsyncMutex::new(receiver.receiver));
        let mut handles = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let shared = shared.clone();
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let event = {
                        let mut guard = shared.lock().await;
                        guard.recv().await
                    };
                    match event {
                        Some(event) => aggregator.process_event(&event),
                        None => break,
                    }
                }
                debug!(worker_id, "ingest worker exited: queue closed");
            }));
        }

        Self { handles }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Awaits every worker task to completion (i.e. until the ingress queue closes).
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!(%err, "ingest worker task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::ingest::queue::IngressQueue;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;

    fn event(event_type: &str) -> Event {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            timestamp: chrono::Utc::now(),
            user_id: Some("u1".to_string()),
            session_id: None,
            properties: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn multiple_workers_drain_all_enqueued_events() {
        let aggregator = Arc::new(Aggregator::new(Duration::minutes(1), StdDuration::from_secs(5)));
        let (queue, receiver) = IngressQueue::new(100);
        let pool = WorkerPool::spawn(4, receiver, aggregator.clone());

        for _ in 0..50 {
            queue.try_enqueue(event("pageview")).unwrap();
        }
        drop(queue);
        pool.join().await;

        assert_eq!(aggregator.global_metric_value("total_events"), Some(50.0));
    }

    #[tokio::test]
    async fn pool_exits_cleanly_when_queue_closes_immediately() {
        let aggregator = Arc::new(Aggregator::new(Duration::minutes(1), StdDuration::from_secs(5)));
        let (queue, receiver) = IngressQueue::new(10);
        let pool = WorkerPool::spawn(2, receiver, aggregator);
        drop(queue);
        pool.join().await;
    }
}
