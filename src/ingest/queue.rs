//! A bounded, non-blocking ingress queue for incoming events.

use tokio::sync::mpsc;

use crate::error::{AggregatorError, Result};
use crate::event::Event;

/// Producer handle onto the bounded channel: `enqueue` never blocks (§4.3 — "the ingress queue
/// rejects rather than blocks once full"), mirroring the teacher's ingestion pipeline's
/// channel-based buffering but swapping the blocking Kafka producer for a plain bounded
/// `tokio::mpsc` sender, since there is no external broker in this design.
#[derive(Clone)]
pub struct IngressQueue {
    sender: mpsc::Sender<Event>,
}

/// The paired consumer side. Wrapped so a [`crate::ingest::worker::WorkerPool`] can share one
/// receiver across many workers.
pub struct IngressReceiver {
    pub(crate) receiver: mpsc::Receiver<Event>,
}

impl IngressQueue {
    /// Creates a bounded channel of the given capacity, returning the producer and consumer
    /// halves. `capacity` corresponds to `processing.buffer_size` (§6).
    pub fn new(capacity: usize) -> (Self, IngressReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, IngressReceiver { receiver })
    }

    /// Attempts to enqueue a single event without blocking. Maps a full queue to
    /// [`AggregatorError::Backpressure`] and a queue with no live receiver (workers have all
    /// exited) to [`AggregatorError::Shutdown`].
    pub fn try_enqueue(&self, event: Event) -> Result<()> {
        self.sender.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => AggregatorError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => AggregatorError::Shutdown,
        })
    }

    /// Enqueues a whole batch, continuing item-by-item even after a full queue rejects one
    /// (§4.6/§9: "continues even after the queue fills, counting remaining events as rejected
    /// without breaking"). Only [`AggregatorError::Backpressure`] is tallied as a per-item
    /// rejection; a [`AggregatorError::Shutdown`] (no live receiver) aborts the batch immediately
    /// since no further item could possibly be accepted either.
    pub fn try_enqueue_batch(&self, events: Vec<Event>) -> Result<BatchOutcome> {
        let mut accepted = 0usize;
        let mut rejected = 0usize;
        for event in events {
            match self.try_enqueue(event) {
                Ok(()) => accepted += 1,
                Err(AggregatorError::Backpressure) => rejected += 1,
                Err(other) => return Err(other),
            }
        }
        Ok(BatchOutcome { accepted, rejected })
    }

    /// Approximate number of events currently buffered (advisory; may be stale by the time the
    /// caller reads it).
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How many events of a batch were accepted versus rejected for backpressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event() -> Event {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: "pageview".to_string(),
            timestamp: chrono::Utc::now(),
            user_id: None,
            session_id: None,
            properties: HashMap::new(),
        }
    }

    #[test]
    fn try_enqueue_succeeds_within_capacity() {
        let (queue, _rx) = IngressQueue::new(2);
        assert!(queue.try_enqueue(event()).is_ok());
        assert!(queue.try_enqueue(event()).is_ok());
    }

    #[test]
    fn try_enqueue_reports_backpressure_when_full() {
        let (queue, _rx) = IngressQueue::new(1);
        queue.try_enqueue(event()).unwrap();
        assert!(matches!(
            queue.try_enqueue(event()),
            Err(AggregatorError::Backpressure)
        ));
    }

    #[test]
    fn try_enqueue_reports_shutdown_once_receiver_dropped() {
        let (queue, rx) = IngressQueue::new(1);
        drop(rx);
        assert!(matches!(
            queue.try_enqueue(event()),
            Err(AggregatorError::Shutdown)
        ));
    }

    #[test]
    fn batch_enqueue_continues_past_a_full_queue_and_tallies_rejections() {
        let (queue, _rx) = IngressQueue::new(2);
        let batch = vec![event(), event(), event(), event()];
        let outcome = queue.try_enqueue_batch(batch).unwrap();
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejected, 2);
    }

    #[test]
    fn batch_enqueue_aborts_immediately_on_shutdown() {
        let (queue, rx) = IngressQueue::new(2);
        drop(rx);
        let batch = vec![event(), event()];
        assert!(matches!(
            queue.try_enqueue_batch(batch),
            Err(AggregatorError::Shutdown)
        ));
    }
}
