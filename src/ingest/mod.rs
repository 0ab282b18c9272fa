//! Non-blocking ingress queue and the worker pool that drains it.

pub mod queue;
pub mod worker;

pub use queue::{BatchOutcome, IngressQueue, IngressReceiver};
pub use worker::WorkerPool;
