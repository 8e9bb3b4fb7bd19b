//! Ordered, bounded hand-off of step events between the sampling context and
//! the output context.
//!
//! Both ends are driven from plain threads through tokio's blocking channel
//! API. A full channel blocks the publisher; nothing is ever dropped.

use crate::event::StepEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

pub const DEFAULT_TOPIC: &str = "quadrature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("step consumer has gone away")]
    Closed,
    #[error("channel capacity must be at least 1")]
    ZeroCapacity,
}

/// Anything the sequencer can hand events to, in order.
pub trait StepSink {
    fn post(&mut self, event: StepEvent) -> Result<(), DispatchError>;
}

impl StepSink for Vec<StepEvent> {
    fn post(&mut self, event: StepEvent) -> Result<(), DispatchError> {
        self.push(event);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    posted: AtomicU64,
    delivered: AtomicU64,
    backpressure_waits: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub posted: u64,
    pub delivered: u64,
    pub backpressure_waits: u64,
}

#[derive(Debug, Clone)]
pub struct Publisher {
    topic: &'static str,
    tx: mpsc::Sender<StepEvent>,
    counters: Arc<Counters>,
}

/// The single registered consumer of a topic.
#[derive(Debug)]
pub struct Subscriber {
    topic: &'static str,
    rx: mpsc::Receiver<StepEvent>,
    counters: Arc<Counters>,
}

/// Create a topic with room for `capacity` in-flight events.
pub fn channel(
    topic: &'static str,
    capacity: usize,
) -> Result<(Publisher, Subscriber), DispatchError> {
    if capacity == 0 {
        return Err(DispatchError::ZeroCapacity);
    }
    let (tx, rx) = mpsc::channel(capacity);
    let counters = Arc::new(Counters::default());
    debug!(topic, capacity, "Step channel created");
    Ok((
        Publisher {
            topic,
            tx,
            counters: Arc::clone(&counters),
        },
        Subscriber {
            topic,
            rx,
            counters,
        },
    ))
}

fn snapshot(counters: &Counters) -> DispatchStats {
    DispatchStats {
        posted: counters.posted.load(Ordering::Relaxed),
        delivered: counters.delivered.load(Ordering::Relaxed),
        backpressure_waits: counters.backpressure_waits.load(Ordering::Relaxed),
    }
}

impl Publisher {
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Enqueue one event, blocking while the channel is full.
    ///
    /// Must not be called from inside an async runtime.
    pub fn post(&self, event: StepEvent) -> Result<(), DispatchError> {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.counters
                    .backpressure_waits
                    .fetch_add(1, Ordering::Relaxed);
                trace!(topic = self.topic, "Step channel full, waiting for consumer");
                self.tx
                    .blocking_send(event)
                    .map_err(|_| DispatchError::Closed)?;
            }
            Err(TrySendError::Closed(_)) => return Err(DispatchError::Closed),
        }
        self.counters.posted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> DispatchStats {
        snapshot(&self.counters)
    }
}

impl StepSink for Publisher {
    fn post(&mut self, event: StepEvent) -> Result<(), DispatchError> {
        Publisher::post(self, event)
    }
}

impl Subscriber {
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Block for the next event; `None` once every publisher is dropped and
    /// the queue is drained.
    pub fn recv(&mut self) -> Option<StepEvent> {
        let event = self.rx.blocking_recv()?;
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        Some(event)
    }

    /// Deliver every event to `handler` in post order until the topic closes.
    pub fn run<F: FnMut(StepEvent)>(mut self, mut handler: F) -> DispatchStats {
        while let Some(event) = self.recv() {
            handler(event);
        }
        debug!(topic = self.topic, "Step channel closed");
        self.stats()
    }

    pub fn stats(&self) -> DispatchStats {
        snapshot(&self.counters)
    }
}
