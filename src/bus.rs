//! Update bus
//!
//! Fans every published update out to one bounded queue per subscriber. Each
//! consumer drains its own queue at its own pace, so a slow consumer only delays
//! itself. Updates are wrapped in an `Arc` once and shared read-only.
//!
//! ```text
//! Device-1 ─┐                      ┌─► [queue] ─► AlertActor
//! Device-2 ─┼─► UpdateBus::publish ┼─► [queue] ─► StorageActor
//! Device-N ─┘                      └─► [queue] ─► AnalyticsActor
//! ```
//!
//! Per-producer order is preserved because a producer hands its update to every
//! queue before it can publish the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::actors::messages::{SharedUpdate, UpdateEvent};

/// What to do when a subscriber's queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for room in the queue (lossless)
    #[default]
    Block,

    /// Drop the update for this subscriber only
    DropNewest,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("every subscriber of the update bus is gone")]
    Closed,

    #[error("event limit of {0} updates reached")]
    LimitReached(u64),
}

struct Subscriber {
    name: String,
    sender: mpsc::Sender<SharedUpdate>,
    policy: OverflowPolicy,
    dropped: Arc<AtomicU64>,
}

struct EventLimit {
    max: u64,
    cancel: CancellationToken,
}

struct BusInner {
    subscribers: Vec<Subscriber>,
    limit: Option<EventLimit>,
    published: AtomicU64,
}

/// Receiving end of a bus subscription
pub struct Subscription {
    receiver: mpsc::Receiver<SharedUpdate>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    /// Receive the next update
    ///
    /// Returns `None` once every publisher is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<SharedUpdate> {
        self.receiver.recv().await
    }

    /// Number of updates waiting in the queue
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Updates dropped for this subscriber because its queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Builder registering the subscribers of a bus
#[derive(Default)]
pub struct BusBuilder {
    subscribers: Vec<Subscriber>,
    limit: Option<EventLimit>,
}

impl BusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer with its own bounded queue
    pub fn subscribe(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> Subscription {
        let name = name.into();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        self.subscribers.push(Subscriber {
            name,
            sender,
            policy,
            dropped: dropped.clone(),
        });

        Subscription { receiver, dropped }
    }

    /// Accept at most `max` updates, then trigger `cancel`
    pub fn event_limit(mut self, max: u64, cancel: CancellationToken) -> Self {
        self.limit = Some(EventLimit { max, cancel });
        self
    }

    pub fn build(self) -> UpdateBus {
        UpdateBus {
            inner: Arc::new(BusInner {
                subscribers: self.subscribers,
                limit: self.limit,
                published: AtomicU64::new(0),
            }),
        }
    }
}

/// Publishing side of the bus, cloned into every device actor
///
/// Subscribers see their queue close once the last clone is dropped.
#[derive(Clone)]
pub struct UpdateBus {
    inner: Arc<BusInner>,
}

impl UpdateBus {
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    /// Publish an update to every subscriber
    ///
    /// Returns the number of subscribers the update was handed to. A full lossy
    /// queue counts as a drop for that subscriber; the bus is only reported as
    /// closed once every subscriber is gone.
    pub async fn publish(&self, event: UpdateEvent) -> Result<usize, BusError> {
        let sequence = self.inner.published.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(limit) = &self.inner.limit {
            if sequence > limit.max {
                limit.cancel.cancel();
                return Err(BusError::LimitReached(limit.max));
            }
            if sequence == limit.max {
                trace!("event limit of {} reached, requesting stop", limit.max);
                limit.cancel.cancel();
            }
        }

        let event = Arc::new(event);
        let mut delivered = 0;
        let mut gone = 0;

        for subscriber in &self.inner.subscribers {
            match subscriber.policy {
                OverflowPolicy::Block => {
                    if subscriber.sender.send(event.clone()).await.is_ok() {
                        delivered += 1;
                    } else {
                        trace!("subscriber {} is gone", subscriber.name);
                        gone += 1;
                    }
                }
                OverflowPolicy::DropNewest => match subscriber.sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        let dropped = subscriber.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            "queue of {} is full, dropped update from {} ({dropped} dropped so far)",
                            subscriber.name, event.device_id
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        trace!("subscriber {} is gone", subscriber.name);
                        gone += 1;
                    }
                },
            }
        }

        if gone > 0 && gone == self.inner.subscribers.len() {
            return Err(BusError::Closed);
        }

        Ok(delivered)
    }

    /// Number of publish attempts so far, including rejected ones
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::SeqCst)
    }
}
