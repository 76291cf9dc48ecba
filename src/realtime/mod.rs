//! Publish/subscribe notifications for history lifecycle events.
//!
//! Each subscriber gets a bounded channel and a sliding one-minute window.
//! Events beyond the per-minute cap, or arriving while the channel is full,
//! are dropped rather than queued. Closed subscriptions are pruned on the
//! next publish.

mod events;

pub use events::{HistoryEvent, Notification};

use crate::config::NotifierConfig;
use crate::diff::{DiffSummary, RiskLevel};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Opaque subscriber handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    matrix_id: i64,
    receiver: mpsc::Receiver<Notification>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    #[must_use]
    pub const fn matrix_id(&self) -> i64 {
        self.matrix_id
    }

    /// Wait for the next notification; `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Next notification if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Dropped by the per-minute cap
    pub rate_limited: usize,
    /// Dropped because the subscriber's channel was full
    pub lagging: usize,
    /// Subscribers found closed and removed
    pub disconnected: usize,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<Notification>,
    window: VecDeque<Instant>,
}

impl Subscriber {
    /// Whether another delivery fits in the sliding window.
    fn has_room(&mut self, now: Instant, cap: usize) -> bool {
        while self
            .window
            .front()
            .is_some_and(|sent| now.duration_since(*sent) >= RATE_WINDOW)
        {
            self.window.pop_front();
        }
        self.window.len() < cap
    }
}

/// Fan-out of [`HistoryEvent`]s to subscribers of a matrix.
#[derive(Debug)]
pub struct Notifier {
    config: NotifierConfig,
    subscribers: Mutex<HashMap<i64, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

impl Notifier {
    #[must_use]
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to every event of one matrix.
    pub fn subscribe(&self, matrix_id: i64) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        self.lock().entry(matrix_id).or_default().push(Subscriber {
            id,
            sender,
            window: VecDeque::new(),
        });
        tracing::info!(matrix_id, subscriber = id.0, "Client subscribed");
        Subscription {
            id,
            matrix_id,
            receiver,
        }
    }

    /// Remove a subscriber. Its receiver drains what is buffered, then ends.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock();
        let mut removed = false;
        subscribers.retain(|_, list| {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        if removed {
            tracing::info!(subscriber = id.0, "Client unsubscribed");
        }
        removed
    }

    /// Number of live subscribers of a matrix.
    pub fn subscriber_count(&self, matrix_id: i64) -> usize {
        self.lock().get(&matrix_id).map_or(0, Vec::len)
    }

    pub fn notify_version_created(&self, matrix_id: i64, version: u32, created_by: Option<String>) -> Delivery {
        self.publish(HistoryEvent::VersionCreated {
            matrix_id,
            version,
            created_by,
        })
    }

    pub fn notify_diff_generated(
        &self,
        matrix_id: i64,
        from_version: u32,
        to_version: u32,
        summary: DiffSummary,
        risk_level: Option<RiskLevel>,
    ) -> Delivery {
        self.publish(HistoryEvent::DiffGenerated {
            matrix_id,
            from_version,
            to_version,
            summary,
            risk_level,
        })
    }

    pub fn notify_cache_invalidated(&self, matrix_id: i64, removed: usize) -> Delivery {
        self.publish(HistoryEvent::CacheInvalidated { matrix_id, removed })
    }

    /// Deliver an event to every subscriber of its matrix.
    pub fn publish(&self, event: HistoryEvent) -> Delivery {
        let matrix_id = event.matrix_id();
        let cap = self.config.max_events_per_minute as usize;
        let now = Instant::now();
        let notification = Notification {
            event,
            emitted_at: Utc::now(),
        };

        let mut delivery = Delivery::default();
        let mut subscribers = self.lock();
        let Some(list) = subscribers.get_mut(&matrix_id) else {
            return delivery;
        };

        list.retain_mut(|subscriber| {
            if subscriber.sender.is_closed() {
                delivery.disconnected += 1;
                return false;
            }
            if !subscriber.has_room(now, cap) {
                delivery.rate_limited += 1;
                return true;
            }
            match subscriber.sender.try_send(notification.clone()) {
                Ok(()) => {
                    subscriber.window.push_back(now);
                    delivery.delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    delivery.lagging += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    delivery.disconnected += 1;
                    false
                }
            }
        });
        if list.is_empty() {
            subscribers.remove(&matrix_id);
        }
        drop(subscribers);

        tracing::info!(
            matrix_id,
            event = notification.event.kind(),
            delivered = delivery.delivered,
            dropped = delivery.rate_limited + delivery.lagging,
            "Published history event"
        );
        delivery
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Vec<Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(max_events_per_minute: u32, channel_capacity: usize) -> Notifier {
        Notifier::new(NotifierConfig {
            max_events_per_minute,
            channel_capacity,
        })
    }

    #[tokio::test]
    async fn test_only_matching_matrix_receives() {
        let notifier = Notifier::default();
        let mut first = notifier.subscribe(1);
        let mut other = notifier.subscribe(2);

        let delivery = notifier.notify_version_created(1, 4, Some("alice".into()));
        assert_eq!(delivery.delivered, 1);

        let received = first.recv().await.unwrap();
        assert_eq!(received.event.kind(), "version_created");
        assert_eq!(received.event.matrix_id(), 1);
        assert!(other.try_recv().is_none());
    }

    #[test]
    fn test_rate_limit_drops_excess() {
        let notifier = notifier(2, 16);
        let mut sub = notifier.subscribe(1);
        for _ in 0..3 {
            notifier.notify_cache_invalidated(1, 0);
        }
        let last = notifier.notify_cache_invalidated(1, 0);
        assert_eq!(last.rate_limited, 1);
        assert_eq!(last.delivered, 0);

        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_full_channel_drops_without_queueing() {
        let notifier = notifier(100, 1);
        let _sub = notifier.subscribe(1);
        assert_eq!(notifier.notify_cache_invalidated(1, 1).delivered, 1);
        assert_eq!(notifier.notify_cache_invalidated(1, 2).lagging, 1);
    }

    #[test]
    fn test_lagging_events_do_not_use_rate_budget() {
        let notifier = notifier(2, 1);
        let mut sub = notifier.subscribe(1);
        assert_eq!(notifier.notify_cache_invalidated(1, 1).delivered, 1);
        for removed in 2..6 {
            assert_eq!(notifier.notify_cache_invalidated(1, removed).lagging, 1);
        }

        assert!(sub.try_recv().is_some());
        assert_eq!(notifier.notify_cache_invalidated(1, 6).delivered, 1);
        assert!(sub.try_recv().is_some());
        assert_eq!(notifier.notify_cache_invalidated(1, 7).rate_limited, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let notifier = Notifier::default();
        let mut sub = notifier.subscribe(3);
        assert!(notifier.unsubscribe(sub.id()));
        assert!(!notifier.unsubscribe(sub.id()));
        assert_eq!(notifier.subscriber_count(3), 0);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let notifier = Notifier::default();
        drop(notifier.subscribe(5));
        let delivery = notifier.notify_version_created(5, 1, None);
        assert_eq!(delivery.disconnected, 1);
        assert_eq!(notifier.subscriber_count(5), 0);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = HistoryEvent::CacheInvalidated {
            matrix_id: 2,
            removed: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cache_invalidated");
        assert_eq!(event.to_string(), "matrix 2: 3 cache entries invalidated");
    }
}
