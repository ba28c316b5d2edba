//! In-process event bus with pattern-matched fan-out.
//!
//! Each subscription owns a bounded queue; publish walks the live
//! subscriptions, matches the event's routing key against each compiled
//! pattern, and enqueues without ever blocking. A full subscriber loses the
//! event (logged) — slow consumers degrade their own completeness, never
//! the publisher's throughput. Events published by one task arrive at every
//! matching subscription in publish order.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::mpsc;

use hearth_domain::error::HubError;
use hearth_domain::event::Event;
use hearth_domain::id::SubscriptionId;
use hearth_domain::routing::Pattern;

use crate::ports::EventPublisher;

/// Default per-subscription queue capacity.
pub const DEFAULT_CAPACITY: usize = 256;

struct Subscriber {
    pattern: Pattern,
    sender: mpsc::Sender<Event>,
}

/// In-process publish/subscribe router.
///
/// Publishing succeeds even when there are no subscribers (the event is
/// simply dropped).
pub struct EventBus {
    capacity: usize,
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus with the given per-subscription queue capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to events whose routing key matches `pattern`.
    ///
    /// Returns the subscription id and the receiving end of the
    /// subscription's queue. Only events published *after* the subscription
    /// is created are delivered. Dropping the receiver ends the
    /// subscription (it is pruned on the next matching publish).
    #[must_use]
    pub fn subscribe(&self, pattern: Pattern) -> (SubscriptionId, mpsc::Receiver<Event>) {
        let id = SubscriptionId::new();
        let (sender, receiver) = mpsc::channel(self.capacity);
        tracing::debug!(subscription = %id, pattern = %pattern, "subscribed");
        self.subscribers
            .write()
            .expect("subscriber map poisoned")
            .insert(id, Subscriber { pattern, sender });
        (id, receiver)
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self
            .subscribers
            .write()
            .expect("subscriber map poisoned")
            .remove(&id)
            .is_some()
        {
            tracing::debug!(subscription = %id, "unsubscribed");
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("subscriber map poisoned")
            .len()
    }

    /// Deliver `event` to every matching subscription.
    ///
    /// Delivery to each subscription is independent: a full or closed queue
    /// is logged and does not affect other subscriptions or the publisher.
    pub fn publish_event(&self, event: &Event) {
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read().expect("subscriber map poisoned");
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.pattern.matches(&event.routing_key) {
                    continue;
                }
                match subscriber.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            subscription = %id,
                            routing_key = %event.routing_key,
                            "subscriber queue full, event dropped"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(*id);
                    }
                }
            }
        }
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().expect("subscriber map poisoned");
            for id in dead {
                subscribers.remove(&id);
                tracing::debug!(subscription = %id, "pruned closed subscription");
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: Event) -> Result<(), HubError> {
        self.publish_event(&event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_domain::id::DeviceId;

    fn pattern(s: &str) -> Pattern {
        Pattern::compile(s).unwrap()
    }

    #[tokio::test]
    async fn should_deliver_event_to_matching_subscriber() {
        let bus = EventBus::default();
        let (_, mut rx) = bus.subscribe(pattern("device.*.state"));

        bus.publish(Event::device_state(
            DeviceId::new("d1"),
            serde_json::json!({"on": true}),
        ))
        .await
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.routing_key.as_str(), "device.d1.state");
    }

    #[tokio::test]
    async fn should_not_deliver_event_to_non_matching_subscriber() {
        let bus = EventBus::default();
        let (_, mut rx) = bus.subscribe(pattern("plugin.#"));

        bus.publish(Event::device_state(
            DeviceId::new("d1"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_matching_subscribers() {
        let bus = EventBus::default();
        let (_, mut rx1) = bus.subscribe(pattern("device.#"));
        let (_, mut rx2) = bus.subscribe(Pattern::catch_all());

        bus.publish(Event::device_available(DeviceId::new("d1"), false))
            .await
            .unwrap();

        assert_eq!(
            rx1.recv().await.unwrap().routing_key.as_str(),
            "device.d1.available"
        );
        assert_eq!(
            rx2.recv().await.unwrap().routing_key.as_str(),
            "device.d1.available"
        );
    }

    #[tokio::test]
    async fn should_preserve_publish_order_per_subscription() {
        let bus = EventBus::default();
        let (_, mut rx) = bus.subscribe(pattern("device.d1.state"));

        for n in 0..5 {
            bus.publish(Event::device_state(
                DeviceId::new("d1"),
                serde_json::json!({"seq": n}),
            ))
            .await
            .unwrap();
        }

        for n in 0..5 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.payload["seq"], n);
        }
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = EventBus::default();
        let result = bus
            .publish(Event::system("start", serde_json::json!({})))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_drop_event_when_subscriber_queue_full_without_blocking() {
        let bus = EventBus::new(2);
        let (_, mut rx) = bus.subscribe(Pattern::catch_all());

        for n in 0..10 {
            bus.publish(Event::system("tick", serde_json::json!({"seq": n})))
                .await
                .unwrap();
        }

        // Only the first two fit; the rest were dropped, publisher never blocked.
        assert_eq!(rx.recv().await.unwrap().payload["seq"], 0);
        assert_eq!(rx.recv().await.unwrap().payload["seq"], 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_stop_delivering_after_unsubscribe() {
        let bus = EventBus::default();
        let (id, mut rx) = bus.subscribe(Pattern::catch_all());
        bus.unsubscribe(id);

        bus.publish(Event::system("start", serde_json::json!({})))
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn should_prune_subscription_when_receiver_dropped() {
        let bus = EventBus::default();
        let (_, rx) = bus.subscribe(Pattern::catch_all());
        drop(rx);

        bus.publish(Event::system("start", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn should_keep_delivering_to_others_when_one_receiver_dropped() {
        let bus = EventBus::default();
        let (_, rx_dead) = bus.subscribe(Pattern::catch_all());
        let (_, mut rx_live) = bus.subscribe(Pattern::catch_all());
        drop(rx_dead);

        bus.publish(Event::system("start", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(
            rx_live.recv().await.unwrap().routing_key.as_str(),
            "system.start"
        );
    }
}
