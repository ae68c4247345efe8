//! Non-blocking fan-out of gesture events to subscribers.
//!
//! Each subscriber owns a bounded queue drained by its own task. `publish`
//! hands a message to every queue under short-held locks and returns
//! immediately; it never awaits, so the vision loop cannot be stalled by a
//! slow subscriber.
//!
//! Overflow policy is newest-wins: a stale gesture delivered late is worse
//! than a missed one. When a queue is full, a buffered `status` message is
//! sacrificed first; otherwise the oldest entry goes. Every drop is
//! counted per subscriber and surfaced through subsequent `status`
//! messages.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};

use gesture_vision_core::GestureEvent;

/// Snapshot of pipeline health for `status` messages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusUpdate {
    /// Vision loop frame rate, moving average
    pub fps: f64,
    /// Frame processing latency estimate, milliseconds
    pub latency_ms: f64,
    /// Currently tracked hands
    pub hands_detected: usize,
}

/// A message queued toward one subscriber. Serialization happens in the
/// subscriber task because per-connection flags (mirror mode) shape the
/// final frame.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// One emitted gesture event
    Gesture(GestureEvent),
    /// Periodic health report
    Status(StatusUpdate),
    /// Server is shutting down; close the connection normally
    Shutdown,
}

/// One subscriber's bounded outbound queue.
///
/// Single producer (the broadcaster) and single consumer (the subscriber's
/// task); the mutex is held only for a push or a pop.
pub struct SubscriberQueue {
    id: u64,
    capacity: usize,
    queue: Mutex<VecDeque<Outbound>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn new(id: u64, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Subscriber identity, unique for the server's lifetime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Events dropped on this queue so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue a message, evicting under the newest-wins policy on
    /// overflow. Never blocks.
    fn push(&self, message: Outbound) {
        {
            let mut queue = self.queue.lock();
            if queue.len() == self.capacity {
                // Sacrifice a stale status report before any gesture.
                let status_idx = queue
                    .iter()
                    .position(|m| matches!(m, Outbound::Status(_)));
                match status_idx {
                    Some(idx) => {
                        queue.remove(idx);
                    }
                    None => {
                        queue.pop_front();
                    }
                }
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(message);
        }
        self.notify.notify_one();
    }

    /// Receive the next message, waiting until one is available.
    pub async fn recv(&self) -> Outbound {
        loop {
            if let Some(message) = self.queue.lock().pop_front() {
                return message;
            }
            self.notify.notified().await;
        }
    }

    /// Pop without waiting; test and drain helper.
    #[must_use]
    pub fn try_recv(&self) -> Option<Outbound> {
        self.queue.lock().pop_front()
    }
}

/// Fan-out hub between the vision loop and subscriber tasks.
pub struct Broadcaster {
    subscribers: Mutex<Vec<Arc<SubscriberQueue>>>,
    queue_capacity: usize,
    next_id: AtomicU64,
    messages_sent: AtomicU64,
    connections_total: AtomicU64,
}

impl Broadcaster {
    /// Create a broadcaster; every subscriber gets a queue of
    /// `queue_capacity` messages.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            queue_capacity: queue_capacity.max(1),
            next_id: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
        }
    }

    /// Deliver a message to every subscriber queue. Total and
    /// non-blocking; called from the vision loop.
    pub fn publish(&self, message: Outbound) {
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.iter() {
            subscriber.push(message.clone());
        }
        self.messages_sent
            .fetch_add(subscribers.len() as u64, Ordering::Relaxed);
    }

    /// Register a new subscriber and return its queue handle.
    pub fn subscribe(&self) -> Arc<SubscriberQueue> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(id, self.queue_capacity));
        self.subscribers.lock().push(queue.clone());
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        info!(subscriber = id, total = self.subscriber_count(), "subscriber connected");
        queue
    }

    /// Remove a subscriber; its queue is torn down with the last handle.
    pub fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        if subscribers.len() != before {
            debug!(subscriber = id, total = subscribers.len(), "subscriber removed");
        }
    }

    /// Number of currently connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Messages handed off to subscriber queues since startup.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Connections accepted since startup.
    #[must_use]
    pub fn connections_total(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gesture_vision_core::{Confidence, DetectionMetadata, GestureLabel, HandId};

    fn event(timestamp_ms: i64) -> GestureEvent {
        GestureEvent {
            label: GestureLabel::OpenPalm,
            confidence: Confidence::clamped(0.9),
            hand_id: HandId::all()[0],
            timestamp_ms,
            metadata: DetectionMetadata {
                hand_center: [0.5, 0.5],
                hand_size: 0.2,
                wrist_z: 0.0,
                fingers_extended: 4,
            },
        }
    }

    fn status() -> StatusUpdate {
        StatusUpdate {
            fps: 30.0,
            latency_ms: 2.0,
            hands_detected: 1,
        }
    }

    fn drain_timestamps(queue: &SubscriberQueue) -> Vec<i64> {
        let mut out = Vec::new();
        while let Some(message) = queue.try_recv() {
            if let Outbound::Gesture(e) = message {
                out.push(e.timestamp_ms);
            }
        }
        out
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let broadcaster = Broadcaster::new(8);
        let a = broadcaster.subscribe();
        let b = broadcaster.subscribe();

        broadcaster.publish(Outbound::Gesture(event(1)));

        assert_eq!(drain_timestamps(&a), vec![1]);
        assert_eq!(drain_timestamps(&b), vec![1]);
        assert_eq!(broadcaster.messages_sent(), 2);
    }

    #[test]
    fn test_overflow_drops_oldest_keeps_newest() {
        let broadcaster = Broadcaster::new(3);
        let sub = broadcaster.subscribe();

        for i in 0..5 {
            broadcaster.publish(Outbound::Gesture(event(i)));
        }

        // Newest-wins: 0 and 1 evicted, order of the survivors preserved.
        assert_eq!(drain_timestamps(&sub), vec![2, 3, 4]);
        assert_eq!(sub.dropped(), 2);
    }

    #[test]
    fn test_status_sacrificed_before_gestures() {
        let broadcaster = Broadcaster::new(3);
        let sub = broadcaster.subscribe();

        broadcaster.publish(Outbound::Gesture(event(1)));
        broadcaster.publish(Outbound::Status(status()));
        broadcaster.publish(Outbound::Gesture(event(2)));
        // Queue full; the buffered status must go before any gesture.
        broadcaster.publish(Outbound::Gesture(event(3)));

        assert_eq!(drain_timestamps(&sub), vec![1, 2, 3]);
        assert_eq!(sub.dropped(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let broadcaster = Broadcaster::new(8);
        let sub = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.unsubscribe(sub.id());
        assert_eq!(broadcaster.subscriber_count(), 0);

        broadcaster.publish(Outbound::Gesture(event(1)));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let broadcaster = Broadcaster::new(2);
        let slow = broadcaster.subscribe();
        let fast = broadcaster.subscribe();

        for i in 0..4 {
            broadcaster.publish(Outbound::Gesture(event(i)));
            // The fast subscriber drains every message immediately.
            assert!(fast.try_recv().is_some());
        }

        assert_eq!(fast.dropped(), 0);
        assert_eq!(slow.dropped(), 2);
        assert_eq!(drain_timestamps(&slow), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_publish() {
        let broadcaster = Arc::new(Broadcaster::new(8));
        let sub = broadcaster.subscribe();

        let publisher = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                broadcaster.publish(Outbound::Gesture(event(42)));
            })
        };

        let message = sub.recv().await;
        assert!(matches!(message, Outbound::Gesture(e) if e.timestamp_ms == 42));
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_is_delivered() {
        let broadcaster = Broadcaster::new(2);
        let sub = broadcaster.subscribe();
        broadcaster.publish(Outbound::Shutdown);
        assert!(matches!(sub.recv().await, Outbound::Shutdown));
    }
}
