use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A committed change: the path that was written and its value afterwards
/// (`None` if the write removed it).
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: String,
    pub value: Option<Value>,
}

/// Broadcast hub for path subscriptions.
///
/// One channel per subscribed path. A change is delivered to every channel
/// whose path is an ancestor or descendant of the changed path.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Change>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a normalized path. Creates the channel if needed.
    pub fn subscribe(&self, path: &str) -> broadcast::Receiver<Change> {
        let sender = self
            .channels
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Deliver a change. Channels nobody listens to any more are dropped.
    pub fn send(&self, changed: &[&str], change: &Change) {
        self.channels.retain(|key, sender| {
            if sender.receiver_count() == 0 {
                return false;
            }
            let key_segs: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
            if crate::store::path::related(&key_segs, changed) {
                let _ = sender.send(change.clone());
            }
            true
        });
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(path: &str) -> Change {
        Change {
            path: path.to_string(),
            value: Some(json!(true)),
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe("bookings");

        let c = change("bookings/b1/guests/g1");
        hub.send(&["bookings", "b1", "guests", "g1"], &c);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, c);
    }

    #[tokio::test]
    async fn ancestor_write_reaches_descendant_subscriber() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe("bookings/b1/guests");
        hub.send(&["bookings", "b1"], &change("bookings/b1"));
        assert_eq!(rx.recv().await.unwrap().path, "bookings/b1");
    }

    #[test]
    fn sibling_write_is_not_delivered() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe("bookings/b1");
        hub.send(&["bookings", "b2"], &change("bookings/b2"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send(&["bookings"], &change("bookings"));
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn dropped_receivers_prune_channel() {
        let hub = NotifyHub::new();
        let rx = hub.subscribe("bookings");
        assert_eq!(hub.channel_count(), 1);
        drop(rx);
        hub.send(&["bookings"], &change("bookings"));
        assert_eq!(hub.channel_count(), 0);
    }
}
