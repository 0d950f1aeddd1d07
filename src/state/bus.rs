use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Realtime fan-out hub: one broadcast channel per match id.
///
/// Delivery is best-effort and at-least-once for connected subscribers; the
/// persisted store stays authoritative and reconnecting clients resynchronize
/// through the snapshot endpoint, never through event replay.
pub struct MatchBus {
    capacity: usize,
    channels: DashMap<Uuid, broadcast::Sender<ServerEvent>>,
}

impl MatchBus {
    /// Create a bus whose per-match channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: DashMap::new(),
        }
    }

    /// Register a subscriber for `match_id`, creating the channel on demand.
    pub fn subscribe(&self, match_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.channels
            .entry(match_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send an event to every current subscriber of `match_id`.
    ///
    /// A match without subscribers simply drops the event.
    pub fn publish(&self, match_id: Uuid, event: ServerEvent) {
        if let Some(sender) = self.channels.get(&match_id) {
            let _ = sender.send(event);
        }
    }

    /// Drop the channel for `match_id` once its last subscriber is gone.
    pub fn prune(&self, match_id: Uuid) {
        self.channels
            .remove_if(&match_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Number of live subscribers for `match_id`.
    pub fn subscriber_count(&self, match_id: Uuid) -> usize {
        self.channels
            .get(&match_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_only_reach_the_matching_channel() {
        let bus = MatchBus::new(8);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut rx_first = bus.subscribe(first);
        let mut rx_second = bus.subscribe(second);

        bus.publish(first, ServerEvent::new(Some("ping".into()), "{}".into()));

        let event = rx_first.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("ping"));
        assert!(rx_second.try_recv().is_err());
    }

    #[tokio::test]
    async fn prune_only_removes_idle_channels() {
        let bus = MatchBus::new(8);
        let match_id = Uuid::new_v4();

        let rx = bus.subscribe(match_id);
        bus.prune(match_id);
        assert_eq!(bus.subscriber_count(match_id), 1);

        drop(rx);
        bus.prune(match_id);
        assert_eq!(bus.subscriber_count(match_id), 0);
    }
}
