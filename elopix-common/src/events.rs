//! Event types for the EloPix event system
//!
//! Provides shared event definitions and the EventBus used to push
//! presentation updates (pairs, ratings, progress) to connected UIs.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Item state carried inside events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Item identity
    pub id: String,
    /// Current rating
    pub rating: f64,
    /// Number of comparisons the item took part in
    pub compared: u64,
}

/// EloPix event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RankEvent {
    /// A new comparison pair is on screen
    PairPresented {
        pair_id: Uuid,
        left: ItemSnapshot,
        right: ItemSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A decision was recorded and ratings moved
    OutcomeRecorded {
        pair_id: Uuid,
        winner: ItemSnapshot,
        loser: ItemSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An item was permanently excluded from selection
    ItemBlacklisted {
        item_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session progress counters
    ProgressUpdated {
        /// Items in the current catalog
        total_items: usize,
        /// Catalog items never compared
        unrated_items: usize,
        /// Decisions recorded this session
        comparisons: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ratings and blacklist were written to disk
    RatingsSaved {
        items: usize,
        blacklisted: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RankEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RankEvent::PairPresented { .. } => "PairPresented",
            RankEvent::OutcomeRecorded { .. } => "OutcomeRecorded",
            RankEvent::ItemBlacklisted { .. } => "ItemBlacklisted",
            RankEvent::ProgressUpdated { .. } => "ProgressUpdated",
            RankEvent::RatingsSaved { .. } => "RatingsSaved",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RankEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RankEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: RankEvent) -> Result<usize, broadcast::error::SendError<RankEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RankEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(RankEvent::ItemBlacklisted {
            item_id: "cat.png".to_string(),
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            RankEvent::ItemBlacklisted { item_id, .. } => assert_eq!(item_id, "cat.png"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        let event = RankEvent::ProgressUpdated {
            total_items: 3,
            unrated_items: 3,
            comparisons: 0,
            timestamp: chrono::Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = RankEvent::RatingsSaved {
            items: 2,
            blacklisted: 1,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RatingsSaved");
        assert_eq!(json["items"], 2);
        assert_eq!(event.event_type(), "RatingsSaved");
    }
}
