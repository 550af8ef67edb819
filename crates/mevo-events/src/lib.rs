//! Structured event channel for the Mevo map sync.
//!
//! Every outcome the pipeline produces -- feed failures, empty feeds, source
//! registrations, icon arrivals, stale teardown -- is published here as a
//! [`SyncEvent`] in addition to being logged. Tests and telemetry consumers
//! subscribe to the [`EventBus`] instead of parsing log text.

use chrono::{DateTime, Utc};
use mevo_types::{CycleId, FeedType};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default capacity of the event broadcast channel.
///
/// A subscriber that falls behind by more than this many events receives
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Pipeline stage at which a feed failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStage {
    /// The HTTP fetch failed.
    Fetch,
    /// The envelope could not be parsed.
    Parse,
}

/// One observable pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    /// An orchestrated cycle began.
    CycleStarted {
        /// The cycle.
        cycle: CycleId,
        /// Feeds the cycle will run, in order.
        feeds: Vec<FeedType>,
    },
    /// An orchestrated cycle finished.
    CycleFinished {
        /// The cycle.
        cycle: CycleId,
        /// Feeds that produced a populated collection.
        populated: usize,
        /// Feeds that failed to fetch or parse.
        failed: usize,
    },
    /// A feed could not be fetched or parsed.
    FeedFailed {
        /// The feed.
        feed: FeedType,
        /// Where it failed.
        stage: FeedStage,
        /// Display form of the error.
        reason: String,
    },
    /// A feed returned an explicitly empty feature collection.
    FeedEmpty {
        /// The feed.
        feed: FeedType,
    },
    /// A feed's collection had no `features` member.
    FeedAbsent {
        /// The feed.
        feed: FeedType,
    },
    /// A feed returned entities and reconciliation started.
    FeedPopulated {
        /// The feed.
        feed: FeedType,
        /// Number of features in the collection.
        entities: usize,
    },
    /// A geometry source was registered or updated.
    SourceRegistered {
        /// The feed.
        feed: FeedType,
        /// The source id.
        source_id: String,
        /// True when an existing source was updated in place.
        updated: bool,
    },
    /// An entity was skipped; its siblings continue.
    EntityRejected {
        /// The feed.
        feed: FeedType,
        /// Ordinal position in the feed.
        index: usize,
        /// Display form of the reason.
        reason: String,
    },
    /// A point entity had no icon URL, so no layer is created for it.
    IconSkipped {
        /// The feed.
        feed: FeedType,
        /// The entity's source id.
        source_id: String,
    },
    /// An icon fetch was started.
    IconDispatched {
        /// The feed.
        feed: FeedType,
        /// Image id the icon will be registered under.
        image_id: String,
        /// The icon URL.
        url: String,
    },
    /// An icon arrived and its image and symbol layer were registered.
    IconAttached {
        /// The feed.
        feed: FeedType,
        /// The image id.
        image_id: String,
        /// The symbol layer id.
        layer_id: String,
    },
    /// An icon fetch yielded nothing; the entity has no visible layer.
    IconMissing {
        /// The feed.
        feed: FeedType,
        /// The image id that was not registered.
        image_id: String,
        /// The icon URL.
        url: String,
    },
    /// An icon arrived for a superseded cycle and was dropped.
    IconDiscarded {
        /// The feed.
        feed: FeedType,
        /// The image id.
        image_id: String,
        /// Generation the fetch belonged to.
        generation: u64,
    },
    /// Icon or layer registration failed after the icon arrived.
    IconRejected {
        /// The feed.
        feed: FeedType,
        /// The image id.
        image_id: String,
        /// Display form of the error.
        reason: String,
    },
    /// Outstanding icon fetches from the previous cycle were aborted.
    IconFetchesCancelled {
        /// The feed.
        feed: FeedType,
        /// Number of tasks aborted.
        count: usize,
    },
    /// An outline layer was registered for a line or polygon entity.
    OutlineAttached {
        /// The feed.
        feed: FeedType,
        /// The line layer id.
        layer_id: String,
    },
    /// All primitives of an entity that left the feed were removed.
    EntityRemoved {
        /// The feed.
        feed: FeedType,
        /// The removed source id.
        source_id: String,
    },
}

/// A [`SyncEvent`] stamped with its publication time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// When the event was published.
    pub at: DateTime<Utc>,
    /// The event.
    #[serde(flatten)]
    pub event: SyncEvent,
}

/// Broadcast channel for [`SyncEvent`]s.
///
/// Cloning the bus shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with the given channel capacity (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Publish an event.
    ///
    /// Returns the number of receivers that got it; 0 when nobody is
    /// subscribed, which is not an error.
    pub fn publish(&self, event: SyncEvent) -> usize {
        let envelope = EventEnvelope {
            at: Utc::now(),
            event,
        };
        self.tx.send(envelope).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain every event currently buffered in `rx` without waiting.
///
/// Lagged gaps are skipped. Intended for tests and diagnostics that inspect
/// what a finished operation published.
pub fn drain(rx: &mut broadcast::Receiver<EventEnvelope>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(envelope) => events.push(envelope.event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(SyncEvent::FeedEmpty { feed: FeedType::Parking }), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(SyncEvent::FeedEmpty { feed: FeedType::Vehicle });
        bus.publish(SyncEvent::FeedAbsent { feed: FeedType::Parking });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, SyncEvent::FeedEmpty { feed: FeedType::Vehicle });
        assert_eq!(
            drain(&mut rx),
            vec![SyncEvent::FeedAbsent { feed: FeedType::Parking }]
        );
    }

    #[test]
    fn drain_skips_lagged_gap() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(SyncEvent::FeedEmpty { feed: FeedType::Vehicle });
        }
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn envelope_serializes_flat_with_kind_tag() {
        let envelope = EventEnvelope {
            at: Utc::now(),
            event: SyncEvent::FeedFailed {
                feed: FeedType::Vehicle,
                stage: FeedStage::Fetch,
                reason: "HTTP 500".to_owned(),
            },
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["kind"], "feed_failed");
        assert_eq!(value["feed"], "vehicle");
        assert_eq!(value["stage"], "fetch");
        assert!(value.get("at").is_some());
    }
}
