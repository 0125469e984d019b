//! Typed board events and their broadcast channel.
//!
//! Views and the [`ChangeNotifier`](crate::ChangeNotifier) take a receiver
//! from [`EventBus::subscribe`]; dropping the receiver unsubscribes. Events
//! are queued per receiver, so consumers handle them after the board lock
//! is released.

use crate::store::FieldErrors;
use crate::types::{Notice, StoryField, StoryKey};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Events buffered per receiver before it starts lagging
const EVENT_CAPACITY: usize = 256;

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Optimistic mutation made by this client
    Local,
    /// Value delivered by the store (refresh, save response, re-fetch)
    Remote,
}

/// Something that happened on the board
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoardEvent {
    /// The whole story set was replaced
    Reset,
    StoryAdded {
        story: StoryKey,
    },
    StoryRemoved {
        story: StoryKey,
    },
    /// One attribute changed
    StoryChanged {
        story: StoryKey,
        field: StoryField,
        origin: ChangeOrigin,
        /// Whether the story was open for editing when the change landed
        editing: bool,
    },
    /// Emitted once after a batch of `StoryChanged` for the same story
    AnyChanged {
        story: StoryKey,
    },
    /// The global order changed
    Reordered {
        story: StoryKey,
    },
    SaveStarted {
        story: StoryKey,
    },
    SaveSucceeded {
        story: StoryKey,
    },
    SaveFailed {
        story: StoryKey,
        notice: Notice,
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<FieldErrors>,
    },
}

impl BoardEvent {
    /// The story this event concerns, if any
    pub fn story(&self) -> Option<&StoryKey> {
        match self {
            Self::Reset => None,
            Self::StoryAdded { story }
            | Self::StoryRemoved { story }
            | Self::StoryChanged { story, .. }
            | Self::AnyChanged { story }
            | Self::Reordered { story }
            | Self::SaveStarted { story }
            | Self::SaveSucceeded { story }
            | Self::SaveFailed { story, .. } => Some(story),
        }
    }
}

/// Sender side of the board's event stream
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BoardEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn emit(&self, event: BoardEvent) {
        trace!(?event, "emit");
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let key = StoryKey::new();

        bus.emit(BoardEvent::Reset);
        bus.emit(BoardEvent::StoryAdded { story: key.clone() });

        assert_eq!(rx.try_recv().unwrap(), BoardEvent::Reset);
        assert_eq!(rx.try_recv().unwrap(), BoardEvent::StoryAdded { story: key });
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_dropping_receiver_unsubscribes() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
        // Emitting without receivers is not an error
        bus.emit(BoardEvent::Reset);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.emit(BoardEvent::Reset);
        let mut rx = bus.subscribe();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_event_story_accessor() {
        let key = StoryKey::new();
        let event = BoardEvent::SaveSucceeded { story: key.clone() };
        assert_eq!(event.story(), Some(&key));
        assert_eq!(BoardEvent::Reset.story(), None);
    }
}
