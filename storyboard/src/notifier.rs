//! ChangeNotifier - highlights stories changed by someone else
//!
//! Highlighting is cosmetic. A story that is open for editing, a change made
//! by this client, or a view that is not visible all skip the highlight
//! without raising anything.

use crate::board::BoardModel;
use crate::events::{BoardEvent, ChangeOrigin};
use crate::types::{Story, StoryKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// The rendering side of a highlight
pub trait HighlightSink: Send + Sync {
    /// Whether any view of the story is currently on screen
    fn is_visible(&self, story: &StoryKey) -> bool;

    /// Flash the story's views for `duration`
    fn highlight(&self, story: &StoryKey, duration: Duration);
}

/// What the notifier did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightDecision {
    Highlighted,
    /// The story is open in the edit form
    SuppressedEditing,
    /// The change came from this client
    SuppressedLocal,
    NotVisible,
    /// Not a change worth highlighting
    Ignored,
}

/// Decides whether a board change gets highlighted
#[derive(Clone)]
pub struct ChangeNotifier {
    sink: Arc<dyn HighlightSink>,
    duration: Duration,
}

impl ChangeNotifier {
    pub fn new(sink: Arc<dyn HighlightSink>, duration: Duration) -> Self {
        Self { sink, duration }
    }

    /// Notifier using the board's configured highlight duration
    pub fn for_board(board: &BoardModel, sink: Arc<dyn HighlightSink>) -> Self {
        Self::new(sink, board.context().config.highlight_duration())
    }

    /// Follow `board`'s events on a background task.
    ///
    /// Must be called within a tokio runtime. The subscription ends when the
    /// returned handle is detached or dropped.
    pub fn attach(&self, board: &BoardModel) -> NotifierHandle {
        let notifier = self.clone();
        let mut events = board.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        notifier.observe(&event);
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "change notifier lagged, highlights dropped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("board event stream closed");
                        break;
                    }
                }
            }
        });
        NotifierHandle { task }
    }

    /// Handle every event already queued on `events` without waiting
    pub fn drain(&self, events: &mut broadcast::Receiver<BoardEvent>) -> Vec<HighlightDecision> {
        let mut decisions = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => decisions.push(self.observe(&event)),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "change notifier lagged, highlights dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        decisions
    }

    pub fn observe(&self, event: &BoardEvent) -> HighlightDecision {
        let BoardEvent::StoryChanged {
            story,
            field,
            origin,
            editing,
        } = event
        else {
            return HighlightDecision::Ignored;
        };
        if !field.is_highlighted() {
            return HighlightDecision::Ignored;
        }
        if *origin == ChangeOrigin::Local {
            trace!(%story, ?field, "own change, no highlight");
            return HighlightDecision::SuppressedLocal;
        }
        if *editing {
            debug!(%story, ?field, "story is being edited, highlight suppressed");
            return HighlightDecision::SuppressedEditing;
        }
        self.flash(story)
    }

    /// Highlight every visible view of a story, e.g. when a link to it is clicked
    pub fn highlight_linked(&self, story: &Story) -> HighlightDecision {
        if story.editing {
            return HighlightDecision::SuppressedEditing;
        }
        self.flash(&story.key)
    }

    fn flash(&self, story: &StoryKey) -> HighlightDecision {
        if !self.sink.is_visible(story) {
            trace!(%story, "not visible, highlight skipped");
            return HighlightDecision::NotVisible;
        }
        self.sink.highlight(story, self.duration);
        HighlightDecision::Highlighted
    }
}

/// A running [`ChangeNotifier`] subscription
#[derive(Debug)]
pub struct NotifierHandle {
    task: JoinHandle<()>,
}

impl NotifierHandle {
    /// Stop highlighting; same as dropping the handle
    pub fn detach(self) {
        debug!("change notifier detached");
    }

    pub fn is_attached(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for NotifierHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}
