//! Story board ordering and workflow engine
//!
//! This crate keeps a shared, ordered set of stories consistent across
//! workflow columns while several people reorder, move and transition them,
//! synchronizing with an authoritative store through request/response calls
//! only.
//!
//! ## Overview
//!
//! - **One global order** - Stories carry fractional [`Ordinal`]s; a column
//!   is the global order filtered by column
//! - **Drops resolve against model state** - [`ordering::resolve`] picks the
//!   anchor story, searching neighbouring columns when the target is empty
//! - **State follows column, column follows state** - [`WorkflowStateMachine`]
//!   owns the mapping, confirmation gating and acceptance timestamps
//! - **Optimistic saves** - [`SyncCoordinator`] applies locally, persists, and
//!   leaves a failed change applied pending retry
//! - **Remote changes are highlighted** - [`ChangeNotifier`] flashes stories
//!   changed elsewhere, never the user's own edits
//! - **Per-story history** - [`ActivityLog`] renders the store's audit trail
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storyboard::{
//!     AlwaysConfirm, BoardConfig, BoardContext, BoardModel, DropTarget, SyncCoordinator,
//!     Transition,
//! };
//! use tokio::sync::RwLock;
//!
//! # async fn example(store: Arc<dyn storyboard::StoryStore>) -> storyboard::Result<()> {
//! let ctx = BoardContext::new(BoardConfig::load(None)?);
//! let board = Arc::new(RwLock::new(BoardModel::new(ctx)));
//! let sync = SyncCoordinator::new(board.clone(), store, Arc::new(AlwaysConfirm));
//! sync.load().await?;
//!
//! let key = board.read().await.stories()[0].key.clone();
//! sync.drop_story(&key, &DropTarget::new("in_progress", 0)).await?;
//! sync.transition(&key, Transition::Start).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! The board is shared as `Arc<tokio::sync::RwLock<BoardModel>>`. The lock is
//! never held across a store call, so saves for different stories overlap,
//! while a second save for the same story is refused until the first one
//! settles.

pub mod activity_log;
pub mod board;
mod clock;
pub mod config;
mod context;
mod error;
pub mod events;
pub mod notifier;
pub mod ordering;
pub mod store;
pub mod sync;
pub mod types;
pub mod workflow;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use activity_log::{
    ActivityLabels, ActivityLog, AttributeChange, HistoryEntry, HistoryPanel, HumanizedLabels,
    UserDirectory,
};
pub use board::{BoardModel, DropTarget, Iteration, MergeSummary, StoryEdit};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BoardConfig;
pub use context::BoardContext;
pub use error::{BoardError, Result};
pub use events::{BoardEvent, ChangeOrigin, EventBus};
pub use notifier::{ChangeNotifier, HighlightDecision, HighlightSink, NotifierHandle};
pub use ordering::{DropContext, OrderingInstruction};
pub use store::{FieldErrors, StoreError, StoreResult, StoryStore};
pub use sync::{SaveOutcome, SyncCoordinator};
pub use workflow::{
    AlwaysConfirm, ConfirmRequest, Confirmation, Gate, StandardRules, Transition, TransitionPlan,
    TransitionRules, WorkflowStateMachine,
};

// Re-export commonly used types
pub use types::{
    Activity, ColumnDef, ColumnId, Note, NoteId, Notice, Ordinal, SaveStatus, Story, StoryField,
    StoryId, StoryKey, StoryRecord, StoryState, StoryType, Task, TaskId, UserId,
};
