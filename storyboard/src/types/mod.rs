//! Core types for the story board

mod activity;
mod column;
mod ids;
mod ordinal;
mod story;

// Re-export all types
pub use activity::Activity;
pub use column::ColumnDef;
pub use ids::{ColumnId, NoteId, StoryId, StoryKey, TaskId, UserId};
pub use ordinal::Ordinal;
pub use story::{
    Note, Notice, SaveStatus, Story, StoryField, StoryRecord, StoryState, StoryType, Task,
};
