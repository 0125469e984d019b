//! Story types: Story, StoryRecord, Note, Task

use super::ids::{ColumnId, NoteId, StoryId, StoryKey, TaskId, UserId};
use super::ordinal::{self, Ordinal};
use crate::store::FieldErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of work a story represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryType {
    #[default]
    Feature,
    Chore,
    Bug,
    Release,
}

impl StoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Chore => "chore",
            Self::Bug => "bug",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for StoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow state of a story
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryState {
    #[default]
    Unscheduled,
    Unstarted,
    Started,
    Finished,
    Delivered,
    Accepted,
    Rejected,
}

impl StoryState {
    pub const ALL: [StoryState; 7] = [
        Self::Unscheduled,
        Self::Unstarted,
        Self::Started,
        Self::Finished,
        Self::Delivered,
        Self::Accepted,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unscheduled => "unscheduled",
            Self::Unstarted => "unstarted",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Delivered => "delivered",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the state counts towards an iteration
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Unscheduled | Self::Unstarted)
    }
}

impl fmt::Display for StoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of a story that raise change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryField {
    Title,
    Description,
    StoryType,
    State,
    Column,
    Position,
    Estimate,
    AcceptedAt,
    Labels,
    Owner,
    Requester,
    Notes,
    Tasks,
}

impl StoryField {
    /// Fields whose external change is worth drawing the user's eye to
    pub fn is_highlighted(&self) -> bool {
        matches!(
            self,
            Self::Title
                | Self::Description
                | Self::Column
                | Self::State
                | Self::Position
                | Self::Estimate
                | Self::StoryType
        )
    }
}

/// A comment on a story
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    #[serde(default)]
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

/// A checklist item on a story
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
}

impl Task {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

/// Story as exchanged with the store.
///
/// Unknown fields are ignored so the store's schema can grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StoryId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub story_type: StoryType,
    #[serde(default)]
    pub state: StoryState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnId>,
    #[serde(
        default,
        deserialize_with = "ordinal::lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Ordinal>,
    #[serde(default)]
    pub estimate: Option<u32>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requested_by_id: Option<UserId>,
    #[serde(default)]
    pub owned_by_id: Option<UserId>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
}

impl StoryRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<StoryId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_state(mut self, state: StoryState) -> Self {
        self.state = state;
        self
    }

    pub fn with_type(mut self, story_type: StoryType) -> Self {
        self.story_type = story_type;
        self
    }

    pub fn with_estimate(mut self, estimate: u32) -> Self {
        self.estimate = Some(estimate);
        self
    }

    pub fn with_position(mut self, position: Ordinal) -> Self {
        self.position = Some(position);
        self
    }
}

/// Outcome of the most recent save, as seen by the board
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    /// A persist call is outstanding; controls are disabled
    InProgress,
    /// The last save failed; the local value is left applied pending retry
    Failed { notice: Notice },
}

/// User-visible, dismissible message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub text: String,
}

impl Notice {
    pub fn save_error(text: impl Into<String>) -> Self {
        Self {
            title: "Save error".into(),
            text: text.into(),
        }
    }
}

/// A work item on the board
#[derive(Debug, Clone)]
pub struct Story {
    pub key: StoryKey,
    pub id: Option<StoryId>,
    pub title: String,
    pub description: String,
    pub story_type: StoryType,
    pub state: StoryState,
    /// Column the story is displayed in
    pub column: ColumnId,
    /// Position in the board's global order
    pub ordinal: Ordinal,
    pub estimate: Option<u32>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub requested_by_id: Option<UserId>,
    pub owned_by_id: Option<UserId>,
    pub labels: BTreeSet<String>,
    pub notes: Vec<Note>,
    pub tasks: Vec<Task>,
    /// Open in the edit form. Never persisted.
    pub editing: bool,
    /// Field errors from the last rejected save
    pub errors: Option<FieldErrors>,
    pub save: SaveStatus,
}

impl Story {
    /// Create an unsaved draft
    pub fn draft(column: ColumnId, ordinal: Ordinal) -> Self {
        Self::from_record(StoryRecord::default(), column, ordinal)
    }

    /// Build a board story from a store record
    pub fn from_record(record: StoryRecord, column: ColumnId, ordinal: Ordinal) -> Self {
        Self {
            key: StoryKey::new(),
            id: record.id,
            title: record.title,
            description: record.description,
            story_type: record.story_type,
            state: record.state,
            column,
            ordinal,
            estimate: record.estimate,
            accepted_at: record.accepted_at,
            requested_by_id: record.requested_by_id,
            owned_by_id: record.owned_by_id,
            labels: record.labels,
            notes: record.notes,
            tasks: record.tasks,
            editing: false,
            errors: None,
            save: SaveStatus::Idle,
        }
    }

    /// The record sent to the store. Trailing drafts are not persisted.
    pub fn to_record(&self) -> StoryRecord {
        StoryRecord {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            story_type: self.story_type,
            state: self.state,
            column: Some(self.column.clone()),
            position: Some(self.ordinal.clone()),
            estimate: self.estimate,
            accepted_at: self.accepted_at,
            requested_by_id: self.requested_by_id,
            owned_by_id: self.owned_by_id,
            labels: self.labels.clone(),
            notes: self.notes.iter().filter(|n| !n.is_new()).cloned().collect(),
            tasks: self.tasks.iter().filter(|t| !t.is_new()).cloned().collect(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Only features carry estimates
    pub fn is_estimable(&self) -> bool {
        self.story_type == StoryType::Feature
    }

    pub fn is_estimated(&self) -> bool {
        self.estimate.is_some()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.is_some()
    }

    pub fn save_in_progress(&self) -> bool {
        self.save == SaveStatus::InProgress
    }

    /// Points this story contributes to an iteration
    pub fn points(&self) -> u32 {
        if self.is_estimable() {
            self.estimate.unwrap_or(0)
        } else {
            0
        }
    }

    /// Stamp `accepted_at` when the story is accepted and not yet stamped.
    /// Returns true if the timestamp was set.
    pub fn set_accepted_at(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == StoryState::Accepted && self.accepted_at.is_none() {
            self.accepted_at = Some(now);
            return true;
        }
        false
    }

    /// Keep one trailing unsaved note and task on persisted, writable stories
    pub fn ensure_drafts(&mut self, read_only: bool) {
        if self.is_new() || read_only {
            return;
        }
        if !self.notes.last().is_some_and(Note::is_new) {
            self.notes.push(Note::default());
        }
        if !self.tasks.last().is_some_and(Task::is_new) {
            self.tasks.push(Task::default());
        }
    }

    /// Fields whose values differ from `record`, ignoring column and position
    pub fn differing_fields(&self, record: &StoryRecord) -> Vec<StoryField> {
        let mut fields = Vec::new();
        if self.title != record.title {
            fields.push(StoryField::Title);
        }
        if self.description != record.description {
            fields.push(StoryField::Description);
        }
        if self.story_type != record.story_type {
            fields.push(StoryField::StoryType);
        }
        if self.state != record.state {
            fields.push(StoryField::State);
        }
        if self.estimate != record.estimate {
            fields.push(StoryField::Estimate);
        }
        if self.accepted_at != record.accepted_at {
            fields.push(StoryField::AcceptedAt);
        }
        if self.labels != record.labels {
            fields.push(StoryField::Labels);
        }
        if self.owned_by_id != record.owned_by_id {
            fields.push(StoryField::Owner);
        }
        if self.requested_by_id != record.requested_by_id {
            fields.push(StoryField::Requester);
        }
        let saved_notes: Vec<&Note> = self.notes.iter().filter(|n| !n.is_new()).collect();
        if saved_notes != record.notes.iter().collect::<Vec<_>>() {
            fields.push(StoryField::Notes);
        }
        let saved_tasks: Vec<&Task> = self.tasks.iter().filter(|t| !t.is_new()).collect();
        if saved_tasks != record.tasks.iter().collect::<Vec<_>>() {
            fields.push(StoryField::Tasks);
        }
        fields
    }

    /// Copy the non-positional attributes of `record` onto this story
    pub fn absorb(&mut self, record: StoryRecord) {
        if record.id.is_some() {
            self.id = record.id;
        }
        self.title = record.title;
        self.description = record.description;
        self.story_type = record.story_type;
        self.state = record.state;
        self.estimate = record.estimate;
        self.accepted_at = record.accepted_at;
        self.requested_by_id = record.requested_by_id;
        self.owned_by_id = record.owned_by_id;
        self.labels = record.labels;
        self.notes = record.notes;
        self.tasks = record.tasks;
    }
}
