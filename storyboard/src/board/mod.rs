//! BoardModel - the ordered story set
//!
//! The board is the only writer of story ordinals and column membership. All
//! reordering, state changes and merges go through it so the global order and
//! the columns stay consistent with each other.
//!
//! Stories are held in global order (ascending [`Ordinal`]). A column's order
//! is the global order filtered by column.

mod iterations;

pub use iterations::Iteration;

use crate::context::BoardContext;
use crate::error::{BoardError, Result};
use crate::events::{BoardEvent, ChangeOrigin, EventBus};
use crate::ordering::{self, DropContext, OrderingInstruction};
use crate::store::{FieldErrors, StoreError};
use crate::types::{
    ColumnId, Notice, Ordinal, SaveStatus, Story, StoryField, StoryId, StoryKey, StoryRecord,
    StoryState, StoryType, UserId,
};
use crate::workflow::{TransitionPlan, WorkflowStateMachine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Drop position expressed against the board: index within the target column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    pub column: ColumnId,
    /// Position among the column's other stories; clamped to the column length
    pub index: usize,
}

impl DropTarget {
    pub fn new(column: impl Into<ColumnId>, index: usize) -> Self {
        Self {
            column: column.into(),
            index,
        }
    }
}

/// Attribute changes from the edit form. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub story_type: Option<StoryType>,
    pub state: Option<StoryState>,
    pub estimate: Option<Option<u32>>,
    pub labels: Option<BTreeSet<String>>,
    pub owned_by_id: Option<Option<UserId>>,
    pub requested_by_id: Option<Option<UserId>>,
}

impl StoryEdit {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn state(mut self, state: StoryState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn estimate(mut self, estimate: Option<u32>) -> Self {
        self.estimate = Some(estimate);
        self
    }
}

/// What a refresh changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Stories left alone because a save was in flight
    pub skipped: usize,
}

/// The board aggregate
#[derive(Debug)]
pub struct BoardModel {
    ctx: BoardContext,
    workflow: WorkflowStateMachine,
    stories: Vec<Story>,
    events: EventBus,
    iterations: Vec<Iteration>,
}

impl BoardModel {
    pub fn new(ctx: BoardContext) -> Self {
        let workflow = WorkflowStateMachine::new(&ctx);
        Self {
            ctx,
            workflow,
            stories: Vec::new(),
            events: EventBus::new(),
            iterations: Vec::new(),
        }
    }

    pub fn context(&self) -> &BoardContext {
        &self.ctx
    }

    pub fn workflow(&self) -> &WorkflowStateMachine {
        &self.workflow
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Receive board events; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All stories in global order
    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn get(&self, key: &StoryKey) -> Option<&Story> {
        self.stories.iter().find(|s| &s.key == key)
    }

    pub fn story(&self, key: &StoryKey) -> Result<&Story> {
        self.get(key).ok_or_else(|| BoardError::story_not_found(key))
    }

    pub fn find_by_id(&self, id: StoryId) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == Some(id))
    }

    /// Stories of one column, in column order
    pub fn column(&self, column: &ColumnId) -> Vec<&Story> {
        self.stories.iter().filter(|s| &s.column == column).collect()
    }

    /// The stories directly above and below `key` in its column
    pub fn neighbours(&self, key: &StoryKey) -> Result<(Option<&Story>, Option<&Story>)> {
        let story = self.story(key)?;
        let column = self.column(&story.column);
        let pos = column
            .iter()
            .position(|s| &s.key == key)
            .ok_or_else(|| BoardError::story_not_found(key))?;
        let previous = pos.checked_sub(1).and_then(|i| column.get(i).copied());
        Ok((previous, column.get(pos + 1).copied()))
    }

    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    /// Regroup stories into iterations using the board clock
    pub fn rebuild_iterations(&mut self) -> &[Iteration] {
        self.iterations = iterations::build(&self.stories, &self.workflow);
        &self.iterations
    }

    /// Check the global order and column membership.
    ///
    /// Every story must have a unique key, a unique server id if it has one, a
    /// configured column and an ordinal strictly greater than its predecessor's.
    pub fn verify_order(&self) -> Result<()> {
        let mut keys = HashSet::new();
        let mut ids = HashSet::new();
        for (i, story) in self.stories.iter().enumerate() {
            if !keys.insert(&story.key) {
                return Err(BoardError::ordering(format!("duplicate story key {}", story.key)));
            }
            if let Some(id) = story.id {
                if !ids.insert(id) {
                    return Err(BoardError::ordering(format!("duplicate story id {}", id)));
                }
            }
            if self.ctx.config.column(&story.column).is_none() {
                return Err(BoardError::ordering(format!(
                    "story {} is in unknown column {}",
                    story.key, story.column
                )));
            }
            if let Some(previous) = i.checked_sub(1).map(|p| &self.stories[p]) {
                if previous.ordinal >= story.ordinal {
                    return Err(BoardError::ordering(format!(
                        "story {} ({}) is not after {} ({})",
                        story.key, story.ordinal, previous.key, previous.ordinal
                    )));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Loading and membership
    // =========================================================================

    /// Replace the board with the store's stories, in the store's order.
    ///
    /// Positions that are missing or out of order are reassigned so the
    /// global order matches the order received.
    pub fn load(&mut self, records: Vec<StoryRecord>) {
        let read_only = self.ctx.config.read_only;
        let mut previous: Option<Ordinal> = None;
        let mut stories = Vec::with_capacity(records.len());

        for mut record in records {
            let ordinal = match (record.position.take(), &previous) {
                (Some(p), Some(prev)) if p > *prev => p,
                (Some(p), None) => p,
                (_, Some(prev)) => Ordinal::after(prev),
                (None, None) => Ordinal::first(),
            };
            let column = self.column_for_record(&record);
            let mut story = Story::from_record(record, column, ordinal.clone());
            story.ensure_drafts(read_only);
            stories.push(story);
            previous = Some(ordinal);
        }

        info!(stories = stories.len(), "board loaded");
        self.stories = stories;
        self.rebuild_iterations();
        self.events.emit(BoardEvent::Reset);
    }

    /// Add an unsaved draft at the top of the chilly bin, open for editing
    pub fn add_draft(&mut self) -> Result<StoryKey> {
        if self.ctx.config.read_only {
            return Err(BoardError::ReadOnly);
        }
        let column = ColumnId::chilly_bin();
        let ordinal = match self.stories.iter().position(|s| s.column == column) {
            Some(head) => self.ordinal_before(head, None),
            None => self.ordinal_at_end(None),
        };
        let mut story = Story::draft(column, ordinal);
        story.editing = true;
        let key = story.key.clone();
        debug!(story = %key, "draft added");
        self.insert_sorted(story);
        self.events.emit(BoardEvent::StoryAdded { story: key.clone() });
        Ok(key)
    }

    pub fn remove(&mut self, key: &StoryKey) -> Result<Story> {
        let index = self.index_of(key)?;
        let story = self.stories.remove(index);
        debug!(story = %key, "story removed");
        self.events.emit(BoardEvent::StoryRemoved { story: key.clone() });
        Ok(story)
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    /// Neighbours at a drop position, excluding the dragged story
    pub fn drop_context(&self, key: &StoryKey, target: &DropTarget) -> Result<DropContext> {
        let others: Vec<&Story> = self
            .stories
            .iter()
            .filter(|s| s.column == target.column && &s.key != key)
            .collect();
        let index = target.index.min(others.len());
        Ok(DropContext {
            story: key.clone(),
            previous: index
                .checked_sub(1)
                .and_then(|i| others.get(i))
                .map(|s| s.key.clone()),
            next: others.get(index).map(|s| s.key.clone()),
            column: target.column.clone(),
        })
    }

    /// Apply a drop locally: state forcing, column change and reordering.
    ///
    /// Nothing changes if the drop is rejected or cannot be resolved.
    pub fn apply_drop(&mut self, key: &StoryKey, target: &DropTarget) -> Result<OrderingInstruction> {
        if self.ctx.config.read_only {
            return Err(BoardError::ReadOnly);
        }
        let accepts_drops = self
            .ctx
            .config
            .column(&target.column)
            .map(|c| c.accepts_drops)
            .ok_or_else(|| BoardError::ColumnNotFound {
                id: target.column.to_string(),
            })?;
        let story = self.story(key)?;
        if story.editing {
            return Err(BoardError::StoryEditing {
                key: key.to_string(),
            });
        }
        if story.save_in_progress() {
            return Err(BoardError::SaveInProgress {
                key: key.to_string(),
            });
        }
        let current_state = story.state;

        let drop = self.drop_context(key, target)?;
        if drop.previous.is_none() && drop.next.is_none() && !accepts_drops {
            warn!(story = %key, column = %target.column, "drop into empty column that does not receive drops");
        }
        let instruction = ordering::resolve(&drop, &self.ctx.config, &self.stories)?;

        let mut changed = Vec::new();
        if let Some(state) = ordering::forced_state(&target.column, current_state) {
            debug!(story = %key, from = %current_state, to = %state, "drop forces state");
            self.story_mut(key)?.state = state;
            changed.push(StoryField::State);
        }
        let story = self.story_mut(key)?;
        if story.column != target.column {
            story.column = target.column.clone();
            changed.push(StoryField::Column);
        }

        let moved = self.apply_instruction(key, &instruction)?;
        if moved {
            changed.push(StoryField::Position);
        }
        self.emit_changes(key, &changed, ChangeOrigin::Local);
        if moved {
            self.events.emit(BoardEvent::Reordered { story: key.clone() });
        }
        Ok(instruction)
    }

    /// Place `key` directly after `anchor` in the global order
    pub fn move_after(&mut self, key: &StoryKey, anchor: &StoryKey) -> Result<()> {
        let index = self.index_excluding(anchor, key)?;
        let ordinal = self.ordinal_after(index, Some(key));
        self.reposition(key, ordinal)
    }

    /// Place `key` directly before `anchor` in the global order
    pub fn move_before(&mut self, key: &StoryKey, anchor: &StoryKey) -> Result<()> {
        let index = self.index_excluding(anchor, key)?;
        let ordinal = self.ordinal_before(index, Some(key));
        self.reposition(key, ordinal)
    }

    fn apply_instruction(&mut self, key: &StoryKey, instruction: &OrderingInstruction) -> Result<bool> {
        let before = self.story(key)?.ordinal.clone();
        match instruction {
            OrderingInstruction::MoveAfter(anchor) => self.move_after(key, anchor)?,
            OrderingInstruction::MoveBefore(anchor) => self.move_before(key, anchor)?,
            OrderingInstruction::NoOp => return Ok(false),
        }
        Ok(self.story(key)?.ordinal != before)
    }

    // =========================================================================
    // Attribute changes
    // =========================================================================

    /// Apply a planned workflow transition
    pub fn apply_transition(&mut self, key: &StoryKey, plan: &TransitionPlan) -> Result<()> {
        let story = self.story_mut(key)?;
        let mut changed = Vec::new();
        if story.state != plan.to {
            story.state = plan.to;
            changed.push(StoryField::State);
        }
        if story.accepted_at != plan.accepted_at {
            story.accepted_at = plan.accepted_at;
            changed.push(StoryField::AcceptedAt);
        }
        if story.column != plan.column {
            story.column = plan.column.clone();
            changed.push(StoryField::Column);
        }
        self.emit_changes(key, &changed, ChangeOrigin::Local);
        Ok(())
    }

    pub fn set_estimate(&mut self, key: &StoryKey, estimate: Option<u32>) -> Result<()> {
        self.workflow.validate_estimate(self.story(key)?, estimate)?;
        let story = self.story_mut(key)?;
        if story.estimate != estimate {
            story.estimate = estimate;
            self.emit_changes(key, &[StoryField::Estimate], ChangeOrigin::Local);
        }
        Ok(())
    }

    pub fn set_editing(&mut self, key: &StoryKey, editing: bool) -> Result<()> {
        let story = self.story_mut(key)?;
        if story.editing != editing {
            story.editing = editing;
            self.events.emit(BoardEvent::AnyChanged { story: key.clone() });
        }
        Ok(())
    }

    pub fn set_errors(&mut self, key: &StoryKey, errors: Option<FieldErrors>) -> Result<()> {
        self.story_mut(key)?.errors = errors;
        Ok(())
    }

    /// Apply edit-form values.
    ///
    /// A state change moves the story to the state's column. An accepted
    /// story without an acceptance time is stamped with the board clock. The
    /// estimate is checked against the edited story type.
    pub fn apply_edit(&mut self, key: &StoryKey, edit: StoryEdit) -> Result<Vec<StoryField>> {
        let mut candidate = self.story(key)?.clone();
        let mut changed = Vec::new();

        macro_rules! assign {
            ($field:ident, $kind:expr) => {
                if let Some(value) = edit.$field {
                    if candidate.$field != value {
                        candidate.$field = value;
                        changed.push($kind);
                    }
                }
            };
        }
        assign!(title, StoryField::Title);
        assign!(description, StoryField::Description);
        assign!(story_type, StoryField::StoryType);
        assign!(state, StoryField::State);
        assign!(estimate, StoryField::Estimate);
        assign!(labels, StoryField::Labels);
        assign!(owned_by_id, StoryField::Owner);
        assign!(requested_by_id, StoryField::Requester);

        if changed.contains(&StoryField::Estimate) || changed.contains(&StoryField::StoryType) {
            self.workflow.validate_estimate(&candidate, candidate.estimate)?;
        }
        // Stamped before the column is derived: acceptance in the current
        // iteration keeps the story in progress
        if candidate.set_accepted_at(self.ctx.clock.now()) {
            changed.push(StoryField::AcceptedAt);
        }
        if changed.contains(&StoryField::State) {
            let column = self
                .workflow
                .column_for_state(candidate.state, candidate.accepted_at);
            if candidate.column != column {
                candidate.column = column;
                changed.push(StoryField::Column);
            }
        }

        *self.story_mut(key)? = candidate;
        self.emit_changes(key, &changed, ChangeOrigin::Local);
        Ok(changed)
    }

    // =========================================================================
    // Save bookkeeping
    // =========================================================================

    /// Fail if a save for `key` is still outstanding
    pub fn ensure_idle(&self, key: &StoryKey) -> Result<&Story> {
        let story = self.story(key)?;
        if story.save_in_progress() {
            return Err(BoardError::SaveInProgress {
                key: key.to_string(),
            });
        }
        Ok(story)
    }

    /// Mark a save as in flight and return the record to send
    pub fn begin_save(&mut self, key: &StoryKey) -> Result<StoryRecord> {
        let story = self.story_mut(key)?;
        story.save = SaveStatus::InProgress;
        let record = story.to_record();
        self.events.emit(BoardEvent::SaveStarted { story: key.clone() });
        Ok(record)
    }

    /// Drop any save status, e.g. when the user abandons a failed edit
    pub fn end_save(&mut self, key: &StoryKey) -> Result<()> {
        self.story_mut(key)?.save = SaveStatus::Idle;
        Ok(())
    }

    /// Absorb the store's canonical record after a successful save.
    ///
    /// Column and ordinal stay as the board set them. Any other story already
    /// carrying the assigned id is removed.
    pub fn settle(&mut self, key: &StoryKey, saved: StoryRecord) -> Result<()> {
        // A refresh may already have brought in the story this save created
        let copies: Vec<StoryKey> = match saved.id {
            Some(id) => self
                .stories
                .iter()
                .filter(|s| s.id == Some(id) && &s.key != key)
                .map(|s| s.key.clone())
                .collect(),
            None => Vec::new(),
        };
        for copy in copies {
            debug!(story = %copy, kept = %key, "dropping duplicate of saved story");
            self.remove(&copy)?;
        }

        let read_only = self.ctx.config.read_only;
        let story = self.story_mut(key)?;
        let changed = story.differing_fields(&saved);
        story.absorb(saved);
        story.ensure_drafts(read_only);
        story.errors = None;
        story.save = SaveStatus::Idle;
        self.emit_changes(key, &changed, ChangeOrigin::Remote);
        self.events.emit(BoardEvent::SaveSucceeded { story: key.clone() });
        Ok(())
    }

    /// Record a failed save. The local values stay applied pending retry.
    ///
    /// Validation failures put the story back into edit mode with the field
    /// errors attached.
    pub fn fail_save(&mut self, key: &StoryKey, error: &StoreError) -> Result<Notice> {
        let story = self.story_mut(key)?;
        let errors = error.field_errors().cloned();
        let text = match error {
            StoreError::Validation { errors } => errors.messages(),
            StoreError::Transport { message } => message.clone(),
        };
        let notice = Notice::save_error(text);
        story.save = SaveStatus::Failed {
            notice: notice.clone(),
        };
        if errors.is_some() {
            story.editing = true;
            story.errors = errors.clone();
        }
        self.events.emit(BoardEvent::SaveFailed {
            story: key.clone(),
            notice: notice.clone(),
            errors,
        });
        Ok(notice)
    }

    // =========================================================================
    // Remote merge
    // =========================================================================

    /// Merge one authoritative record into the story at `key`
    pub fn apply_remote(&mut self, key: &StoryKey, record: StoryRecord) -> Result<()> {
        let index = self.index_of(key)?;
        let changed = self.merge_into(index, record);
        self.emit_changes(key, &changed, ChangeOrigin::Remote);
        if changed.contains(&StoryField::Position) {
            self.events.emit(BoardEvent::Reordered { story: key.clone() });
        }
        Ok(())
    }

    /// Merge a full fetch of the board.
    ///
    /// Stories are matched by server id. Unsaved drafts and stories with a
    /// save in flight are left alone. While a draft's first save is in flight,
    /// stories the board does not know yet are deferred to the next refresh.
    pub fn merge_remote(&mut self, records: Vec<StoryRecord>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let incoming: HashSet<StoryId> = records.iter().filter_map(|r| r.id).collect();
        // An unknown id may be the draft being created right now
        let draft_saving = self
            .stories
            .iter()
            .any(|s| s.is_new() && s.save_in_progress());

        let gone: Vec<StoryKey> = self
            .stories
            .iter()
            .filter(|s| s.id.is_some_and(|id| !incoming.contains(&id)))
            .filter(|s| !s.save_in_progress())
            .map(|s| s.key.clone())
            .collect();
        for key in gone {
            if self.remove(&key).is_ok() {
                summary.removed += 1;
            }
        }

        for record in records {
            let Some(id) = record.id else {
                warn!("ignoring store record without id");
                continue;
            };
            match self.find_by_id(id).map(|s| (s.key.clone(), s.save_in_progress())) {
                Some((key, true)) => {
                    debug!(story = %key, "save in flight, not merging");
                    summary.skipped += 1;
                }
                Some((key, false)) => {
                    if self.apply_remote(&key, record).is_ok() {
                        summary.updated += 1;
                    }
                }
                None if draft_saving => {
                    debug!(%id, "draft save in flight, new story deferred");
                    summary.skipped += 1;
                }
                None => {
                    self.add_remote(record);
                    summary.added += 1;
                }
            }
        }

        self.rebuild_iterations();
        info!(
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            skipped = summary.skipped,
            "board refreshed"
        );
        summary
    }

    fn add_remote(&mut self, mut record: StoryRecord) {
        let column = self.column_for_record(&record);
        let ordinal = match record.position.take() {
            Some(p) if !self.stories.iter().any(|s| s.ordinal == p) => p,
            _ => self.ordinal_at_end(None),
        };
        let mut story = Story::from_record(record, column, ordinal);
        story.ensure_drafts(self.ctx.config.read_only);
        let key = story.key.clone();
        self.insert_sorted(story);
        self.events.emit(BoardEvent::StoryAdded { story: key });
    }

    /// Copy `record` onto the story at `index`, returning the changed fields.
    ///
    /// An editing story keeps its column and ordinal.
    fn merge_into(&mut self, index: usize, mut record: StoryRecord) -> Vec<StoryField> {
        let read_only = self.ctx.config.read_only;
        let position = record.position.take();
        let wanted_column = record
            .column
            .take()
            .filter(|c| self.ctx.config.column(c).is_some());

        let story = &mut self.stories[index];
        let mut changed = story.differing_fields(&record);
        story.absorb(record);
        story.ensure_drafts(read_only);
        if story.editing {
            return changed;
        }

        let column = wanted_column.unwrap_or_else(|| {
            if changed.contains(&StoryField::State) {
                self.workflow.column_for_state(story.state, story.accepted_at)
            } else {
                story.column.clone()
            }
        });
        if story.column != column {
            story.column = column;
            changed.push(StoryField::Column);
        }

        if let Some(position) = position {
            let key = story.key.clone();
            let taken = self
                .stories
                .iter()
                .any(|s| s.key != key && s.ordinal == position);
            if self.stories[index].ordinal != position && !taken {
                let mut story = self.stories.remove(index);
                story.ordinal = position;
                self.insert_sorted(story);
                changed.push(StoryField::Position);
            }
        }
        changed
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn column_for_record(&self, record: &StoryRecord) -> ColumnId {
        match &record.column {
            Some(c) if self.ctx.config.column(c).is_some() => c.clone(),
            _ => self
                .workflow
                .column_for_state(record.state, record.accepted_at),
        }
    }

    fn story_mut(&mut self, key: &StoryKey) -> Result<&mut Story> {
        self.stories
            .iter_mut()
            .find(|s| &s.key == key)
            .ok_or_else(|| BoardError::story_not_found(key))
    }

    fn index_of(&self, key: &StoryKey) -> Result<usize> {
        self.stories
            .iter()
            .position(|s| &s.key == key)
            .ok_or_else(|| BoardError::story_not_found(key))
    }

    /// Index of `anchor` in the order with `skip` left out
    fn index_excluding(&self, anchor: &StoryKey, skip: &StoryKey) -> Result<usize> {
        if anchor == skip {
            return Err(BoardError::ordering(format!(
                "story {} cannot be positioned relative to itself",
                anchor
            )));
        }
        self.others(Some(skip))
            .position(|s| &s.key == anchor)
            .ok_or_else(|| BoardError::story_not_found(anchor))
    }

    fn others<'a>(&'a self, skip: Option<&'a StoryKey>) -> impl Iterator<Item = &'a Story> + 'a {
        self.stories.iter().filter(move |s| Some(&s.key) != skip)
    }

    /// Ordinal just after the story at `index` (counted without `skip`)
    fn ordinal_after(&self, index: usize, skip: Option<&StoryKey>) -> Ordinal {
        let mut rest = self.others(skip).skip(index);
        match (rest.next(), rest.next()) {
            (Some(anchor), Some(next)) => Ordinal::between(&anchor.ordinal, &next.ordinal),
            (Some(anchor), None) => Ordinal::after(&anchor.ordinal),
            _ => self.ordinal_at_end(skip),
        }
    }

    /// Ordinal just before the story at `index` (counted without `skip`)
    fn ordinal_before(&self, index: usize, skip: Option<&StoryKey>) -> Ordinal {
        let anchor = self.others(skip).nth(index);
        let previous = index.checked_sub(1).and_then(|i| self.others(skip).nth(i));
        match (previous, anchor) {
            (Some(previous), Some(anchor)) => Ordinal::between(&previous.ordinal, &anchor.ordinal),
            (None, Some(anchor)) => Ordinal::before(&anchor.ordinal),
            _ => self.ordinal_at_end(skip),
        }
    }

    fn ordinal_at_end(&self, skip: Option<&StoryKey>) -> Ordinal {
        self.others(skip)
            .last()
            .map(|s| Ordinal::after(&s.ordinal))
            .unwrap_or_else(Ordinal::first)
    }

    fn reposition(&mut self, key: &StoryKey, ordinal: Ordinal) -> Result<()> {
        let index = self.index_of(key)?;
        let mut story = self.stories.remove(index);
        debug!(story = %key, from = %story.ordinal, to = %ordinal, "story repositioned");
        story.ordinal = ordinal;
        self.insert_sorted(story);
        Ok(())
    }

    fn insert_sorted(&mut self, story: Story) {
        let at = self.stories.partition_point(|s| s.ordinal < story.ordinal);
        self.stories.insert(at, story);
    }

    fn emit_changes(&self, key: &StoryKey, fields: &[StoryField], origin: ChangeOrigin) {
        if fields.is_empty() {
            return;
        }
        let editing = self.get(key).is_some_and(|s| s.editing);
        for field in fields {
            self.events.emit(BoardEvent::StoryChanged {
                story: key.clone(),
                field: *field,
                origin,
                editing,
            });
        }
        self.events.emit(BoardEvent::AnyChanged { story: key.clone() });
    }
}
