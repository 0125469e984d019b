//! SyncCoordinator - optimistic mutation with remote confirmation
//!
//! Every mutation follows the same shape: under the board lock, check that
//! no save is outstanding for the story, apply the change locally and mark
//! the save in flight; release the lock; await the store; re-take the lock
//! and settle or record the failure. A failed save leaves the local value
//! applied, with the story in [`SaveStatus::Failed`](crate::SaveStatus) until
//! the user retries or cancels.
//!
//! A second mutation of a story whose save is still in flight is rejected
//! with [`BoardError::SaveInProgress`] before anything is touched.

use crate::board::{BoardModel, DropTarget, MergeSummary, StoryEdit};
use crate::error::{BoardError, Result};
use crate::store::{FieldErrors, StoryStore};
use crate::types::{Notice, StoryKey, StoryRecord};
use crate::workflow::{ConfirmRequest, Confirmation, Gate, Transition};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How a coordinated mutation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The store confirmed the change
    Saved,
    /// The store refused or could not be reached; the local change stays
    Failed {
        notice: Notice,
        errors: Option<FieldErrors>,
    },
    /// The user declined the confirmation; nothing changed
    Declined,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// Drives board mutations against the store
#[derive(Clone)]
pub struct SyncCoordinator {
    board: Arc<RwLock<BoardModel>>,
    store: Arc<dyn StoryStore>,
    confirm: Arc<dyn Confirmation>,
}

impl SyncCoordinator {
    pub fn new(
        board: Arc<RwLock<BoardModel>>,
        store: Arc<dyn StoryStore>,
        confirm: Arc<dyn Confirmation>,
    ) -> Self {
        Self {
            board,
            store,
            confirm,
        }
    }

    pub fn board(&self) -> &Arc<RwLock<BoardModel>> {
        &self.board
    }

    /// Fetch every story and replace the board
    pub async fn load(&self) -> Result<usize> {
        let records = self.store.fetch_stories().await?;
        let count = records.len();
        self.board.write().await.load(records);
        Ok(count)
    }

    /// Fetch every story and merge the differences into the board
    pub async fn refresh(&self) -> Result<MergeSummary> {
        debug!("refreshing board");
        let records = self.store.fetch_stories().await?;
        Ok(self.board.write().await.merge_remote(records))
    }

    /// Run a workflow transition.
    ///
    /// Accept and reject are confirmed first; declining leaves the story
    /// untouched and makes no store call.
    pub async fn transition(&self, key: &StoryKey, transition: Transition) -> Result<SaveOutcome> {
        let record = {
            let mut board = self.board.write().await;
            let story = board.ensure_idle(key)?;
            let plan = match board
                .workflow()
                .plan(story, transition, self.confirm.as_ref())?
            {
                Gate::Proceed(plan) => plan,
                Gate::Declined => return Ok(SaveOutcome::Declined),
            };
            board.apply_transition(key, &plan)?;
            board.rebuild_iterations();
            board.begin_save(key)?
        };
        info!(story = %key, %transition, "transition");
        self.persist(key, record).await
    }

    /// Set or clear a feature's estimate
    pub async fn set_estimate(&self, key: &StoryKey, estimate: Option<u32>) -> Result<SaveOutcome> {
        let record = {
            let mut board = self.board.write().await;
            Self::ensure_writable(&board)?;
            board.ensure_idle(key)?;
            board.set_estimate(key, estimate)?;
            board.rebuild_iterations();
            board.begin_save(key)?
        };
        self.persist(key, record).await
    }

    /// Move a story to a drop position and persist its new place
    pub async fn drop_story(&self, key: &StoryKey, target: &DropTarget) -> Result<SaveOutcome> {
        let record = {
            let mut board = self.board.write().await;
            board.ensure_idle(key)?;
            board.apply_drop(key, target)?;
            board.rebuild_iterations();
            board.begin_save(key)?
        };
        self.persist(key, record).await
    }

    /// Add a new story, open for editing. It is saved by [`save_edit`](Self::save_edit).
    pub async fn new_story(&self) -> Result<StoryKey> {
        self.board.write().await.add_draft()
    }

    /// Apply the edit form and save.
    ///
    /// On success the story stays in edit mode only if `keep_editing`. An
    /// accepted story without an acceptance time is stamped before the save
    /// goes out.
    pub async fn save_edit(
        &self,
        key: &StoryKey,
        edit: StoryEdit,
        keep_editing: bool,
    ) -> Result<SaveOutcome> {
        let record = {
            let mut board = self.board.write().await;
            Self::ensure_writable(&board)?;
            board.ensure_idle(key)?;
            board.apply_edit(key, edit)?;
            board.rebuild_iterations();
            board.begin_save(key)?
        };
        let outcome = self.persist(key, record).await?;
        if outcome.is_saved() {
            self.board.write().await.set_editing(key, keep_editing)?;
        }
        Ok(outcome)
    }

    /// Leave edit mode.
    ///
    /// A story carrying field errors is reloaded from the store to undo the
    /// rejected values. An unsaved draft is discarded.
    pub async fn cancel_edit(&self, key: &StoryKey) -> Result<()> {
        let reload = {
            let mut board = self.board.write().await;
            let story = board.ensure_idle(key)?;
            if story.is_new() {
                board.remove(key)?;
                return Ok(());
            }
            let id = story.id;
            let had_errors = story.has_errors();
            board.set_editing(key, false)?;
            board.end_save(key)?;
            if had_errors {
                board.set_errors(key, None)?;
            }
            id.filter(|_| had_errors)
        };

        if let Some(id) = reload {
            debug!(story = %key, %id, "reloading story after cancelled edit");
            let record = self.store.fetch_story(id).await?;
            let mut board = self.board.write().await;
            board.apply_remote(key, record)?;
            board.rebuild_iterations();
        }
        Ok(())
    }

    /// Delete a story after confirmation.
    ///
    /// Persisted stories leave the board once the store confirms the delete.
    pub async fn destroy(&self, key: &StoryKey) -> Result<SaveOutcome> {
        let id = {
            let mut board = self.board.write().await;
            Self::ensure_writable(&board)?;
            let story = board.ensure_idle(key)?;
            let request = ConfirmRequest::Destroy { story: key.clone() };
            if !self.confirm.confirm(&request) {
                info!(story = %key, "destroy declined");
                return Ok(SaveOutcome::Declined);
            }
            let id = story.id;
            match id {
                Some(id) => {
                    board.begin_save(key)?;
                    id
                }
                None => {
                    board.remove(key)?;
                    return Ok(SaveOutcome::Saved);
                }
            }
        };

        info!(story = %key, %id, "deleting story");
        let result = self.store.delete_story(id).await;
        let mut board = self.board.write().await;
        match result {
            Ok(()) => {
                board.remove(key)?;
                board.rebuild_iterations();
                Ok(SaveOutcome::Saved)
            }
            Err(error) => {
                warn!(story = %key, %error, "delete failed");
                let notice = board.fail_save(key, &error)?;
                Ok(SaveOutcome::Failed {
                    notice,
                    errors: error.field_errors().cloned(),
                })
            }
        }
    }

    async fn persist(&self, key: &StoryKey, record: StoryRecord) -> Result<SaveOutcome> {
        debug!(story = %key, id = ?record.id, "saving story");
        let result = self.store.save_story(&record).await;

        let mut board = self.board.write().await;
        match result {
            Ok(saved) => {
                board.settle(key, saved)?;
                board.rebuild_iterations();
                info!(story = %key, "story saved");
                Ok(SaveOutcome::Saved)
            }
            Err(error) => {
                warn!(story = %key, %error, "save failed");
                let notice = board.fail_save(key, &error)?;
                Ok(SaveOutcome::Failed {
                    notice,
                    errors: error.field_errors().cloned(),
                })
            }
        }
    }

    fn ensure_writable(board: &BoardModel) -> Result<()> {
        if board.context().config.read_only {
            return Err(BoardError::ReadOnly);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator").finish_non_exhaustive()
    }
}
