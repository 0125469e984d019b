//! Integration tests for optimistic saves against the in-memory store

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use storyboard::test_support::{MemoryStore, RecordingSink, ScriptedConfirmation};
use storyboard::{
    Activity, BoardConfig, BoardContext, BoardError, BoardModel, ChangeNotifier, ColumnDef,
    ColumnId, ConfirmRequest, DropTarget, FieldErrors, SaveOutcome, SaveStatus, StoreError,
    StoreResult, StoryEdit, StoryId, StoryKey, StoryRecord, StoryState, StoryStore,
    SyncCoordinator, Transition,
};
use tokio::sync::{Notify, RwLock};

fn workflow_order_config() -> BoardConfig {
    BoardConfig {
        columns: vec![
            ColumnDef::new(ColumnId::chilly_bin(), "Chilly Bin").accepting_drops(),
            ColumnDef::new(ColumnId::backlog(), "Backlog").accepting_drops(),
            ColumnDef::new(ColumnId::in_progress(), "In Progress"),
            ColumnDef::new(ColumnId::done(), "Done"),
        ],
        ..Default::default()
    }
}

async fn setup(
    config: BoardConfig,
    records: Vec<StoryRecord>,
    confirm: Arc<ScriptedConfirmation>,
) -> (SyncCoordinator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_stories(records));
    let board = Arc::new(RwLock::new(BoardModel::new(BoardContext::new(config))));
    let sync = SyncCoordinator::new(board, store.clone(), confirm);
    sync.load().await.unwrap();
    (sync, store)
}

async fn key_for(sync: &SyncCoordinator, id: u64) -> StoryKey {
    sync.board()
        .read()
        .await
        .find_by_id(StoryId(id))
        .map(|s| s.key.clone())
        .unwrap()
}

fn story(id: u64, title: &str, state: StoryState) -> StoryRecord {
    StoryRecord::new(title)
        .with_id(id)
        .with_state(state)
        .with_estimate(2)
}

#[tokio::test]
async fn test_drop_unscheduled_story_into_empty_in_progress() {
    let mut a = story(1, "A", StoryState::Unscheduled);
    a.column = Some(ColumnId::backlog());
    let (sync, store) = setup(
        workflow_order_config(),
        vec![a],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;
    let key = key_for(&sync, 1).await;

    let outcome = sync
        .drop_story(&key, &DropTarget::new(ColumnId::in_progress(), 0))
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Saved);

    let board = sync.board().read().await;
    let a = board.story(&key).unwrap();
    assert_eq!(a.state, StoryState::Unstarted);
    assert_eq!(a.column, ColumnId::in_progress());

    let saved = &store.save_calls().await[0];
    assert_eq!(saved.state, StoryState::Unstarted);
    assert_eq!(saved.column, Some(ColumnId::in_progress()));
}

#[tokio::test]
async fn test_second_save_rejected_while_first_in_flight() {
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![story(1, "A", StoryState::Started), story(2, "B", StoryState::Started)],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;
    let a = key_for(&sync, 1).await;
    let b = key_for(&sync, 2).await;
    store.hold_saves();

    let first = {
        let sync = sync.clone();
        let a = a.clone();
        tokio::spawn(async move { sync.transition(&a, Transition::Finish).await })
    };
    store.wait_for_saves(1).await;

    {
        let board = sync.board().read().await;
        let story = board.story(&a).unwrap();
        assert!(story.save_in_progress());
        assert_eq!(story.state, StoryState::Finished);
    }

    let err = sync.set_estimate(&a, Some(3)).await.unwrap_err();
    assert!(matches!(err, BoardError::SaveInProgress { .. }));
    assert!(err.is_recoverable());
    assert_eq!(sync.board().read().await.story(&a).unwrap().estimate, Some(2));

    // A different story saves independently
    let second = {
        let sync = sync.clone();
        let b = b.clone();
        tokio::spawn(async move { sync.transition(&b, Transition::Finish).await })
    };
    store.wait_for_saves(2).await;

    store.release_saves(2);
    assert_eq!(first.await.unwrap().unwrap(), SaveOutcome::Saved);
    assert_eq!(second.await.unwrap().unwrap(), SaveOutcome::Saved);
    store.open_saves();

    // Idle again: the estimate goes through
    assert_eq!(
        sync.set_estimate(&a, Some(3)).await.unwrap(),
        SaveOutcome::Saved
    );
    assert_eq!(store.save_calls().await.len(), 3);
}

#[tokio::test]
async fn test_accept_timestamps_before_persist() {
    let confirm = Arc::new(ScriptedConfirmation::always(true));
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![story(1, "A", StoryState::Delivered)],
        confirm.clone(),
    )
    .await;
    let key = key_for(&sync, 1).await;
    store.hold_saves();

    let pending = {
        let sync = sync.clone();
        let key = key.clone();
        tokio::spawn(async move { sync.transition(&key, Transition::Accept).await })
    };
    store.wait_for_saves(1).await;

    let sent = &store.save_calls().await[0];
    assert_eq!(sent.state, StoryState::Accepted);
    assert!(sent.accepted_at.is_some());
    assert_eq!(
        confirm.requests(),
        vec![ConfirmRequest::Transition {
            story: key.clone(),
            transition: Transition::Accept,
        }]
    );

    store.open_saves();
    assert_eq!(pending.await.unwrap().unwrap(), SaveOutcome::Saved);
    let board = sync.board().read().await;
    let story = board.story(&key).unwrap();
    assert_eq!(story.accepted_at, sent.accepted_at);
    // Accepted during the current iteration
    assert_eq!(story.column, ColumnId::in_progress());
}

#[tokio::test]
async fn test_declined_accept_changes_nothing() {
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![story(1, "A", StoryState::Delivered)],
        Arc::new(ScriptedConfirmation::always(false)),
    )
    .await;
    let key = key_for(&sync, 1).await;

    let outcome = sync.transition(&key, Transition::Accept).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Declined);
    assert!(store.save_calls().await.is_empty());

    let board = sync.board().read().await;
    let story = board.story(&key).unwrap();
    assert_eq!(story.state, StoryState::Delivered);
    assert_eq!(story.column, ColumnId::in_progress());
    assert!(story.accepted_at.is_none());
}

#[test_log::test(tokio::test)]
async fn test_validation_failure_then_cancel_resyncs() {
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![story(1, "A", StoryState::Unstarted)],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;
    let key = key_for(&sync, 1).await;
    sync.board().write().await.set_editing(&key, true).unwrap();
    store
        .fail_next_save(StoreError::validation(
            FieldErrors::new().add("title", "can't be blank"),
        ))
        .await;

    let outcome = sync
        .save_edit(&key, StoryEdit::default().title(""), false)
        .await
        .unwrap();
    let SaveOutcome::Failed { notice, errors } = outcome else {
        panic!("expected a failed save");
    };
    assert_eq!(notice.title, "Save error");
    assert_eq!(notice.text, "title can't be blank");
    assert!(errors.is_some());

    {
        let board = sync.board().read().await;
        let story = board.story(&key).unwrap();
        assert!(story.editing);
        assert!(story.has_errors());
        assert_eq!(story.title, "");
        assert!(matches!(story.save, SaveStatus::Failed { .. }));
    }

    sync.cancel_edit(&key).await.unwrap();
    let board = sync.board().read().await;
    let story = board.story(&key).unwrap();
    assert!(!story.editing);
    assert!(!story.has_errors());
    assert_eq!(story.title, "A");
    assert_eq!(story.save, SaveStatus::Idle);
    board.verify_order().unwrap();
}

#[tokio::test]
async fn test_new_story_saved_and_kept_open() {
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;
    let key = sync.new_story().await.unwrap();

    let outcome = sync
        .save_edit(&key, StoryEdit::default().title("Fresh"), true)
        .await
        .unwrap();
    assert!(outcome.is_saved());

    let board = sync.board().read().await;
    let story = board.story(&key).unwrap();
    assert!(story.id.is_some());
    assert!(story.editing);
    // Persisted stories get their trailing drafts
    assert_eq!(story.notes.len(), 1);
    assert_eq!(story.tasks.len(), 1);
    assert_eq!(store.records().await.len(), 1);
}

async fn wait_for_highlights(sink: &RecordingSink, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while sink.highlights().len() < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("highlights did not arrive");
}

#[tokio::test]
async fn test_refresh_highlights_remote_changes_only_when_not_editing() {
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![story(1, "A", StoryState::Started), story(2, "B", StoryState::Started)],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;
    let a = key_for(&sync, 1).await;
    let b = key_for(&sync, 2).await;

    let sink = Arc::new(RecordingSink::new());
    let handle = {
        let mut board = sync.board().write().await;
        board.set_editing(&b, true).unwrap();
        ChangeNotifier::for_board(&board, sink.clone()).attach(&board)
    };

    store.put(story(1, "A renamed", StoryState::Started)).await;
    store.put(story(2, "B renamed", StoryState::Started)).await;
    let summary = sync.refresh().await.unwrap();
    assert_eq!(summary.updated, 2);
    wait_for_highlights(&sink, 1).await;
    assert_eq!(
        sink.highlights(),
        vec![(a.clone(), Duration::from_millis(3000))]
    );

    // Own changes are never highlighted; the following remote one is
    sync.transition(&a, Transition::Finish).await.unwrap();
    store.put(story(1, "A again", StoryState::Finished)).await;
    sync.refresh().await.unwrap();
    wait_for_highlights(&sink, 2).await;
    let highlighted: Vec<StoryKey> = sink.highlights().into_iter().map(|(k, _)| k).collect();
    assert_eq!(highlighted, vec![a.clone(), a.clone()]);

    handle.detach();
    tokio::time::timeout(Duration::from_secs(5), async {
        while sync.board().read().await.subscriber_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    store.put(story(1, "A once more", StoryState::Finished)).await;
    sync.refresh().await.unwrap();
    tokio::task::yield_now().await;
    assert_eq!(sink.highlights().len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_refresh_picks_up_new_and_deleted_stories() {
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![story(1, "A", StoryState::Unstarted), story(2, "B", StoryState::Unstarted)],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;

    store.remove(StoryId(2)).await;
    store.put(story(3, "C", StoryState::Unscheduled)).await;
    let summary = sync.refresh().await.unwrap();
    assert_eq!((summary.added, summary.removed), (1, 1));

    let board = sync.board().read().await;
    assert!(board.find_by_id(StoryId(2)).is_none());
    let c = board.find_by_id(StoryId(3)).unwrap();
    assert_eq!(c.column, ColumnId::chilly_bin());
    board.verify_order().unwrap();
}

#[tokio::test]
async fn test_accept_through_edit_lands_like_accept_transition() {
    let (sync, _store) = setup(
        BoardConfig::default(),
        vec![
            story(1, "A", StoryState::Delivered),
            story(2, "B", StoryState::Delivered),
        ],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;
    let a = key_for(&sync, 1).await;
    let b = key_for(&sync, 2).await;

    assert!(sync.transition(&b, Transition::Accept).await.unwrap().is_saved());
    assert!(sync
        .save_edit(&a, StoryEdit::default().state(StoryState::Accepted), false)
        .await
        .unwrap()
        .is_saved());

    let board = sync.board().read().await;
    let (sa, sb) = (board.story(&a).unwrap(), board.story(&b).unwrap());
    assert!(sa.accepted_at.is_some());
    assert_eq!(sa.column, ColumnId::in_progress());
    assert_eq!(sa.column, sb.column);

    let placement = |key: &StoryKey| {
        board
            .iterations()
            .iter()
            .find(|i| i.stories.contains(key))
            .map(|i| (i.number, i.column.clone()))
    };
    assert_eq!(placement(&a), placement(&b));
    assert_eq!(board.iterations().len(), 1);
}

/// Commits each save, then answers only when released
struct CommitFirstStore {
    inner: MemoryStore,
    committed: Notify,
    release: Notify,
}

#[async_trait]
impl StoryStore for CommitFirstStore {
    async fn fetch_stories(&self) -> StoreResult<Vec<StoryRecord>> {
        self.inner.fetch_stories().await
    }

    async fn fetch_story(&self, id: StoryId) -> StoreResult<StoryRecord> {
        self.inner.fetch_story(id).await
    }

    async fn save_story(&self, record: &StoryRecord) -> StoreResult<StoryRecord> {
        let saved = self.inner.save_story(record).await;
        self.committed.notify_one();
        self.release.notified().await;
        saved
    }

    async fn delete_story(&self, id: StoryId) -> StoreResult<()> {
        self.inner.delete_story(id).await
    }

    async fn fetch_history(&self, id: StoryId) -> StoreResult<Vec<Activity>> {
        self.inner.fetch_history(id).await
    }
}

#[tokio::test]
async fn test_refresh_during_first_save_keeps_one_copy() {
    let store = Arc::new(CommitFirstStore {
        inner: MemoryStore::new(),
        committed: Notify::new(),
        release: Notify::new(),
    });
    let board = Arc::new(RwLock::new(BoardModel::new(BoardContext::new(
        BoardConfig::default(),
    ))));
    let sync = SyncCoordinator::new(
        board.clone(),
        store.clone(),
        Arc::new(ScriptedConfirmation::always(true)),
    );
    sync.load().await.unwrap();
    let key = sync.new_story().await.unwrap();

    let pending = {
        let sync = sync.clone();
        let key = key.clone();
        tokio::spawn(async move {
            sync.save_edit(&key, StoryEdit::default().title("New"), false)
                .await
        })
    };
    store.committed.notified().await;

    // The store already has the story; the board still has the draft
    let summary = sync.refresh().await.unwrap();
    assert_eq!(summary.added, 0);
    assert_eq!(board.read().await.len(), 1);

    store.release.notify_one();
    assert!(pending.await.unwrap().unwrap().is_saved());

    sync.refresh().await.unwrap();
    let board = board.read().await;
    let copies: Vec<&StoryKey> = board
        .stories()
        .iter()
        .filter(|s| s.id == Some(StoryId(1)))
        .map(|s| &s.key)
        .collect();
    assert_eq!(copies, vec![&key]);
    board.verify_order().unwrap();
}

#[tokio::test]
async fn test_estimate_regroups_iterations_before_save_returns() {
    let (sync, store) = setup(
        BoardConfig::default(),
        vec![story(1, "A", StoryState::Unstarted)],
        Arc::new(ScriptedConfirmation::always(true)),
    )
    .await;
    let key = key_for(&sync, 1).await;
    let points = |board: &BoardModel| {
        board
            .iterations()
            .iter()
            .find(|i| i.stories.contains(&key))
            .map(|i| i.points)
    };
    assert_eq!(points(&*sync.board().read().await), Some(2));
    store.hold_saves();

    let pending = {
        let sync = sync.clone();
        let key = key.clone();
        tokio::spawn(async move { sync.set_estimate(&key, Some(5)).await })
    };
    store.wait_for_saves(1).await;
    assert_eq!(points(&*sync.board().read().await), Some(5));

    store.open_saves();
    assert!(pending.await.unwrap().unwrap().is_saved());
}
