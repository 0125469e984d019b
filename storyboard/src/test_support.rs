//! Test doubles for the board's collaborators
//!
//! Available to this crate's tests and, with the `test-support` feature, to
//! integration tests and downstream crates.

use crate::notifier::HighlightSink;
use crate::store::{StoreError, StoreResult, StoryStore};
use crate::types::{Activity, StoryId, StoryKey, StoryRecord, UserId};
use crate::workflow::{ConfirmRequest, Confirmation};
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

#[derive(Default)]
struct Inner {
    stories: IndexMap<StoryId, StoryRecord>,
    history: HashMap<StoryId, Vec<Activity>>,
    next_id: u64,
    failures: VecDeque<StoreError>,
    saves: Vec<StoryRecord>,
    deletes: Vec<StoryId>,
    acting_user: Option<UserId>,
}

/// In-memory [`StoryStore`].
///
/// Assigns ids on create, records every save, writes an activity per save
/// with the changed fields, and can fail or hold saves on request.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    gate: std::sync::Mutex<Option<Arc<Semaphore>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `records`; records without an id get one
    pub fn with_stories(records: Vec<StoryRecord>) -> Self {
        let mut inner = Inner::default();
        for mut record in records {
            let id = record.id.unwrap_or_else(|| StoryId(inner.next_id + 1));
            inner.next_id = inner.next_id.max(id.0);
            record.id = Some(id);
            inner.stories.insert(id, record);
        }
        Self {
            inner: Mutex::new(inner),
            gate: std::sync::Mutex::new(None),
        }
    }

    /// Make the next save fail with `error`
    pub async fn fail_next_save(&self, error: StoreError) {
        self.inner.lock().await.failures.push_back(error);
    }

    /// User recorded on generated activities
    pub async fn set_acting_user(&self, user: impl Into<UserId>) {
        self.inner.lock().await.acting_user = Some(user.into());
    }

    /// Replace a stored record as if another client had saved it
    pub async fn put(&self, record: StoryRecord) {
        if let Some(id) = record.id {
            self.inner.lock().await.stories.insert(id, record);
        }
    }

    pub async fn remove(&self, id: StoryId) {
        self.inner.lock().await.stories.shift_remove(&id);
    }

    pub async fn records(&self) -> Vec<StoryRecord> {
        self.inner.lock().await.stories.values().cloned().collect()
    }

    /// Every record passed to `save_story`, in call order
    pub async fn save_calls(&self) -> Vec<StoryRecord> {
        self.inner.lock().await.saves.clone()
    }

    pub async fn delete_calls(&self) -> Vec<StoryId> {
        self.inner.lock().await.deletes.clone()
    }

    /// Hold every following save until [`release_saves`](Self::release_saves)
    pub fn hold_saves(&self) {
        if let Ok(mut gate) = self.gate.lock() {
            *gate = Some(Arc::new(Semaphore::new(0)));
        }
    }

    /// Let `n` held saves complete
    pub fn release_saves(&self, n: usize) {
        if let Ok(gate) = self.gate.lock() {
            if let Some(gate) = gate.as_ref() {
                gate.add_permits(n);
            }
        }
    }

    /// Stop holding saves; held and future saves proceed immediately
    pub fn open_saves(&self) {
        if let Ok(mut gate) = self.gate.lock() {
            if let Some(gate) = gate.take() {
                gate.close();
            }
        }
    }

    /// Yield until at least `n` saves have been issued
    pub async fn wait_for_saves(&self, n: usize) {
        while self.inner.lock().await.saves.len() < n {
            tokio::task::yield_now().await;
        }
    }

    fn current_gate(&self) -> Option<Arc<Semaphore>> {
        self.gate.lock().ok().and_then(|g| g.clone())
    }
}

fn diff(old: &StoryRecord, new: &StoryRecord) -> IndexMap<String, (Value, Value)> {
    let mut changes = IndexMap::new();
    let mut field = |name: &str, a: Value, b: Value| {
        if a != b {
            changes.insert(name.to_string(), (a, b));
        }
    };
    field("title", json!(old.title), json!(new.title));
    field("description", json!(old.description), json!(new.description));
    field("story_type", json!(old.story_type), json!(new.story_type));
    field("state", json!(old.state), json!(new.state));
    field("estimate", json!(old.estimate), json!(new.estimate));
    field("accepted_at", json!(old.accepted_at), json!(new.accepted_at));
    changes
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn fetch_stories(&self) -> StoreResult<Vec<StoryRecord>> {
        Ok(self.records().await)
    }

    async fn fetch_story(&self, id: StoryId) -> StoreResult<StoryRecord> {
        self.inner
            .lock()
            .await
            .stories
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::transport(format!("story {} not found", id)))
    }

    async fn save_story(&self, record: &StoryRecord) -> StoreResult<StoryRecord> {
        self.inner.lock().await.saves.push(record.clone());

        if let Some(gate) = self.current_gate() {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut inner = self.inner.lock().await;
        if let Some(error) = inner.failures.pop_front() {
            return Err(error);
        }

        let mut saved = record.clone();
        let now = Utc::now();
        let activity = match record.id {
            Some(id) => {
                let old = inner
                    .stories
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| StoreError::transport(format!("story {} not found", id)))?;
                let mut activity = Activity::new("Story", id.0, "update", now);
                activity.changed_fields = diff(&old, &saved);
                activity
            }
            None => {
                inner.next_id += 1;
                let id = StoryId(inner.next_id);
                saved.id = Some(id);
                Activity::new("Story", id.0, "create", now)
            }
        };
        let activity = match inner.acting_user {
            Some(user) => activity.with_user(user),
            None => activity,
        };

        if let Some(id) = saved.id {
            inner.history.entry(id).or_default().push(activity);
            inner.stories.insert(id, saved.clone());
        }
        Ok(saved)
    }

    async fn delete_story(&self, id: StoryId) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.deletes.push(id);
        inner
            .stories
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::transport(format!("story {} not found", id)))
    }

    async fn fetch_history(&self, id: StoryId) -> StoreResult<Vec<Activity>> {
        Ok(self
            .inner
            .lock()
            .await
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}

/// [`HighlightSink`] that records highlights; everything is visible unless hidden
#[derive(Debug, Default)]
pub struct RecordingSink {
    hidden: std::sync::Mutex<HashSet<StoryKey>>,
    highlights: std::sync::Mutex<Vec<(StoryKey, Duration)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hide(&self, story: &StoryKey) {
        if let Ok(mut hidden) = self.hidden.lock() {
            hidden.insert(story.clone());
        }
    }

    pub fn highlights(&self) -> Vec<(StoryKey, Duration)> {
        self.highlights
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

impl HighlightSink for RecordingSink {
    fn is_visible(&self, story: &StoryKey) -> bool {
        self.hidden.lock().map(|h| !h.contains(story)).unwrap_or(true)
    }

    fn highlight(&self, story: &StoryKey, duration: Duration) {
        if let Ok(mut highlights) = self.highlights.lock() {
            highlights.push((story.clone(), duration));
        }
    }
}

/// [`Confirmation`] answering from a script, then with a default
#[derive(Debug)]
pub struct ScriptedConfirmation {
    answers: std::sync::Mutex<VecDeque<bool>>,
    default: bool,
    asked: std::sync::Mutex<Vec<ConfirmRequest>>,
}

impl ScriptedConfirmation {
    pub fn always(answer: bool) -> Self {
        Self {
            answers: std::sync::Mutex::new(VecDeque::new()),
            default: answer,
            asked: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Give `answers` in order, then decline
    pub fn answers(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: std::sync::Mutex::new(answers.into_iter().collect()),
            ..Self::always(false)
        }
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<ConfirmRequest> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Confirmation for ScriptedConfirmation {
    fn confirm(&self, request: &ConfirmRequest) -> bool {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(request.clone());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StoryState;

    #[tokio::test]
    async fn test_memory_store_assigns_ids_and_records_history() {
        let store = MemoryStore::new();
        store.set_acting_user(5u64).await;
        let created = store.save_story(&StoryRecord::new("New")).await.unwrap();
        let id = created.id.unwrap();

        let mut update = created.clone();
        update.state = StoryState::Started;
        store.save_story(&update).await.unwrap();

        let history = store.fetch_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "create");
        assert_eq!(history[1].user_id, Some(UserId(5)));
        assert_eq!(
            history[1].changed_fields.get("state"),
            Some(&(json!("unscheduled"), json!("started")))
        );
    }

    #[tokio::test]
    async fn test_scripted_failure_is_consumed() {
        let store = MemoryStore::with_stories(vec![StoryRecord::new("A")]);
        store.fail_next_save(StoreError::transport("down")).await;
        let record = store.records().await.remove(0);
        assert!(store.save_story(&record).await.is_err());
        assert!(store.save_story(&record).await.is_ok());
        assert_eq!(store.save_calls().await.len(), 2);
    }

    #[test]
    fn test_scripted_confirmation() {
        let confirm = ScriptedConfirmation::answers([true]);
        let request = ConfirmRequest::Destroy {
            story: StoryKey::new(),
        };
        assert!(confirm.confirm(&request));
        assert!(!confirm.confirm(&request));
        assert_eq!(confirm.requests().len(), 2);
    }
}
