//! ActivityLog - render-ready story history
//!
//! History is fetched per story when its panel is opened, never for the
//! whole board. Display strings come from [`ActivityLabels`] and user names
//! from a [`UserDirectory`]; both are supplied by the caller.

use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use crate::store::StoryStore;
use crate::types::{Activity, Story, StoryId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const UNKNOWN_USER: &str = "Unknown user";
const DATE_FORMAT: &str = "%-d %b %Y";

/// Display labels for actions and attributes
pub trait ActivityLabels: Send + Sync {
    /// Label for an action such as "update"
    fn action(&self, action: &str) -> String;

    /// Label for `attribute` of a subject of `subject_type`
    fn attribute(&self, subject_type: &str, attribute: &str) -> String;
}

/// Labels derived from the identifiers: `story_type` becomes "Story type"
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanizedLabels;

impl ActivityLabels for HumanizedLabels {
    fn action(&self, action: &str) -> String {
        humanize(action)
    }

    fn attribute(&self, _subject_type: &str, attribute: &str) -> String {
        humanize(attribute.strip_suffix("_id").unwrap_or(attribute))
    }
}

fn humanize(identifier: &str) -> String {
    let spaced = identifier.replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolves user ids to display names
pub trait UserDirectory: Send + Sync {
    fn display_name(&self, user: UserId) -> Option<String>;
}

impl UserDirectory for HashMap<UserId, String> {
    fn display_name(&self, user: UserId) -> Option<String> {
        self.get(&user).cloned()
    }
}

/// One attribute change of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeChange {
    pub attribute: String,
    pub old_value: String,
    pub new_value: String,
}

/// One rendered activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub action: String,
    /// e.g. "5 Mar 2024"
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub changes: Vec<AttributeChange>,
}

/// History of one story, ready to display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPanel {
    pub story: StoryId,
    /// Header text; the title may be shortened
    pub title: String,
    pub entries: Vec<HistoryEntry>,
}

/// Turns store activities into history entries
#[derive(Clone)]
pub struct ActivityLog {
    labels: Arc<dyn ActivityLabels>,
    users: Arc<dyn UserDirectory>,
    title_limit: usize,
}

impl ActivityLog {
    pub fn new(labels: Arc<dyn ActivityLabels>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            labels,
            users,
            title_limit: BoardConfig::default().history_title_limit,
        }
    }

    pub fn with_title_limit(mut self, limit: usize) -> Self {
        self.title_limit = limit;
        self
    }

    /// Render activities in the order given
    pub fn render(&self, activities: &[Activity]) -> Vec<HistoryEntry> {
        activities.iter().map(|a| self.render_one(a)).collect()
    }

    fn render_one(&self, activity: &Activity) -> HistoryEntry {
        let subject_type = activity.subject_type.to_lowercase();
        let changes = activity
            .changed_fields
            .iter()
            .map(|(field, (old, new))| AttributeChange {
                attribute: self.labels.attribute(&subject_type, field),
                old_value: display_value(old),
                new_value: display_value(new),
            })
            .collect();
        let user = activity
            .user_id
            .and_then(|id| self.users.display_name(id))
            .unwrap_or_else(|| UNKNOWN_USER.to_string());

        HistoryEntry {
            action: self.labels.action(&activity.action),
            date: activity.updated_at.format(DATE_FORMAT).to_string(),
            timestamp: activity.updated_at,
            user,
            changes,
        }
    }

    /// Panel header for a story title, shortened past the title limit.
    ///
    /// Only the displayed text is cut; the story keeps its title.
    pub fn history_title(&self, title: &str) -> String {
        let shown = if title.chars().count() > self.title_limit {
            let cut: String = title.chars().take(self.title_limit).collect();
            format!("{}...", cut)
        } else {
            title.to_string()
        };
        format!("History Of '{}'", shown)
    }

    /// Fetch and render a story's history
    pub async fn open_history(&self, store: &dyn StoryStore, story: &Story) -> Result<HistoryPanel> {
        let id = story.id.ok_or_else(|| BoardError::NotPersisted {
            key: story.key.to_string(),
        })?;
        debug!(story = %story.key, %id, "fetching history");
        let activities = store.fetch_history(id).await?;
        Ok(HistoryPanel {
            story: id,
            title: self.history_title(&story.title),
            entries: self.render(&activities),
        })
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(Arc::new(HumanizedLabels), Arc::new(HashMap::new()))
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("title_limit", &self.title_limit)
            .finish_non_exhaustive()
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
