//! The persistence collaborator seam.
//!
//! The board never owns persistence. Everything it needs from the
//! authoritative server goes through [`StoryStore`], whose calls are the only
//! suspension points in the engine.

use crate::types::{Activity, StoryId, StoryRecord};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Field-level messages from a rejected save, in the order the store sent them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field
    pub fn add(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.0.entry(field.into()).or_default().push(message.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// All messages as one sentence, e.g. "title can't be blank, estimate is invalid"
    pub fn messages(&self) -> String {
        self.0
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{} {}", field, m)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Errors reported by the persistence collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected the record with field-level messages
    #[error("validation failed: {}", .errors.messages())]
    Validation { errors: FieldErrors },

    /// Anything without structured errors: network, server fault, timeouts
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl StoreError {
    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation { errors }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Field errors, if the store sent any
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { errors } => Some(errors),
            Self::Transport { .. } => None,
        }
    }
}

/// Remote persistence for one board
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// All stories of the board, in the store's order
    async fn fetch_stories(&self) -> StoreResult<Vec<StoryRecord>>;

    /// One story's authoritative record
    async fn fetch_story(&self, id: StoryId) -> StoreResult<StoryRecord>;

    /// Create (no id) or update a story, returning the canonical record
    async fn save_story(&self, record: &StoryRecord) -> StoreResult<StoryRecord>;

    async fn delete_story(&self, id: StoryId) -> StoreResult<()>;

    /// Audit trail for one story
    async fn fetch_history(&self, id: StoryId) -> StoreResult<Vec<Activity>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_messages() {
        let errors = FieldErrors::new()
            .add("title", "can't be blank")
            .add("estimate", "is not included in the list")
            .add("title", "is too short");
        assert_eq!(
            errors.messages(),
            "title can't be blank, title is too short, estimate is not included in the list"
        );
        assert_eq!(errors.get("title").map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_field_errors_parse_from_store_payload() {
        let errors: FieldErrors =
            serde_json::from_str(r#"{"title": ["can't be blank"]}"#).unwrap();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_store_error_kinds() {
        let v = StoreError::validation(FieldErrors::new().add("title", "can't be blank"));
        assert!(v.field_errors().is_some());
        assert_eq!(v.to_string(), "validation failed: title can't be blank");

        let t = StoreError::transport("connection reset");
        assert!(t.field_errors().is_none());
    }
}
