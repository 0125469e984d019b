//! Activity records for the audit trail

use super::ids::UserId;
use crate::error::Result;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An audit record produced by the store whenever a subject is mutated.
///
/// Immutable once created; the board only reads these for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Kind of subject, e.g. "Story" or "Note"
    pub subject_type: String,

    pub subject_id: u64,

    /// What happened, e.g. "create", "update", "destroy"
    pub action: String,

    /// Field name to `[old, new]`, in the order the store reported them
    #[serde(default, alias = "subject_changes", alias = "changedFields")]
    pub changed_fields: IndexMap<String, (Value, Value)>,

    pub updated_at: DateTime<Utc>,

    /// Who performed the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl Activity {
    /// Create a new activity record
    pub fn new(
        subject_type: impl Into<String>,
        subject_id: u64,
        action: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            subject_type: subject_type.into(),
            subject_id,
            action: action.into(),
            changed_fields: IndexMap::new(),
            updated_at,
            user_id: None,
        }
    }

    /// Record a field change
    pub fn with_change(mut self, field: impl Into<String>, old: Value, new: Value) -> Self {
        self.changed_fields.insert(field.into(), (old, new));
        self
    }

    /// Set the acting user
    pub fn with_user(mut self, user: impl Into<UserId>) -> Self {
        self.user_id = Some(user.into());
        self
    }

    /// Parse an activity, unwrapping the `{"activity": {...}}` envelope some
    /// stores send.
    pub fn from_json(value: Value) -> Result<Self> {
        let activity = match value {
            Value::Object(mut map) if map.contains_key("activity") => {
                serde_json::from_value(map.remove("activity").unwrap_or(Value::Null))?
            }
            other => serde_json::from_value(other)?,
        };
        Ok(activity)
    }
}
