//! Identifier newtypes

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing string identifier
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

string_id!(
    /// Client-local handle of a story. Assigned on creation, before the
    /// store has given the story an id, and never sent to the store.
    StoryKey
);

impl StoryKey {
    /// Generate a fresh key
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }
}

impl Default for StoryKey {
    fn default() -> Self {
        Self::new()
    }
}

string_id!(
    /// Identifier of a workflow column (`backlog`, `chilly_bin`, ...)
    ColumnId
);

impl ColumnId {
    pub const CHILLY_BIN: &'static str = "chilly_bin";
    pub const BACKLOG: &'static str = "backlog";
    pub const IN_PROGRESS: &'static str = "in_progress";
    pub const DONE: &'static str = "done";

    pub fn chilly_bin() -> Self {
        Self::from_string(Self::CHILLY_BIN)
    }

    pub fn backlog() -> Self {
        Self::from_string(Self::BACKLOG)
    }

    pub fn in_progress() -> Self {
        Self::from_string(Self::IN_PROGRESS)
    }

    pub fn done() -> Self {
        Self::from_string(Self::DONE)
    }
}

numeric_id!(
    /// Server-assigned story id
    StoryId
);

numeric_id!(
    /// Server-assigned user id
    UserId
);

numeric_id!(NoteId);

numeric_id!(TaskId);
