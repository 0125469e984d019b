//! Column definitions

use super::ids::ColumnId;
use serde::{Deserialize, Serialize};

/// A column defines a workflow stage on the board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDef {
    pub id: ColumnId,
    pub name: String,
    /// Whether a story may be dropped into this column while it is empty.
    /// Only the two ends of the workflow receive drops from other columns.
    #[serde(default)]
    pub accepts_drops: bool,
    #[serde(default = "default_hideable")]
    pub hideable: bool,
}

fn default_hideable() -> bool {
    true
}

impl ColumnDef {
    pub fn new(id: impl Into<ColumnId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            accepts_drops: false,
            hideable: true,
        }
    }

    pub fn accepting_drops(mut self) -> Self {
        self.accepts_drops = true;
        self
    }

    /// The classic board, in display order
    pub fn defaults() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new(ColumnId::done(), "Done"),
            ColumnDef::new(ColumnId::in_progress(), "In Progress"),
            ColumnDef::new(ColumnId::backlog(), "Backlog").accepting_drops(),
            ColumnDef::new(ColumnId::chilly_bin(), "Chilly Bin").accepting_drops(),
        ]
    }
}
