//! Board configuration loaded with figment.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults (the classic four-column board)
//! 2. An optional YAML file
//! 3. Environment variables prefixed `STORYBOARD_` (nested keys split on `__`)

use crate::error::{BoardError, Result};
use crate::types::{ColumnDef, ColumnId};
use chrono::{Duration, NaiveDate};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, trace};

/// Columns the workflow places stories in; every board must define them
const WORKFLOW_COLUMNS: [&str; 4] = [
    ColumnId::CHILLY_BIN,
    ColumnId::BACKLOG,
    ColumnId::IN_PROGRESS,
    ColumnId::DONE,
];

/// Settings for one board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Columns in display order. Cross-column neighbour searches follow this order.
    pub columns: Vec<ColumnDef>,
    /// Allowed estimates for features
    pub point_scale: Vec<u32>,
    pub iteration_length_weeks: u32,
    /// First day of iteration 1
    pub start_date: NaiveDate,
    /// Points planned per future iteration
    pub default_velocity: u32,
    /// Viewer without write access: no drafts, no mutations
    pub read_only: bool,
    pub highlight_ms: u64,
    /// History header titles longer than this are cut and suffixed "..."
    pub history_title_limit: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            columns: ColumnDef::defaults(),
            point_scale: vec![0, 1, 2, 3, 5, 8],
            iteration_length_weeks: 1,
            start_date: NaiveDate::default(),
            default_velocity: 10,
            read_only: false,
            highlight_ms: 3000,
            history_title_limit: 32,
        }
    }
}

impl BoardConfig {
    /// Load from defaults, an optional YAML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        debug!("Loading board configuration");

        let mut figment = Figment::new().merge(Serialized::defaults(BoardConfig::default()));
        if let Some(path) = path {
            trace!("Merging config file: {}", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed("STORYBOARD_").split("__"));

        let config: BoardConfig = figment.extract().map_err(BoardError::config)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document on top of the defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: BoardConfig = serde_yaml_ng::from_str(yaml).map_err(BoardError::config)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the board cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(BoardError::config("at least one column is required"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.id.as_str()) {
                return Err(BoardError::config(format!(
                    "duplicate column id: {}",
                    column.id
                )));
            }
        }
        for required in WORKFLOW_COLUMNS {
            if !seen.contains(required) {
                return Err(BoardError::config(format!(
                    "workflow column missing: {}",
                    required
                )));
            }
        }
        if self.point_scale.is_empty() {
            return Err(BoardError::config("point scale must not be empty"));
        }
        if self.iteration_length_weeks == 0 {
            return Err(BoardError::config("iteration length must be at least one week"));
        }
        Ok(())
    }

    pub fn column(&self, id: &ColumnId) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| &c.id == id)
    }

    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }

    fn column_index(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| &c.id == id)
    }

    /// Columns strictly before `id` in display order
    pub fn columns_before(&self, id: &ColumnId) -> Vec<ColumnId> {
        match self.column_index(id) {
            Some(i) => self.columns[..i].iter().map(|c| c.id.clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Columns strictly after `id` in display order
    pub fn columns_after(&self, id: &ColumnId) -> Vec<ColumnId> {
        match self.column_index(id) {
            Some(i) => self.columns[i + 1..].iter().map(|c| c.id.clone()).collect(),
            None => Vec::new(),
        }
    }

    pub fn iteration_length(&self) -> Duration {
        Duration::weeks(i64::from(self.iteration_length_weeks))
    }

    pub fn highlight_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.highlight_ms)
    }
}
