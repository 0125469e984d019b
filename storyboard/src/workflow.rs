//! Workflow state machine
//!
//! Maps states to columns, gates destructive transitions behind user
//! confirmation and stamps acceptance time. The legal-transition table itself
//! is pluggable through [`TransitionRules`].

use crate::clock::Clock;
use crate::config::BoardConfig;
use crate::context::BoardContext;
use crate::error::{BoardError, Result};
use crate::types::{ColumnId, Story, StoryKey, StoryState, StoryType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// A named workflow action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Start,
    Finish,
    Deliver,
    Accept,
    Reject,
    Restart,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Deliver => "deliver",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Restart => "restart",
        }
    }

    /// State the story is in after the action
    pub fn target_state(&self) -> StoryState {
        match self {
            Self::Start | Self::Restart => StoryState::Started,
            Self::Finish => StoryState::Finished,
            Self::Deliver => StoryState::Delivered,
            Self::Accept => StoryState::Accepted,
            Self::Reject => StoryState::Rejected,
        }
    }

    /// Accepting and rejecting are definitive and must be confirmed
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::Accept | Self::Reject)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "finish" => Ok(Self::Finish),
            "deliver" => Ok(Self::Deliver),
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "restart" => Ok(Self::Restart),
            other => Err(BoardError::invalid_value(
                "transition",
                format!("unknown transition '{}'", other),
            )),
        }
    }
}

/// Which transitions a story of a given type may take from a given state
pub trait TransitionRules: Send + Sync {
    fn transitions(&self, story_type: StoryType, state: StoryState) -> Vec<Transition>;
}

/// The classic table, identical for every story type
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl TransitionRules for StandardRules {
    fn transitions(&self, _story_type: StoryType, state: StoryState) -> Vec<Transition> {
        match state {
            StoryState::Unscheduled | StoryState::Unstarted => vec![Transition::Start],
            StoryState::Started => vec![Transition::Finish],
            StoryState::Finished => vec![Transition::Deliver],
            StoryState::Delivered => vec![Transition::Accept, Transition::Reject],
            StoryState::Rejected => vec![Transition::Restart],
            StoryState::Accepted => Vec::new(),
        }
    }
}

/// A question put to the user before a definitive action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    Transition {
        story: StoryKey,
        transition: Transition,
    },
    Destroy {
        story: StoryKey,
    },
}

impl ConfirmRequest {
    pub fn prompt(&self) -> String {
        match self {
            Self::Transition { transition, .. } => format!(
                "Are you sure you want to {} this story? This cannot be undone.",
                transition
            ),
            Self::Destroy { .. } => "Are you sure you want to destroy this story?".to_string(),
        }
    }
}

/// Asks the user to confirm. Declining is a normal outcome, not an error.
pub trait Confirmation: Send + Sync {
    fn confirm(&self, request: &ConfirmRequest) -> bool;
}

/// Confirms everything; for non-interactive callers
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirmation for AlwaysConfirm {
    fn confirm(&self, _request: &ConfirmRequest) -> bool {
        true
    }
}

/// Everything needed to apply a transition locally
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub transition: Transition,
    pub from: StoryState,
    pub to: StoryState,
    pub accepted_at: Option<DateTime<Utc>>,
    pub column: ColumnId,
}

/// Result of gating a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    Proceed(TransitionPlan),
    /// The user declined; nothing may change
    Declined,
}

/// Owns the column/state coupling and transition gating
#[derive(Clone)]
pub struct WorkflowStateMachine {
    config: Arc<BoardConfig>,
    clock: Arc<dyn Clock>,
    rules: Arc<dyn TransitionRules>,
}

impl WorkflowStateMachine {
    pub fn new(ctx: &BoardContext) -> Self {
        Self {
            config: ctx.config.clone(),
            clock: ctx.clock.clone(),
            rules: ctx.rules.clone(),
        }
    }

    /// Transitions offered for a story.
    ///
    /// An unestimated feature must be estimated before it can move on.
    pub fn available(&self, story: &Story) -> Vec<Transition> {
        if story.is_estimable() && !story.is_estimated() {
            return Vec::new();
        }
        self.rules.transitions(story.story_type, story.state)
    }

    /// Validate a transition and ask for confirmation where required.
    ///
    /// No state is touched here; the caller applies the returned plan.
    pub fn plan(
        &self,
        story: &Story,
        transition: Transition,
        confirm: &dyn Confirmation,
    ) -> Result<Gate> {
        if self.config.read_only {
            return Err(BoardError::ReadOnly);
        }
        if !self.available(story).contains(&transition) {
            return Err(BoardError::InvalidTransition {
                transition: transition.to_string(),
                story_type: story.story_type.to_string(),
                state: story.state.to_string(),
            });
        }

        if transition.requires_confirmation() {
            let request = ConfirmRequest::Transition {
                story: story.key.clone(),
                transition,
            };
            if !confirm.confirm(&request) {
                info!(story = %story.key, %transition, "transition declined");
                return Ok(Gate::Declined);
            }
        }

        let to = transition.target_state();
        let accepted_at = if to == StoryState::Accepted {
            Some(story.accepted_at.unwrap_or_else(|| self.clock.now()))
        } else {
            story.accepted_at
        };
        let column = self.column_for_state(to, accepted_at);
        debug!(story = %story.key, from = %story.state, %to, %column, "transition planned");

        Ok(Gate::Proceed(TransitionPlan {
            transition,
            from: story.state,
            to,
            accepted_at,
            column,
        }))
    }

    /// Column a story in `state` belongs to.
    ///
    /// Stories accepted during the current iteration stay in progress until
    /// the iteration ends.
    pub fn column_for_state(
        &self,
        state: StoryState,
        accepted_at: Option<DateTime<Utc>>,
    ) -> ColumnId {
        match state {
            StoryState::Unscheduled => ColumnId::chilly_bin(),
            StoryState::Unstarted => ColumnId::backlog(),
            StoryState::Accepted => {
                let current = self.current_iteration_number();
                match accepted_at {
                    Some(at) if self.iteration_number(at.date_naive()) >= current => {
                        ColumnId::in_progress()
                    }
                    _ => ColumnId::done(),
                }
            }
            _ => ColumnId::in_progress(),
        }
    }

    /// Check an estimate against the story type and the point scale
    pub fn validate_estimate(&self, story: &Story, estimate: Option<u32>) -> Result<()> {
        let Some(points) = estimate else {
            return Ok(());
        };
        if !story.is_estimable() {
            return Err(BoardError::invalid_value(
                "estimate",
                format!("a {} cannot be estimated", story.story_type),
            ));
        }
        if !self.config.point_scale.contains(&points) {
            return Err(BoardError::invalid_value(
                "estimate",
                format!("{} is not on the point scale {:?}", points, self.config.point_scale),
            ));
        }
        Ok(())
    }

    /// 1-based iteration containing `date`; dates before the start fall in iteration 1
    pub fn iteration_number(&self, date: NaiveDate) -> u32 {
        let days = (date - self.config.start_date).num_days();
        let length = self.config.iteration_length().num_days().max(1);
        if days < 0 {
            return 1;
        }
        u32::try_from(days / length).unwrap_or(u32::MAX - 1) + 1
    }

    pub fn current_iteration_number(&self) -> u32 {
        self.iteration_number(self.clock.today())
    }

    /// First day of iteration `number`
    pub fn iteration_start(&self, number: u32) -> NaiveDate {
        self.config.start_date + self.config.iteration_length() * (number.max(1) as i32 - 1)
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl fmt::Debug for WorkflowStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowStateMachine").finish_non_exhaustive()
    }
}
