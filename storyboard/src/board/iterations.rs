//! Iteration grouping for velocity tracking
//!
//! Iterations are derived from the story set on demand and never persisted.

use crate::types::{ColumnId, Story, StoryKey, StoryState};
use crate::workflow::WorkflowStateMachine;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// A time box of stories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Iteration {
    pub number: u32,
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
    /// Column the iteration is displayed in
    pub column: ColumnId,
    pub stories: Vec<StoryKey>,
    pub points: u32,
}

impl Iteration {
    fn new(number: u32, column: ColumnId, workflow: &WorkflowStateMachine) -> Self {
        let start = workflow.iteration_start(number);
        Self {
            number,
            start,
            end: start + workflow.config().iteration_length(),
            column,
            stories: Vec::new(),
            points: 0,
        }
    }

    fn push(&mut self, story: &Story) {
        self.stories.push(story.key.clone());
        self.points += story.points();
    }
}

/// Group `stories` (in global order) into done, current and planned iterations.
///
/// Done iterations hold stories accepted before the current iteration, keyed
/// by the iteration their acceptance falls in. The current iteration holds
/// the in-progress column. Backlog stories fill future iterations up to the
/// velocity; a story bigger than the velocity gets an iteration to itself.
pub(crate) fn build(stories: &[Story], workflow: &WorkflowStateMachine) -> Vec<Iteration> {
    let current_number = workflow.current_iteration_number();
    let velocity = workflow.config().default_velocity.max(1);

    let mut done: BTreeMap<u32, Iteration> = BTreeMap::new();
    let mut current = Iteration::new(current_number, ColumnId::in_progress(), workflow);
    let mut planned: Vec<Iteration> = Vec::new();

    for story in stories {
        match story.column.as_str() {
            ColumnId::DONE => {
                if story.state != StoryState::Accepted {
                    continue;
                }
                let Some(accepted_at) = story.accepted_at else {
                    continue;
                };
                let number = workflow.iteration_number(accepted_at.date_naive());
                done.entry(number)
                    .or_insert_with(|| Iteration::new(number, ColumnId::done(), workflow))
                    .push(story);
            }
            ColumnId::IN_PROGRESS => current.push(story),
            ColumnId::BACKLOG => {
                let fits = planned
                    .last()
                    .is_some_and(|it| it.points + story.points() <= velocity || it.points == 0);
                if !fits {
                    let number = current_number + planned.len() as u32 + 1;
                    planned.push(Iteration::new(number, ColumnId::backlog(), workflow));
                }
                if let Some(iteration) = planned.last_mut() {
                    iteration.push(story);
                }
            }
            _ => {}
        }
    }

    let mut iterations: Vec<Iteration> = done.into_values().collect();
    iterations.push(current);
    iterations.extend(planned);
    iterations
}
