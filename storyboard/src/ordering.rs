//! Drop resolution
//!
//! Turns a drop into one ordering instruction relative to an existing story.
//! Works over model state only: the neighbours come from the board's own
//! column order, never from presentation state.

use crate::config::BoardConfig;
use crate::error::{BoardError, Result};
use crate::types::{ColumnId, Story, StoryKey, StoryState};
use serde::Serialize;
use tracing::{debug, error};

/// Where a story landed: its new neighbours within the target column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropContext {
    pub story: StoryKey,
    pub previous: Option<StoryKey>,
    pub next: Option<StoryKey>,
    pub column: ColumnId,
}

/// How the dropped story must be repositioned in the global order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "anchor", rename_all = "snake_case")]
pub enum OrderingInstruction {
    MoveAfter(StoryKey),
    MoveBefore(StoryKey),
    /// The story is alone on the board
    NoOp,
}

/// Compute the ordering instruction for a drop.
///
/// `stories` is the board in global order. When the target column had no
/// neighbours, the last story of the columns displayed before it and the
/// first story of the columns displayed after it are the candidates. A board
/// with more than one story that yields no anchor at all is inconsistent.
pub fn resolve(
    ctx: &DropContext,
    config: &BoardConfig,
    stories: &[Story],
) -> Result<OrderingInstruction> {
    if let Some(previous) = &ctx.previous {
        return Ok(OrderingInstruction::MoveAfter(previous.clone()));
    }
    if let Some(next) = &ctx.next {
        return Ok(OrderingInstruction::MoveBefore(next.clone()));
    }

    let before = config.columns_before(&ctx.column);
    let after = config.columns_after(&ctx.column);
    let others = || stories.iter().filter(|s| s.key != ctx.story);

    if let Some(anchor) = others().filter(|s| before.contains(&s.column)).last() {
        debug!(story = %ctx.story, column = %ctx.column, anchor = %anchor.key, "empty column drop, after earlier column");
        return Ok(OrderingInstruction::MoveAfter(anchor.key.clone()));
    }
    if let Some(anchor) = others().find(|s| after.contains(&s.column)) {
        debug!(story = %ctx.story, column = %ctx.column, anchor = %anchor.key, "empty column drop, before later column");
        return Ok(OrderingInstruction::MoveBefore(anchor.key.clone()));
    }

    if stories.len() == 1 {
        return Ok(OrderingInstruction::NoOp);
    }

    error!(
        story = %ctx.story,
        column = %ctx.column,
        stories = stories.len(),
        "unable to determine previous or next story for drop"
    );
    Err(BoardError::ordering(format!(
        "no neighbour found for story '{}' dropped into '{}' on a board of {} stories",
        ctx.story,
        ctx.column,
        stories.len()
    )))
}

/// State implied by dropping a story in `column`, if it differs from `current`.
///
/// Backlog means unstarted, as does pulling an unscheduled story straight
/// into progress. The chilly bin means unscheduled.
pub fn forced_state(column: &ColumnId, current: StoryState) -> Option<StoryState> {
    let forced = match column.as_str() {
        ColumnId::BACKLOG => StoryState::Unstarted,
        ColumnId::IN_PROGRESS if current == StoryState::Unscheduled => StoryState::Unstarted,
        ColumnId::CHILLY_BIN => StoryState::Unscheduled,
        _ => return None,
    };
    (forced != current).then_some(forced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, Ordinal, StoryRecord};

    fn spec_config() -> BoardConfig {
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

    fn board(columns: &[ColumnId]) -> Vec<Story> {
        let mut ordinal = Ordinal::first();
        columns
            .iter()
            .map(|column| {
                let story = Story::from_record(StoryRecord::new("s"), column.clone(), ordinal.clone());
                ordinal = Ordinal::after(&ordinal);
                story
            })
            .collect()
    }

    fn drop_into(story: &StoryKey, column: ColumnId) -> DropContext {
        DropContext {
            story: story.clone(),
            previous: None,
            next: None,
            column,
        }
    }

    #[test]
    fn test_prefers_previous() {
        let stories = board(&[ColumnId::backlog(), ColumnId::backlog(), ColumnId::backlog()]);
        let ctx = DropContext {
            story: stories[2].key.clone(),
            previous: Some(stories[0].key.clone()),
            next: Some(stories[1].key.clone()),
            column: ColumnId::backlog(),
        };
        assert_eq!(
            resolve(&ctx, &spec_config(), &stories).unwrap(),
            OrderingInstruction::MoveAfter(stories[0].key.clone())
        );
    }

    #[test]
    fn test_only_next() {
        let stories = board(&[ColumnId::backlog(), ColumnId::backlog()]);
        let ctx = DropContext {
            next: Some(stories[0].key.clone()),
            ..drop_into(&stories[1].key, ColumnId::backlog())
        };
        assert_eq!(
            resolve(&ctx, &spec_config(), &stories).unwrap(),
            OrderingInstruction::MoveBefore(stories[0].key.clone())
        );
    }

    #[test]
    fn test_empty_backlog_moves_after_last_of_earlier_column() {
        // chilly_bin is before backlog, in_progress after it
        let stories = board(&[
            ColumnId::chilly_bin(),
            ColumnId::chilly_bin(),
            ColumnId::in_progress(),
            ColumnId::done(),
        ]);
        let dragged = stories[3].key.clone();
        let instruction =
            resolve(&drop_into(&dragged, ColumnId::backlog()), &spec_config(), &stories).unwrap();
        assert_eq!(instruction, OrderingInstruction::MoveAfter(stories[1].key.clone()));
    }

    #[test]
    fn test_empty_column_with_only_later_stories() {
        let stories = board(&[ColumnId::in_progress(), ColumnId::done()]);
        let dragged = stories[1].key.clone();
        let instruction =
            resolve(&drop_into(&dragged, ColumnId::chilly_bin()), &spec_config(), &stories)
                .unwrap();
        assert_eq!(instruction, OrderingInstruction::MoveBefore(stories[0].key.clone()));
    }

    #[test]
    fn test_dragged_story_is_never_its_own_anchor() {
        let stories = board(&[ColumnId::chilly_bin(), ColumnId::done()]);
        let dragged = stories[0].key.clone();
        let instruction =
            resolve(&drop_into(&dragged, ColumnId::backlog()), &spec_config(), &stories).unwrap();
        assert_eq!(instruction, OrderingInstruction::MoveBefore(stories[1].key.clone()));
    }

    #[test]
    fn test_single_story_board_is_noop() {
        let stories = board(&[ColumnId::backlog()]);
        let dragged = stories[0].key.clone();
        let instruction =
            resolve(&drop_into(&dragged, ColumnId::in_progress()), &spec_config(), &stories)
                .unwrap();
        assert_eq!(instruction, OrderingInstruction::NoOp);
    }

    #[test]
    fn test_inconsistent_board_is_an_error() {
        // Two stories, but the other one sits in a column the config doesn't know
        let stories = board(&[ColumnId::backlog(), ColumnId::from("archive")]);
        let dragged = stories[0].key.clone();
        let err = resolve(&drop_into(&dragged, ColumnId::backlog()), &spec_config(), &stories)
            .unwrap_err();
        assert!(matches!(err, BoardError::OrderingInvariant { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_forced_state() {
        use StoryState::*;
        assert_eq!(forced_state(&ColumnId::backlog(), Started), Some(Unstarted));
        assert_eq!(forced_state(&ColumnId::backlog(), Unstarted), None);
        assert_eq!(forced_state(&ColumnId::in_progress(), Unscheduled), Some(Unstarted));
        assert_eq!(forced_state(&ColumnId::in_progress(), Finished), None);
        assert_eq!(forced_state(&ColumnId::chilly_bin(), Unstarted), Some(Unscheduled));
        assert_eq!(forced_state(&ColumnId::done(), Unscheduled), None);
    }
}
