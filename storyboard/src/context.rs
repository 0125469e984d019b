//! BoardContext - shared collaborators handed to every component
//!
//! Components receive their configuration, clock and transition rules at
//! construction. Nothing is looked up from ambient global state.

use crate::clock::{Clock, SystemClock};
use crate::config::BoardConfig;
use crate::workflow::{StandardRules, TransitionRules};
use std::sync::Arc;

/// Context passed to the board and its components
#[derive(Clone)]
pub struct BoardContext {
    pub config: Arc<BoardConfig>,
    pub clock: Arc<dyn Clock>,
    pub rules: Arc<dyn TransitionRules>,
}

impl BoardContext {
    /// Context with the wall clock and the standard transition table
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            rules: Arc::new(StandardRules),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_rules(mut self, rules: impl TransitionRules + 'static) -> Self {
        self.rules = Arc::new(rules);
        self
    }
}

impl Default for BoardContext {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}

impl std::fmt::Debug for BoardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardContext")
            .field("config", &self.config)
            .field("now", &self.clock.now())
            .finish()
    }
}
