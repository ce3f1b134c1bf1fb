//! Per-user conversation memory.
//!
//! Keeps an ordered log of (question, answer) turns for each user, used
//! verbatim as short-term context for the next generation call. Logs are
//! process-held only: nothing survives a restart.
//!
//! Growth is bounded by a sliding window of the most recent `max_turns`
//! turns per user; older turns are evicted on append. Concurrent appends
//! for the same user are last-write-wins, which is accepted for this
//! design.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::ChatTurn;

/// Default sliding-window size, in turns per user.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Thread-safe store of per-user conversation logs.
pub struct ConversationMemory {
    turns: RwLock<HashMap<String, Vec<ChatTurn>>>,
    max_turns: usize,
}

impl ConversationMemory {
    /// Create a store keeping at most `max_turns` turns per user
    /// (clamped to at least 1).
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    /// The user's turns, oldest first. A user never seen before simply
    /// has an empty history; no registration step exists.
    pub fn history(&self, username: &str) -> Vec<ChatTurn> {
        self.turns
            .read()
            .unwrap()
            .get(username)
            .cloned()
            .unwrap_or_default()
    }

    /// Append one turn to the user's log, evicting the oldest turns
    /// beyond the window.
    pub fn append(&self, username: &str, input: &str, output: &str) {
        let mut turns = self.turns.write().unwrap();
        let log = turns.entry(username.to_string()).or_default();
        log.push(ChatTurn {
            input: input.to_string(),
            output: output.to_string(),
        });
        if log.len() > self.max_turns {
            let excess = log.len() - self.max_turns;
            log.drain(..excess);
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}
