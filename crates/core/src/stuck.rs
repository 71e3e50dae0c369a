//! Stuck detection over the tail of a message log.
//!
//! An agent is stuck when its latest message is a non-empty assistant reply
//! and at least `duplicate_threshold` earlier assistant replies carry exactly
//! the same content. This is a repetition heuristic only: oscillating between
//! a few distinct replies below the threshold goes unnoticed.

use crate::message::{Message, Role};

/// Anti-repetition directive prepended to the next-step prompt.
pub const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid repeating ineffective paths already attempted.";

/// Whether `messages` ends in a repeated assistant reply.
pub fn is_stuck(messages: &[Message], duplicate_threshold: usize) -> bool {
    let Some((last, earlier)) = messages.split_last() else {
        return false;
    };
    if earlier.is_empty() || last.role() != Role::Assistant {
        return false;
    }
    let Some(content) = last.content().filter(|c| !c.is_empty()) else {
        return false;
    };

    let duplicates = earlier
        .iter()
        .rev()
        .filter(|m| m.role() == Role::Assistant && m.content() == Some(content))
        .take(duplicate_threshold)
        .count();

    duplicates >= duplicate_threshold
}
