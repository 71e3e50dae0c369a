//! The agent execution loop.
//!
//! An [`Agent`] drives a pluggable [`AgentStep`] one step at a time:
//!
//! 1. **Reject** the run unless the agent is idle
//! 2. **Record** the optional request as a user message
//! 3. **Step** until the step budget is spent or a step finishes the run
//! 4. **Watch** for repetition after every step, nudging the prompt on each
//!    stuck detection and giving up after too many
//! 5. **Return** the per-step summaries, newline-joined
//!
//! The two budgets (steps and stuck retries) are independent, so the loop
//! terminates no matter how the step behaves.

pub mod loop_runner;
pub mod prompt;
pub mod step;
pub mod toolcall;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{Agent, NO_STEPS_EXECUTED};
pub use step::{AgentStep, StepContext, ToolReply, build_message};
pub use toolcall::{ModelReply, ToolCallStep};
