//! # Loopwright Core
//!
//! Domain types, traits, and error definitions for the Loopwright agent
//! execution core. Everything the step loop touches is defined here: the
//! message log, stuck detection, tool dispatch, the agent state machine,
//! and the two external capabilities it consumes (a text-generating
//! [`Provider`] and an event [`Notifier`]).
//!
//! Implementations of the capabilities live in their own crates; the loop
//! itself lives in `loopwright-agent`.

pub mod error;
pub mod message;
pub mod memory;
pub mod stuck;
pub mod tool;
pub mod state;
pub mod provider;
pub mod event;
pub mod agent;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use memory::{Memory, MessageObserver};
pub use stuck::is_stuck;
pub use tool::{Tool, ToolCall, ToolDescriptor, ToolRegistry, ToolResult};
pub use state::{AgentState, StateGuard, StateMachine};
pub use provider::Provider;
pub use event::{AgentEvent, BroadcastNotifier, NoopNotifier, Notifier, NotifyObserver};
pub use agent::AgentConfig;
