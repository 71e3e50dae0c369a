//! Agent configuration.

use serde::{Deserialize, Serialize};

use crate::memory::DEFAULT_CAPACITY;

/// Limits and prompts for one agent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name, used in events and logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Hard ceiling on steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Earlier identical assistant replies needed to call the agent stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// Stuck detections tolerated before the run is abandoned
    #[serde(default = "default_max_stuck_retries")]
    pub max_stuck_retries: u32,

    /// Message log capacity
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// System-level instruction prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Prompt for determining the next action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,
}

fn default_name() -> String {
    "agent".into()
}
fn default_max_steps() -> u32 {
    10
}
fn default_duplicate_threshold() -> usize {
    2
}
fn default_max_stuck_retries() -> u32 {
    3
}
fn default_memory_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            max_stuck_retries: default_max_stuck_retries(),
            memory_capacity: default_memory_capacity(),
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}
