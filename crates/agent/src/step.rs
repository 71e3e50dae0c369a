//! The per-variant step hook and the context it runs in.
//!
//! The loop owns the budgets and the state; an [`AgentStep`] implementation
//! owns what one unit of work means. Each call receives a [`StepContext`]
//! that lends it the agent's log, tools, provider and notifier for the
//! duration of that step only.

use async_trait::async_trait;
use loopwright_core::agent::AgentConfig;
use loopwright_core::event::{AgentEvent, Notifier, notify_best_effort};
use loopwright_core::memory::Memory;
use loopwright_core::message::{Message, Role};
use loopwright_core::provider::Provider;
use loopwright_core::state::{AgentState, StateGuard};
use loopwright_core::tool::ToolRegistry;
use loopwright_core::{Error, Result};

/// Identity of the tool invocation a tool-role message answers.
#[derive(Debug, Clone)]
pub struct ToolReply {
    pub name: String,
    pub tool_call_id: String,
}

impl ToolReply {
    pub fn new(name: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool_call_id: tool_call_id.into(),
        }
    }
}

/// Build a message from a textual role, rejecting unknown roles.
pub fn build_message(role: &str, content: &str, extra: Option<ToolReply>) -> Result<Message> {
    match role.parse::<Role>()? {
        Role::User => Ok(Message::user(content)),
        Role::System => Ok(Message::system(content)),
        Role::Assistant => Ok(Message::assistant(Some(content.to_string()))),
        Role::Tool => {
            let reply = extra.ok_or_else(|| {
                Error::InvalidMessage("tool message requires a name and tool_call_id".into())
            })?;
            Message::tool(content, reply.name, reply.tool_call_id)
        }
    }
}

/// One unit of agent work.
///
/// Returns a short summary of what the step did. An `Err` is a step fault:
/// the loop records it and stops without retrying.
#[async_trait]
pub trait AgentStep: Send {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<String>;
}

/// Everything a step may touch, borrowed from the agent for one step.
pub struct StepContext<'a> {
    pub(crate) config: &'a AgentConfig,
    pub(crate) memory: &'a mut Memory,
    pub(crate) tools: &'a ToolRegistry,
    pub(crate) provider: &'a dyn Provider,
    pub(crate) notifier: &'a dyn Notifier,
    pub(crate) next_step_prompt: Option<&'a str>,
    pub(crate) guard: &'a StateGuard,
    pub(crate) step: u32,
}

impl<'a> StepContext<'a> {
    pub fn config(&self) -> &AgentConfig {
        self.config
    }

    /// 1-based number of the step being executed.
    pub fn step_number(&self) -> u32 {
        self.step
    }

    pub fn messages(&self) -> &[Message] {
        self.memory.messages()
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.tools
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.config.system_prompt.as_deref()
    }

    /// The forward-looking instruction, including any anti-repetition hint.
    pub fn next_step_prompt(&self) -> Option<&str> {
        self.next_step_prompt
    }

    /// Append a message to the agent's log (observers are notified).
    pub async fn append(&mut self, message: Message) {
        self.memory.append(message).await;
    }

    /// Append a message given a textual role.
    pub async fn update_log(
        &mut self,
        role: &str,
        content: &str,
        extra: Option<ToolReply>,
    ) -> Result<()> {
        let message = build_message(role, content, extra)?;
        self.memory.append(message).await;
        Ok(())
    }

    /// Share intermediate reasoning with whoever is listening.
    pub async fn think(&self, content: impl Into<String>) {
        notify_best_effort(
            self.notifier,
            AgentEvent::Thinking {
                agent: self.config.name.clone(),
                content: content.into(),
            },
        )
        .await;
    }

    /// End the run after this step. Finishing twice is a no-op.
    pub fn finish(&self) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        self.guard.set(AgentState::Finished)
    }

    pub fn is_finished(&self) -> bool {
        self.guard.current() == AgentState::Finished
    }
}
