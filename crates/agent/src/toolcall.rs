//! Tool-calling step: think with the provider, then act through the tools.
//!
//! Each step asks the provider for the next action, appends the assistant
//! turn to the log, runs every requested tool through the registry, and
//! appends one tool-role reply per call. Running a *special* tool (by
//! default `terminate`) finishes the run once the step completes.

use async_trait::async_trait;
use loopwright_core::Result;
use loopwright_core::message::{Message, MessageToolCall};
use loopwright_core::tool::ToolCall;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::prompt;
use crate::step::{AgentStep, StepContext};

/// Summary returned when the provider answered without requesting a tool.
pub const NO_ACTION: &str = "Thinking complete - no action needed";

/// A structured provider reply.
#[derive(Debug, Default, Deserialize)]
pub struct ModelReply {
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub tool_calls: Vec<RequestedCall>,
}

/// One tool invocation requested by the provider.
#[derive(Debug, Deserialize)]
pub struct RequestedCall {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    /// An object, or a string holding JSON
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl RequestedCall {
    fn arguments(&self) -> serde_json::Value {
        match &self.arguments {
            serde_json::Value::String(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| self.arguments.clone())
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        }
    }
}

impl ModelReply {
    /// Parse provider output. Anything that is not the JSON reply shape
    /// (optionally inside a ```json fence) is taken as plain text, including
    /// JSON objects with neither `content` nor `tool_calls`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .map(str::trim)
            .unwrap_or(trimmed);

        if body.starts_with('{')
            && let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(body)
            && (fields.contains_key("content") || fields.contains_key("tool_calls"))
            && let Ok(reply) = serde_json::from_value::<ModelReply>(fields.into())
        {
            return reply;
        }

        ModelReply {
            content: Some(trimmed.to_string()),
            tool_calls: Vec::new(),
        }
    }
}

/// The tool-calling step variant.
pub struct ToolCallStep {
    special_tools: Vec<String>,
    calls_made: u64,
}

impl ToolCallStep {
    pub fn new() -> Self {
        Self {
            special_tools: vec!["terminate".into()],
            calls_made: 0,
        }
    }

    /// Replace the set of tools whose execution finishes the run.
    pub fn with_special_tools(mut self, names: Vec<String>) -> Self {
        self.special_tools = names;
        self
    }

    /// Names match exactly, as in the registry.
    fn is_special(&self, name: &str) -> bool {
        self.special_tools.iter().any(|s| s == name)
    }

    fn next_call_id(&mut self) -> String {
        self.calls_made += 1;
        format!("call_{}", self.calls_made)
    }
}

impl Default for ToolCallStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentStep for ToolCallStep {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        let prompt = prompt::assemble(
            ctx.system_prompt(),
            ctx.tools(),
            ctx.messages(),
            ctx.next_step_prompt(),
        );
        let raw = ctx.provider().generate(&prompt).await?;
        let reply = ModelReply::parse(&raw);
        let content = reply.content.clone().unwrap_or_default();

        if !content.is_empty() {
            ctx.think(content.clone()).await;
        }

        let mut calls = Vec::new();
        for requested in reply.tool_calls {
            if requested.name.is_empty() {
                warn!(step = ctx.step_number(), "Ignoring tool call without a name");
                continue;
            }
            let id = match requested.id.clone().filter(|id| !id.is_empty()) {
                Some(id) => id,
                None => self.next_call_id(),
            };
            calls.push(ToolCall {
                id,
                arguments: requested.arguments(),
                name: requested.name,
            });
        }

        if calls.is_empty() {
            ctx.append(Message::assistant(reply.content)).await;
            return Ok(if content.is_empty() {
                NO_ACTION.to_string()
            } else {
                content
            });
        }

        info!(
            step = ctx.step_number(),
            tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Selected tools"
        );

        let embedded = calls
            .iter()
            .map(|call| MessageToolCall::new(&call.id, &call.name, call.arguments.to_string()))
            .collect();
        ctx.append(Message::from_tool_calls(embedded, content)).await;

        let mut observations = Vec::with_capacity(calls.len());
        let mut special_ran = false;
        for call in &calls {
            let result = ctx.tools().execute_call(call).await;
            debug!(tool = %call.name, error = result.is_error(), "Tool result");

            let observation = format!("Observed output of `{}`:\n{result}", call.name);
            ctx.append(Message::tool(&observation, &call.name, &call.id)?)
                .await;
            observations.push(observation);

            if self.is_special(&call.name) {
                info!(tool = %call.name, "Special tool finished the task");
                special_ran = true;
            }
        }

        if special_ran {
            ctx.finish()?;
        }

        Ok(observations.join("\n\n"))
    }
}
