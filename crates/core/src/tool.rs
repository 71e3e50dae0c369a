//! Tool trait and the dispatcher that fronts it.
//!
//! Tools are what give the agent the ability to act in the world. The
//! [`ToolRegistry`] maps unique names to tools and turns every outcome,
//! including unknown names, tool errors and tool panics, into a
//! [`ToolResult`] so the loop never has to handle a raised fault.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{ToolError, panic_message};

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool call id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// Read-only description of a tool, as shown to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema describing accepted arguments
    pub parameters: serde_json::Value,
}

/// The uniform envelope every tool execution returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Out-of-band note for the agent (not shown as output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

fn populated(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn is_error(&self) -> bool {
        populated(&self.error)
    }

    /// True when no field carries anything.
    pub fn is_empty(&self) -> bool {
        !populated(&self.output) && !populated(&self.error) && !populated(&self.system)
    }

    /// Combine two results field by field.
    ///
    /// Each field takes whichever side has it; when both sides populate the
    /// same field the merge is ambiguous and fails.
    pub fn try_merge(self, other: ToolResult) -> Result<ToolResult, ToolError> {
        fn pick(
            field: &'static str,
            left: Option<String>,
            right: Option<String>,
        ) -> Result<Option<String>, ToolError> {
            match (populated(&left), populated(&right)) {
                (true, true) => Err(ToolError::AmbiguousMerge(field)),
                (true, false) => Ok(left),
                (false, true) => Ok(right),
                (false, false) => Ok(left.or(right)),
            }
        }

        Ok(ToolResult {
            output: pick("output", self.output, other.output)?,
            error: pick("error", self.error, other.error)?,
            system: pick("system", self.system, other.system)?,
        })
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.error, &self.output) {
            (Some(error), _) if !error.is_empty() => write!(f, "Error: {error}"),
            (_, Some(output)) => f.write_str(output),
            _ => Ok(()),
        }
    }
}

/// The core Tool trait.
///
/// Tools are registered in the [`ToolRegistry`] and made available to the
/// step logic.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "terminate", "file_saver").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Function-calling shape: `{"type": "function", "function": {...}}`.
    fn to_param(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": self.descriptor(),
        })
    }
}

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    /// Registration order, for stable descriptor listings
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors of all tools, in registration order.
    pub fn definitions(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.descriptor())
            .collect()
    }

    /// All tools in function-calling shape.
    pub fn to_params(&self) -> Vec<serde_json::Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_param())
            .collect()
    }

    /// Execute a tool by name. Never fails: unknown names, tool errors and
    /// panics all come back as a result with `error` set.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Tool not found");
            return ToolResult::failure(ToolError::NotFound(name.to_string()).to_string());
        };

        let start = Instant::now();
        let outcome = AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(result)) => {
                debug!(tool = %name, duration_ms, error = result.is_error(), "Tool executed");
                result
            }
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, duration_ms, "Tool execution failed");
                ToolResult::failure(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = %name, reason = %reason, "Tool panicked");
                ToolResult::failure(
                    ToolError::ExecutionFailed {
                        tool_name: name.to_string(),
                        reason,
                    }
                    .to_string(),
                )
            }
        }
    }

    /// Execute a tool call.
    pub async fn execute_call(&self, call: &ToolCall) -> ToolResult {
        self.execute(&call.name, call.arguments.clone()).await
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
