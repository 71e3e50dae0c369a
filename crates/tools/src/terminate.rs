//! The `terminate` tool: the model's way of saying the task is over.
//!
//! Running it only reports the status back. Ending the run is up to the
//! step, which treats `terminate` as a special tool.

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        "terminate"
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let status = arguments["status"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'status' argument".into()))?;

        if !matches!(status, "success" | "failure") {
            return Err(ToolError::InvalidArguments(format!(
                "Unknown status '{status}', expected 'success' or 'failure'"
            )));
        }

        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}
