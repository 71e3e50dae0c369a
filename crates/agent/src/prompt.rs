//! Default prompts and prompt assembly for the tool-calling step.

use loopwright_core::message::Message;
use loopwright_core::tool::ToolRegistry;

pub const SYSTEM_PROMPT: &str = "You are an autonomous assistant that solves tasks step by step using the tools provided. Work on the task until it is complete, then call the `terminate` tool.";

pub const NEXT_STEP_PROMPT: &str = "Decide the next action. Reply with JSON of the form {\"content\": \"<your reasoning>\", \"tool_calls\": [{\"name\": \"<tool>\", \"arguments\": {...}}]}. Use an empty tool_calls list when no tool is needed.";

/// Assemble the prompt handed to the provider for one step.
///
/// Layout: system prompt, tool catalogue, conversation transcript (wire form,
/// one message per line), then the next-step instruction.
pub fn assemble(
    system_prompt: Option<&str>,
    tools: &ToolRegistry,
    messages: &[Message],
    next_step_prompt: Option<&str>,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(system_prompt.unwrap_or(SYSTEM_PROMPT));
    prompt.push_str("\n\n");

    if !tools.is_empty() {
        prompt.push_str("## Tools\n");
        for param in tools.to_params() {
            prompt.push_str(&param.to_string());
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("## Conversation\n");
    for message in messages {
        prompt.push_str(&message.to_value().to_string());
        prompt.push('\n');
    }
    prompt.push('\n');

    prompt.push_str(next_step_prompt.unwrap_or(NEXT_STEP_PROMPT));
    prompt
}
