//! Event sink that reports agent progress on stderr.

use async_trait::async_trait;
use loopwright_core::error::NotifyError;
use loopwright_core::event::{AgentEvent, Notifier};

pub struct ConsoleNotifier {
    json: bool,
}

impl ConsoleNotifier {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn render(&self, event: &AgentEvent) -> Result<Option<String>, NotifyError> {
        if self.json {
            return serde_json::to_string(event)
                .map(Some)
                .map_err(|e| NotifyError::DeliveryFailed(e.to_string()));
        }

        Ok(match event {
            AgentEvent::Progress {
                step, max_steps, ..
            } => Some(format!("  [{step}/{max_steps}]")),
            AgentEvent::Thinking { content, .. } => Some(format!("  thinking: {content}")),
            AgentEvent::Message { message, .. } if message["role"] == "tool" => {
                let content = message["content"].as_str().unwrap_or_default();
                Some(format!("  {}", content.replace('\n', "\n    ")))
            }
            AgentEvent::StateChanged { state, .. } => Some(format!("  state: {state}")),
            AgentEvent::Error { message, .. } => Some(format!("  error: {message}")),
            AgentEvent::Message { .. } | AgentEvent::Result { .. } => None,
        })
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, event: AgentEvent) -> Result<(), NotifyError> {
        if let Some(line) = self.render(&event)? {
            eprintln!("{line}");
        }
        Ok(())
    }
}
