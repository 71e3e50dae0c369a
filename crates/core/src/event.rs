//! Agent events and the notification sink.
//!
//! Events describe what an agent is doing for whoever is listening (a UI, a
//! log shipper, a test). Delivery is best effort: a failed `notify` is logged
//! by the caller and never interrupts the agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::NotifyError;
use crate::memory::MessageObserver;
use crate::message::Message;
use crate::state::AgentState;

/// Events emitted by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A step is about to execute.
    Progress {
        agent: String,
        step: u32,
        max_steps: u32,
    },

    /// Free-form reasoning text.
    Thinking { agent: String, content: String },

    /// A message was appended to the agent's log (wire form).
    Message {
        agent: String,
        message: serde_json::Value,
    },

    /// The agent's state changed.
    StateChanged { agent: String, state: AgentState },

    /// `run()` returned.
    Result { agent: String, content: String },

    /// Something went wrong.
    Error { agent: String, message: String },
}

impl AgentEvent {
    /// Short event name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Thinking { .. } => "thinking",
            Self::Message { .. } => "message",
            Self::StateChanged { .. } => "state_changed",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }
}

/// A sink for agent events.
///
/// One sink may be shared by many agents running concurrently, so
/// implementations must tolerate concurrent delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: AgentEvent) -> Result<(), NotifyError>;
}

/// Drops every event.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: AgentEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// A broadcast-based notifier.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Publishing with
/// no subscribers is not an error.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl BroadcastNotifier {
    /// Create a new notifier with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, event: AgentEvent) -> Result<(), NotifyError> {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
        Ok(())
    }
}

/// Forward a notification, logging instead of failing.
pub async fn notify_best_effort(notifier: &dyn Notifier, event: AgentEvent) {
    let kind = event.event_type();
    if let Err(e) = notifier.notify(event).await {
        warn!(event = kind, error = %e, "Notification failed");
    }
}

/// Memory observer that forwards every appended message to a [`Notifier`].
pub struct NotifyObserver {
    agent: String,
    notifier: Arc<dyn Notifier>,
}

impl NotifyObserver {
    pub fn new(agent: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            agent: agent.into(),
            notifier,
        }
    }
}

#[async_trait]
impl MessageObserver for NotifyObserver {
    async fn on_message(&self, message: &Message) -> Result<(), NotifyError> {
        self.notifier
            .notify(AgentEvent::Message {
                agent: self.agent.clone(),
                message: message.to_value(),
            })
            .await
    }
}
