//! Memory: the agent's bounded, observable message log.
//!
//! Appends go to the tail. After every append each registered observer is
//! notified with the new message, sequentially and in registration order.
//! Only once notification is done is the log trimmed from the head back to
//! capacity. A failing observer is logged and skipped; it never blocks the
//! observers after it or the append itself.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::message::Message;

/// Default number of messages kept in the log.
pub const DEFAULT_CAPACITY: usize = 100;

/// Something that wants to hear about every message appended to a [`Memory`].
///
/// Observers only see the message; they cannot mutate the log.
#[async_trait]
pub trait MessageObserver: Send + Sync {
    async fn on_message(&self, message: &Message) -> Result<(), NotifyError>;
}

#[async_trait]
impl<F> MessageObserver for F
where
    F: Fn(&Message) -> Result<(), NotifyError> + Send + Sync,
{
    async fn on_message(&self, message: &Message) -> Result<(), NotifyError> {
        self(message)
    }
}

/// An ordered, capacity-bounded message log with observers.
pub struct Memory {
    messages: Vec<Message>,
    capacity: usize,
    observers: Vec<Arc<dyn MessageObserver>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a log that keeps at most `capacity` messages (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Vec::new(),
            capacity: capacity.max(1),
            observers: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message, notify observers, then trim to capacity.
    pub async fn append(&mut self, message: Message) {
        self.messages.push(message);

        if let Some(latest) = self.messages.last() {
            for (index, observer) in self.observers.iter().enumerate() {
                if let Err(e) = observer.on_message(latest).await {
                    warn!(observer = index, error = %e, "Error in observer");
                }
            }
        }

        if self.messages.len() > self.capacity {
            let excess = self.messages.len() - self.capacity;
            self.messages.drain(..excess);
            debug!(evicted = excess, capacity = self.capacity, "Trimmed message log");
        }
    }

    /// Append several messages one after another.
    pub async fn append_all(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.append(message).await;
        }
    }

    /// Register an observer. Registering the same observer twice is a no-op.
    pub fn register(&mut self, observer: Arc<dyn MessageObserver>) {
        if self.observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return;
        }
        self.observers.push(observer);
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unregister(&mut self, observer: &Arc<dyn MessageObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
        self.observers.len() < before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// The last `n` messages (the whole log when `n` exceeds its length).
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Drop every message. Observers stay registered.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The log in wire form.
    pub fn to_value_list(&self) -> Vec<serde_json::Value> {
        self.messages.iter().map(Message::to_value).collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
