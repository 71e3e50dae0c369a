//! Shared test helpers for loop and step tests.

use loopwright_core::error::ProviderError;
use loopwright_core::message::Message;
use loopwright_core::provider::Provider;
use loopwright_core::{Error, Result};
use std::sync::Mutex;

use crate::step::{AgentStep, StepContext};

/// A provider that answers with the prompt it was given.
pub struct EchoProvider;

#[async_trait::async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        Ok(prompt.to_string())
    }
}

/// A provider that returns a sequence of scripted replies.
///
/// Each call to `generate` returns the next reply in the queue and fails
/// once the queue is exhausted.
pub struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        let mut replies: Vec<String> = replies.into_iter().map(String::from).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt seen so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::GenerationFailed("script exhausted".into()))
    }
}

enum Mode {
    Distinct,
    Repeating(String),
    FinishingAt(u32),
    FailingAt(u32),
    PanickingAt(u32),
}

/// A step with canned behavior that appends one assistant message per call.
pub struct ScriptedStep {
    mode: Mode,
}

impl ScriptedStep {
    /// Every step replies with something new.
    pub fn distinct() -> Self {
        Self { mode: Mode::Distinct }
    }

    /// Every step replies with `text`.
    pub fn repeating(text: &str) -> Self {
        Self {
            mode: Mode::Repeating(text.to_string()),
        }
    }

    /// Signals FINISHED on step `n`.
    pub fn finishing_at(n: u32) -> Self {
        Self {
            mode: Mode::FinishingAt(n),
        }
    }

    /// Faults on step `n`.
    pub fn failing_at(n: u32) -> Self {
        Self {
            mode: Mode::FailingAt(n),
        }
    }

    /// Panics on step `n`.
    pub fn panicking_at(n: u32) -> Self {
        Self {
            mode: Mode::PanickingAt(n),
        }
    }
}

#[async_trait::async_trait]
impl AgentStep for ScriptedStep {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        let n = ctx.step_number();
        let reply = match &self.mode {
            Mode::Repeating(text) => text.clone(),
            Mode::FailingAt(at) if n == *at => {
                return Err(Error::Step(format!("scripted failure at {n}")));
            }
            Mode::PanickingAt(at) if n == *at => {
                let replies: Vec<String> = Vec::new();
                replies[n as usize].clone()
            }
            Mode::FinishingAt(at) if n == *at => {
                ctx.finish()?;
                "done".to_string()
            }
            _ => format!("reply {n}"),
        };
        ctx.append(Message::assistant(Some(reply.clone()))).await;
        Ok(reply)
    }
}
