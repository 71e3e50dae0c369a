//! The agent execution loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use loopwright_core::agent::AgentConfig;
use loopwright_core::event::{AgentEvent, NoopNotifier, Notifier, NotifyObserver, notify_best_effort};
use loopwright_core::memory::{Memory, MessageObserver};
use loopwright_core::message::Message;
use loopwright_core::provider::Provider;
use loopwright_core::state::{AgentState, StateMachine};
use loopwright_core::stuck::{self, STUCK_PROMPT};
use loopwright_core::tool::ToolRegistry;
use loopwright_core::error::panic_message;
use loopwright_core::{Error, Result};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::step::{AgentStep, StepContext, ToolReply, build_message};

/// Returned by [`Agent::run`] when the loop produced nothing.
pub const NO_STEPS_EXECUTED: &str = "No steps executed";

/// One agent: a message log, a state, step budgets, and a pluggable step.
///
/// `run` takes `&mut self`, so a single agent can never be driven by two
/// loops at once. Independent agents share nothing but what is explicitly
/// handed to them (a provider, a tool registry, a notifier).
pub struct Agent {
    config: AgentConfig,
    memory: Memory,
    states: StateMachine,
    current_step: u32,
    next_step_prompt: Option<String>,
    tools: Arc<ToolRegistry>,
    provider: Arc<dyn Provider>,
    notifier: Arc<dyn Notifier>,
    forwarder: Option<Arc<dyn MessageObserver>>,
    logic: Box<dyn AgentStep>,
}

impl Agent {
    /// Create an agent with no tools and a silent notifier.
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn Provider>,
        logic: Box<dyn AgentStep>,
    ) -> Self {
        Self {
            memory: Memory::with_capacity(config.memory_capacity),
            next_step_prompt: config.next_step_prompt.clone(),
            config,
            states: StateMachine::new(),
            current_step: 0,
            tools: Arc::new(ToolRegistry::new()),
            provider,
            notifier: Arc::new(NoopNotifier),
            forwarder: None,
            logic,
        }
    }

    /// Set the tool registry.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Send events to `notifier`, including every message appended to the log.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        if let Some(old) = self.forwarder.take() {
            self.memory.unregister(&old);
        }
        let forwarder: Arc<dyn MessageObserver> =
            Arc::new(NotifyObserver::new(self.config.name.clone(), notifier.clone()));
        self.memory.register(forwarder.clone());
        self.forwarder = Some(forwarder);
        self.notifier = notifier;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn current_state(&self) -> AgentState {
        self.states.current()
    }

    /// Watch state transitions, including a transient `ERROR`.
    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.states.subscribe()
    }

    /// A handle on this agent's state, for monitors.
    pub fn state_machine(&self) -> StateMachine {
        self.states.clone()
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn next_step_prompt(&self) -> Option<&str> {
        self.next_step_prompt.as_deref()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn messages(&self) -> &[Message] {
        self.memory.messages()
    }

    /// Append a message given a textual role (`user`, `system`, `assistant`, `tool`).
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

    /// Whether the latest reply repeats earlier ones often enough to count as stuck.
    pub fn is_stuck(&self) -> bool {
        stuck::is_stuck(self.memory.messages(), self.config.duplicate_threshold)
    }

    fn handle_stuck_state(&mut self) {
        self.next_step_prompt = Some(match self.next_step_prompt.take() {
            Some(prompt) => format!("{STUCK_PROMPT}\n{prompt}"),
            None => STUCK_PROMPT.to_string(),
        });
        warn!(agent = %self.config.name, "Agent detected stuck state, added anti-repetition prompt");
    }

    /// Tear down a session: clear the log, zero the step counter, restore the
    /// configured next-step prompt, and return a finished agent to `IDLE`.
    pub fn reset(&mut self) -> Result<()> {
        self.states.reset()?;
        self.memory.clear();
        self.current_step = 0;
        self.next_step_prompt = self.config.next_step_prompt.clone();
        Ok(())
    }

    async fn emit(&self, event: AgentEvent) {
        notify_best_effort(self.notifier.as_ref(), event).await;
    }

    /// Run the loop until the step budget is spent, the step finishes the
    /// run, the agent gets stuck too often, or a step faults.
    ///
    /// Returns the newline-joined per-step summaries.
    pub async fn run(&mut self, request: Option<&str>) -> Result<String> {
        let state = self.states.current();
        if state != AgentState::Idle {
            return Err(Error::InvalidState(state));
        }

        if let Some(request) = request.filter(|r| !r.is_empty()) {
            self.memory.append(Message::user(request)).await;
        }

        let states = self.states.clone();
        let guard = states.enter(AgentState::Running)?;
        self.emit(AgentEvent::StateChanged {
            agent: self.config.name.clone(),
            state: AgentState::Running,
        })
        .await;

        let max_steps = self.config.max_steps;
        let mut results: Vec<String> = Vec::new();
        let mut stuck_count: u32 = 0;

        while self.current_step < max_steps && guard.current() != AgentState::Finished {
            self.current_step += 1;
            let step = self.current_step;
            info!(agent = %self.config.name, step, max_steps, "Executing step {step}/{max_steps}");
            self.emit(AgentEvent::Progress {
                agent: self.config.name.clone(),
                step,
                max_steps,
            })
            .await;

            let outcome = {
                let mut ctx = StepContext {
                    config: &self.config,
                    memory: &mut self.memory,
                    tools: self.tools.as_ref(),
                    provider: self.provider.as_ref(),
                    notifier: self.notifier.as_ref(),
                    next_step_prompt: self.next_step_prompt.as_deref(),
                    guard: &guard,
                    step,
                };
                AssertUnwindSafe(self.logic.step(&mut ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(Error::Step(format!(
                            "step panicked: {}",
                            panic_message(panic.as_ref())
                        )))
                    })
            };

            match outcome {
                Ok(summary) => {
                    if self.is_stuck() {
                        stuck_count += 1;
                        if stuck_count >= self.config.max_stuck_retries {
                            warn!(
                                agent = %self.config.name,
                                step,
                                stuck_count,
                                "Agent appears to be stuck, terminating execution"
                            );
                            break;
                        }
                        self.handle_stuck_state();
                    } else {
                        stuck_count = 0;
                    }
                    debug!(step, summary = %summary, "Step complete");
                    results.push(format!("Step {step}: {summary}"));
                }
                Err(e) => {
                    let message = format!("Error in step {step}: {e}");
                    error!(agent = %self.config.name, step, error = %e, "Step failed");
                    self.emit(AgentEvent::Error {
                        agent: self.config.name.clone(),
                        message: message.clone(),
                    })
                    .await;
                    results.push(message);
                    break;
                }
            }
        }

        if guard.current() == AgentState::Finished {
            self.current_step = 0;
        } else if self.current_step >= max_steps {
            self.current_step = 0;
            guard.set(AgentState::Idle)?;
            info!(agent = %self.config.name, max_steps, "Reached max steps");
            results.push(format!("Terminated: Reached max steps ({max_steps})"));
        }

        drop(guard);
        let final_state = self.states.current();
        self.emit(AgentEvent::StateChanged {
            agent: self.config.name.clone(),
            state: final_state,
        })
        .await;

        let output = if results.is_empty() {
            NO_STEPS_EXECUTED.to_string()
        } else {
            results.join("\n")
        };
        self.emit(AgentEvent::Result {
            agent: self.config.name.clone(),
            content: output.clone(),
        })
        .await;

        Ok(output)
    }
}
