//! End-to-end properties of the agent loop, exercised through the public API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use loopwright_agent::{Agent, AgentStep, NO_STEPS_EXECUTED, StepContext, ToolCallStep};
use loopwright_core::agent::AgentConfig;
use loopwright_core::error::{NotifyError, ProviderError};
use loopwright_core::event::BroadcastNotifier;
use loopwright_core::memory::{Memory, MessageObserver};
use loopwright_core::message::{Message, Role};
use loopwright_core::provider::Provider;
use loopwright_core::state::{AgentState, StateMachine};
use loopwright_core::tool::ToolRegistry;
use loopwright_core::{Error, Result};

// ── Scripted collaborators ──────────────────────────────────────────────

/// Returns canned replies in order, then fails.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _prompt: &str) -> std::result::Result<String, ProviderError> {
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::GenerationFailed("no more replies".into()))
    }
}

/// Appends the same assistant reply every step.
struct Parrot(&'static str);

#[async_trait]
impl AgentStep for Parrot {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        ctx.append(Message::assistant(Some(self.0.to_string())))
            .await;
        Ok(self.0.to_string())
    }
}

/// Appends a fresh assistant reply every step.
struct Counter;

#[async_trait]
impl AgentStep for Counter {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        let text = format!("progress {}", ctx.step_number());
        ctx.append(Message::assistant(Some(text.clone()))).await;
        Ok(text)
    }
}

/// Faults on the given step.
struct FaultAt(u32);

#[async_trait]
impl AgentStep for FaultAt {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        if ctx.step_number() == self.0 {
            return Err(Error::Step("disk on fire".into()));
        }
        Ok("fine".into())
    }
}

/// Indexes past the end of an empty list on the given step.
struct OutOfBounds(u32);

#[async_trait]
impl AgentStep for OutOfBounds {
    async fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<String> {
        let found: Vec<String> = Vec::new();
        if ctx.step_number() == self.0 {
            return Ok(found[0].clone());
        }
        Ok("fine".into())
    }
}

fn config(max_steps: u32) -> AgentConfig {
    AgentConfig {
        max_steps,
        ..AgentConfig::default()
    }
}

fn agent_with(config: AgentConfig, step: impl AgentStep + 'static) -> Agent {
    Agent::new(config, Arc::new(ScriptedProvider::new(&[])), Box::new(step))
}

// ── State ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_rejected_while_another_run_holds_the_state() {
    let mut agent = agent_with(config(3), Counter);
    let monitor = agent.state_machine();
    let held = monitor.enter(AgentState::Running).unwrap();

    let err = agent.run(Some("hello")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(AgentState::Running)));
    assert!(agent.messages().is_empty(), "rejected run has no side effects");

    drop(held);
    assert_eq!(agent.current_state(), AgentState::Idle);
    assert!(agent.run(Some("hello")).await.is_ok());
}

#[tokio::test]
async fn run_rejected_after_finish_until_reset() {
    let provider = ScriptedProvider::new(&[
        r#"{"tool_calls":[{"name":"terminate","arguments":{"status":"success"}}]}"#,
    ]);
    let mut agent = Agent::new(config(5), Arc::new(provider), Box::new(ToolCallStep::new()))
        .with_tools(Arc::new(loopwright_tools::default_registry(".")));

    agent.run(Some("stop right away")).await.unwrap();
    assert_eq!(agent.current_state(), AgentState::Finished);

    let err = agent.run(None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(AgentState::Finished)));

    agent.reset().unwrap();
    assert_eq!(agent.current_state(), AgentState::Idle);
}

#[tokio::test]
async fn faulted_scope_reverts_to_prior_state() {
    let machine = StateMachine::new();
    let mut watcher = machine.subscribe();

    let outcome: Result<()> = machine
        .scoped(AgentState::Running, async {
            Err(Error::Step("boom".into()))
        })
        .await;
    assert!(outcome.is_err());

    // The watcher saw transitions; the resting state is the one held before entry.
    assert!(watcher.has_changed().unwrap());
    assert_eq!(*watcher.borrow_and_update(), AgentState::Idle);
    assert_eq!(machine.current(), AgentState::Idle);
}

// ── Step budget ─────────────────────────────────────────────────────────

#[tokio::test]
async fn exactly_k_steps_then_idle() {
    for k in [1u32, 3, 7] {
        let mut agent = agent_with(config(k), Counter);
        let output = agent.run(None).await.unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len() as u32, k + 1);
        assert_eq!(lines[0], "Step 1: progress 1");
        assert_eq!(lines[k as usize], format!("Terminated: Reached max steps ({k})"));
        assert_eq!(agent.current_step(), 0);
        assert_eq!(agent.current_state(), AgentState::Idle);
    }
}

#[tokio::test]
async fn step_fault_is_recorded_and_stops_the_loop() {
    let mut agent = agent_with(config(10), FaultAt(3));
    let output = agent.run(None).await.unwrap();

    assert_eq!(
        output,
        "Step 1: fine\nStep 2: fine\nError in step 3: Step failed: disk on fire"
    );
    assert_eq!(agent.current_state(), AgentState::Idle);
}

#[tokio::test]
async fn panicking_step_is_recorded_not_propagated() {
    let mut agent = agent_with(config(5), OutOfBounds(2));
    let output = agent.run(Some("go")).await.unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Step 1: fine");
    assert!(lines[1].starts_with("Error in step 2: Step failed: step panicked:"));
    assert_eq!(agent.current_state(), AgentState::Idle);
}

// ── Stuck detection ─────────────────────────────────────────────────────

#[tokio::test]
async fn stuck_from_third_identical_reply() {
    let mut agent = agent_with(config(10), Counter);
    for expected in [false, false, true, true] {
        agent.update_log("assistant", "same", None).await.unwrap();
        assert_eq!(agent.is_stuck(), expected);
    }
}

#[tokio::test]
async fn three_stuck_detections_abort_the_run() {
    let mut agent = agent_with(config(50), Parrot("I will try again"));
    let output = agent.run(Some("do it")).await.unwrap();

    // Steps 3, 4 and 5 are stuck; the fifth step's summary is never recorded.
    assert_eq!(output.lines().count(), 4);
    assert!(!output.contains("Terminated"));
    assert_eq!(agent.current_step(), 5);
    assert_eq!(agent.current_state(), AgentState::Idle);
}

#[tokio::test]
async fn stuck_ceiling_is_independent_of_max_steps() {
    let mut agent = agent_with(
        AgentConfig {
            max_steps: 1000,
            max_stuck_retries: 1,
            ..AgentConfig::default()
        },
        Parrot("again"),
    );
    agent.run(None).await.unwrap();
    assert_eq!(agent.current_step(), 3);
}

// ── Memory ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn capacity_evicts_oldest() {
    let capacity = 10;
    let mut memory = Memory::with_capacity(capacity);
    for i in 0..capacity + 5 {
        memory.append(Message::user(format!("m{i}"))).await;
    }

    assert_eq!(memory.len(), capacity);
    let contents: Vec<&str> = memory.messages().iter().filter_map(|m| m.content()).collect();
    let expected: Vec<String> = (5..capacity + 5).map(|i| format!("m{i}")).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn failing_observer_does_not_block_others() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let mut memory = Memory::new();
    let failing: Arc<dyn MessageObserver> =
        Arc::new(|_: &Message| -> std::result::Result<(), NotifyError> {
            Err(NotifyError::ObserverFailed("socket closed".into()))
        });
    let recording: Arc<dyn MessageObserver> =
        Arc::new(move |m: &Message| -> std::result::Result<(), NotifyError> {
            sink.lock().unwrap().push(m.content().unwrap_or_default().to_string());
            Ok(())
        });
    memory.register(failing);
    memory.register(recording);

    memory.append(Message::user("one")).await;
    memory.append(Message::user("two")).await;

    assert_eq!(memory.len(), 2);
    assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
}

#[test]
fn message_constructors() {
    let msg = Message::user("x");
    assert_eq!(msg.content(), Some("x"));
    assert_eq!(msg.role().as_str(), "user");

    let tool = Message::tool("42", "calc", "call_1").unwrap();
    assert_eq!(tool.name(), Some("calc"));
    assert_eq!(tool.tool_call_id(), Some("call_1"));
    assert!(Message::tool("42", "", "call_1").is_err());
    assert!(Message::tool("42", "calc", "").is_err());
}

// ── Dispatcher ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unregistered_tool_is_an_error_result() {
    let registry = ToolRegistry::new();
    let result = registry
        .execute("browser_use", serde_json::json!({}))
        .await;
    assert!(result.is_error());
    assert!(result.output.is_none());
}

// ── Tool-calling agent ──────────────────────────────────────────────────

#[tokio::test]
async fn tool_calling_run_saves_file_and_finishes() {
    let workspace = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&[
        r#"{"content":"Saving the notes","tool_calls":[{"name":"file_saver","arguments":{"path":"notes/today.txt","content":"buy milk"}}]}"#,
        "```json\n{\"content\":\"All done\",\"tool_calls\":[{\"name\":\"terminate\",\"arguments\":{\"status\":\"success\"}}]}\n```",
    ]);
    let notifier = Arc::new(BroadcastNotifier::new(128));
    let mut events = notifier.subscribe();

    let mut agent = Agent::new(config(10), Arc::new(provider), Box::new(ToolCallStep::new()))
        .with_tools(Arc::new(loopwright_tools::default_registry(workspace.path())))
        .with_notifier(notifier);

    let output = agent.run(Some("write down: buy milk")).await.unwrap();

    assert_eq!(agent.current_state(), AgentState::Finished);
    assert_eq!(agent.current_step(), 0);
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("notes/today.txt")).unwrap(),
        "buy milk"
    );
    assert!(output.starts_with("Step 1: Observed output of `file_saver`:"));
    assert!(output.contains("The interaction has been completed with status: success"));

    let roles: Vec<Role> = agent.messages().iter().map(|m| m.role()).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant, Role::Tool]
    );
    let saver_reply = &agent.messages()[2];
    assert_eq!(saver_reply.name(), Some("file_saver"));
    assert_eq!(
        saver_reply.tool_call_id(),
        agent.messages()[1].tool_calls().first().map(|c| c.id.as_str())
    );

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.event_type());
    }
    assert_eq!(kinds.first(), Some(&"message"));
    assert_eq!(kinds.last(), Some(&"result"));
    assert_eq!(kinds.iter().filter(|k| **k == "thinking").count(), 2);
}

#[tokio::test]
async fn two_terminate_calls_in_one_reply() {
    let provider = ScriptedProvider::new(&[
        r#"{"content":"done twice","tool_calls":[{"name":"terminate","arguments":{"status":"success"}},{"name":"terminate","arguments":{"status":"failure"}}]}"#,
    ]);
    let mut agent = Agent::new(config(5), Arc::new(provider), Box::new(ToolCallStep::new()))
        .with_tools(Arc::new(loopwright_tools::default_registry(".")));

    let output = agent.run(Some("stop")).await.unwrap();

    assert!(output.starts_with("Step 1: "));
    assert!(output.contains("status: success"));
    assert!(output.contains("status: failure"));
    assert!(!output.contains("Error in step"));
    assert_eq!(agent.current_state(), AgentState::Finished);
    assert_eq!(agent.current_step(), 0);
}

#[tokio::test]
async fn unknown_tool_then_provider_failure() {
    let provider = ScriptedProvider::new(&[
        r#"{"content":"Let me browse","tool_calls":[{"name":"browser_use","arguments":{"url":"https://example.com"}}]}"#,
    ]);
    let mut agent = Agent::new(config(10), Arc::new(provider), Box::new(ToolCallStep::new()))
        .with_tools(Arc::new(loopwright_tools::default_registry(".")));

    let output = agent.run(Some("look something up")).await.unwrap();

    let tool_reply = agent
        .messages()
        .iter()
        .find(|m| m.role() == Role::Tool)
        .unwrap();
    assert!(tool_reply.content().unwrap().contains("Tool not found: browser_use"));
    assert!(output.contains("Error in step 2:"));
    assert!(output.contains("no more replies"));
    assert_eq!(agent.current_state(), AgentState::Idle);
}

#[tokio::test]
async fn text_reply_does_not_finish() {
    let provider = ScriptedProvider::new(&["Thinking about it", "Still thinking"]);
    let mut agent = Agent::new(config(2), Arc::new(provider), Box::new(ToolCallStep::new()));

    let output = agent.run(Some("ponder")).await.unwrap();
    assert_eq!(
        output,
        "Step 1: Thinking about it\nStep 2: Still thinking\nTerminated: Reached max steps (2)"
    );
    assert_eq!(agent.current_state(), AgentState::Idle);
}

// ── Concurrency ─────────────────────────────────────────────────────────

#[tokio::test]
async fn independent_agents_share_a_notifier() {
    let notifier = Arc::new(BroadcastNotifier::new(256));
    let mut events = notifier.subscribe();

    let mut a = agent_with(
        AgentConfig {
            name: "a".into(),
            ..config(3)
        },
        Counter,
    )
    .with_notifier(notifier.clone());
    let mut b = agent_with(
        AgentConfig {
            name: "b".into(),
            ..config(2)
        },
        Counter,
    )
    .with_notifier(notifier);

    let (ra, rb) = tokio::join!(a.run(Some("first")), b.run(Some("second")));
    assert_eq!(ra.unwrap().lines().count(), 4);
    assert_eq!(rb.unwrap().lines().count(), 3);
    assert_eq!(a.messages().len(), 4);
    assert_eq!(b.messages().len(), 3);

    let mut results = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let loopwright_core::event::AgentEvent::Result { agent, .. } = event.as_ref() {
            results.push(agent.clone());
        }
    }
    results.sort();
    assert_eq!(results, vec!["a", "b"]);
}

#[tokio::test]
async fn stuck_on_first_step_reports_no_steps() {
    let mut agent = agent_with(
        AgentConfig {
            max_stuck_retries: 1,
            ..config(5)
        },
        Parrot("echo"),
    );
    agent.update_log("assistant", "echo", None).await.unwrap();
    agent.update_log("assistant", "echo", None).await.unwrap();

    let output = agent.run(None).await.unwrap();
    assert_eq!(output, NO_STEPS_EXECUTED);
    assert_eq!(agent.current_step(), 1);
    assert_eq!(agent.current_state(), AgentState::Idle);
}
