//! Agent state and the scoped transition guard.
//!
//! State changes happen inside a [`StateGuard`]: entering a scope records the
//! state held before it, and leaving the scope always restores that state,
//! whether the body finished normally, returned an error, or panicked. A
//! faulting body flips the state to `ERROR` first so concurrent observers can
//! see it, then the restore runs. The one state that survives scope exit is
//! `FINISHED`, which ends a run for good until [`StateMachine::reset`].

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::Error;

/// Runtime state of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    /// Initial and resting state
    #[default]
    Idle,
    /// Inside `run()`
    Running,
    /// Explicitly finished (e.g. by a terminate tool)
    Finished,
    /// Only visible while a faulting transition unwinds
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `ERROR` is reachable from anywhere; everything else follows
    /// IDLE → RUNNING → {IDLE, FINISHED}.
    pub fn can_transition_to(&self, next: AgentState) -> bool {
        match (*self, next) {
            (_, AgentState::Error) => true,
            (AgentState::Idle, AgentState::Running) => true,
            (AgentState::Running, AgentState::Idle | AgentState::Finished) => true,
            (AgentState::Finished, AgentState::Idle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared holder of one agent's current state.
///
/// Cloning is cheap and every clone refers to the same state. Monitors can
/// [`subscribe`](Self::subscribe) to watch transitions as they happen.
#[derive(Clone)]
pub struct StateMachine {
    tx: Arc<watch::Sender<AgentState>>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AgentState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// The current state.
    pub fn current(&self) -> AgentState {
        *self.tx.borrow()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.tx.subscribe()
    }

    /// Enter `new_state` for the lifetime of the returned guard.
    pub fn enter(&self, new_state: AgentState) -> Result<StateGuard, Error> {
        let previous = self.current();
        if !previous.can_transition_to(new_state) {
            return Err(Error::InvalidState(previous));
        }
        self.tx.send_replace(new_state);
        debug!(from = %previous, to = %new_state, "Entered state scope");
        Ok(StateGuard {
            machine: self.clone(),
            previous,
            faulted: false,
        })
    }

    /// Run `body` inside a `new_state` scope.
    ///
    /// An `Err` from the body marks the scope as faulted before it unwinds.
    pub async fn scoped<F, T, E>(&self, new_state: AgentState, body: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<Error>,
    {
        let mut guard = self.enter(new_state)?;
        let outcome = body.await;
        if outcome.is_err() {
            guard.fail();
        }
        outcome
    }

    /// Return a finished (or already idle) agent to `IDLE`.
    pub fn reset(&self) -> Result<(), Error> {
        let current = self.current();
        match current {
            AgentState::Idle | AgentState::Finished => {
                self.tx.send_replace(AgentState::Idle);
                Ok(())
            }
            other => Err(Error::InvalidState(other)),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// A live state scope. Dropping it restores the state held before entry.
pub struct StateGuard {
    machine: StateMachine,
    previous: AgentState,
    faulted: bool,
}

impl StateGuard {
    /// The state that will be restored on exit.
    pub fn previous(&self) -> AgentState {
        self.previous
    }

    pub fn current(&self) -> AgentState {
        self.machine.current()
    }

    /// Move to another state within the scope.
    pub fn set(&self, next: AgentState) -> Result<(), Error> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(Error::InvalidState(current));
        }
        self.machine.tx.send_replace(next);
        Ok(())
    }

    /// Mark the scope as faulted: the state becomes `ERROR` until the scope exits.
    pub fn fail(&mut self) {
        self.faulted = true;
        self.machine.tx.send_replace(AgentState::Error);
        warn!(restore_to = %self.previous, "State scope faulted");
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        if std::thread::panicking() && !self.faulted {
            self.fail();
        }
        let keep_finished = !self.faulted && self.current() == AgentState::Finished;
        let restored = if keep_finished {
            AgentState::Finished
        } else {
            self.previous
        };
        self.machine.tx.send_replace(restored);
        debug!(to = %restored, "Left state scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let machine = StateMachine::new();
        assert_eq!(machine.current(), AgentState::Idle);
        assert_eq!(AgentState::default(), AgentState::Idle);
    }

    #[test]
    fn guard_restores_previous_state() {
        let machine = StateMachine::new();
        {
            let _guard = machine.enter(AgentState::Running).unwrap();
            assert_eq!(machine.current(), AgentState::Running);
        }
        assert_eq!(machine.current(), AgentState::Idle);
    }

    #[test]
    fn finished_survives_scope_exit() {
        let machine = StateMachine::new();
        {
            let guard = machine.enter(AgentState::Running).unwrap();
            guard.set(AgentState::Finished).unwrap();
        }
        assert_eq!(machine.current(), AgentState::Finished);
        machine.reset().unwrap();
        assert_eq!(machine.current(), AgentState::Idle);
    }

    #[test]
    fn illegal_entry_rejected() {
        let machine = StateMachine::new();
        let _guard = machine.enter(AgentState::Running).unwrap();
        let err = machine.enter(AgentState::Running).err().unwrap();
        assert!(matches!(err, Error::InvalidState(AgentState::Running)));
        assert!(!AgentState::Finished.can_transition_to(AgentState::Running));
    }

    #[tokio::test]
    async fn faulted_scope_shows_error_then_reverts() {
        let machine = StateMachine::new();
        let mut rx = machine.subscribe();

        let result: Result<(), Error> = machine
            .scoped(AgentState::Running, async { Err(Error::Step("boom".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(machine.current(), AgentState::Idle);

        // The watch channel only keeps the latest value, so check the
        // history through a guard instead.
        let mut guard = machine.enter(AgentState::Running).unwrap();
        guard.fail();
        assert_eq!(*rx.borrow_and_update(), AgentState::Error);
        drop(guard);
        assert_eq!(machine.current(), AgentState::Idle);
    }

    #[test]
    fn panic_inside_scope_reverts() {
        let machine = StateMachine::new();
        let inner = machine.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.enter(AgentState::Running).unwrap();
            panic!("transition body blew up");
        }));
        assert!(outcome.is_err());
        assert_eq!(machine.current(), AgentState::Idle);
    }

    #[test]
    fn reset_refused_while_running() {
        let machine = StateMachine::new();
        let _guard = machine.enter(AgentState::Running).unwrap();
        assert!(machine.reset().is_err());
    }

    #[test]
    fn state_serializes_uppercase() {
        let json = serde_json::to_string(&AgentState::Finished).unwrap();
        assert_eq!(json, "\"FINISHED\"");
    }
}
