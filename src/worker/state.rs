//! Dispatch state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single-shot dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Nothing has been sent yet.
    Idle,
    /// The start message is out; waiting for the worker.
    Dispatched,
    /// A result arrived.
    Completed,
    /// The worker reported an error.
    Faulted,
    /// The worker exited (or vanished) before a result.
    Terminated,
}

impl DispatchState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: DispatchState) -> bool {
        use DispatchState::*;

        matches!(
            (self, target),
            (Idle, Dispatched)
                | (Dispatched, Completed)
                | (Dispatched, Faulted)
                | (Dispatched, Terminated)
        )
    }

    /// Terminal states are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Faulted | Self::Terminated)
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Faulted => "faulted",
            Self::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

/// A state transition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: DispatchState,
    pub to: DispatchState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Current state plus transition history of a dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchContext {
    pub state: DispatchState,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub transitions: Vec<StateTransition>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self {
            state: DispatchState::Idle,
            dispatched_at: None,
            finished_at: None,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state.
    pub fn transition_to(
        &mut self,
        new_state: DispatchState,
        reason: Option<String>,
    ) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.state, new_state
            ));
        }

        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });
        self.state = new_state;

        match new_state {
            DispatchState::Dispatched => self.dispatched_at = Some(Utc::now()),
            s if s.is_terminal() => self.finished_at = Some(Utc::now()),
            _ => {}
        }

        Ok(())
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}
