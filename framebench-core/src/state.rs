// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Server process state machine with typed state transitions.
//!
//! Implements the process lifecycle: Starting → Ready → Stopped.
//! Invalid transitions result in StateTransitionError.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;
use crate::types::Target;

/// Server process lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Spawned, readiness not yet resolved.
    Starting,

    /// Readiness resolved; the server may receive traffic.
    Ready,

    /// Torn down. Terminal.
    Stopped,
}

impl ProcessState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Ready => "Ready",
            Self::Stopped => "Stopped",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: ProcessState) -> bool {
        matches!(
            (self, target),
            (Self::Starting, Self::Ready) | (Self::Starting, Self::Stopped) | (Self::Ready, Self::Stopped)
        )
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for one server process.
#[derive(Debug)]
pub struct ProcessStateMachine {
    target: Target,
    current_state: ProcessState,
    started_at: Instant,
}

impl ProcessStateMachine {
    /// Create a new state machine in `Starting`.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            current_state: ProcessState::Starting,
            started_at: Instant::now(),
        }
    }

    /// Get the current state.
    pub fn state(&self) -> ProcessState {
        self.current_state
    }

    /// Time since the process was spawned.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ProcessState) -> Result<(), StateTransitionError> {
        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                target: self.target.clone(),
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            target_id = %self.target,
            from = self.current_state.name(),
            to = target.name(),
            "State transition"
        );

        self.current_state = target;

        Ok(())
    }

    /// Whether the process has been torn down.
    pub fn is_stopped(&self) -> bool {
        self.current_state == ProcessState::Stopped
    }
}
