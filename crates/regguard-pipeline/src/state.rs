// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request pipeline state machine.
//!
//! Stages advance strictly in order. Any non-terminal state may jump to
//! `Failed` or `Cancelled`; `Done`, `Failed` and `Cancelled` are terminal.

use regguard_core::{FailureCode, RegguardError};
use serde::Serialize;
use strum::Display;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case", tag = "state", content = "code")]
pub enum PipelineState {
    Validating,
    Resolving,
    Authorizing,
    Fetching,
    SchemaChecking,
    Redacting,
    Composing,
    Done,
    Failed(FailureCode),
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }

    /// The only state a successful stage may move to.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Validating => Some(Self::Resolving),
            Self::Resolving => Some(Self::Authorizing),
            Self::Authorizing => Some(Self::Fetching),
            Self::Fetching => Some(Self::SchemaChecking),
            Self::SchemaChecking => Some(Self::Redacting),
            Self::Redacting => Some(Self::Composing),
            Self::Composing => Some(Self::Done),
            Self::Done | Self::Failed(_) | Self::Cancelled => None,
        }
    }
}

/// Tracks one run's position and the path it took.
#[derive(Debug)]
pub struct StateMachine {
    request_id: String,
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl StateMachine {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            current: PipelineState::Validating,
            history: vec![PipelineState::Validating],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// Every state visited, in order, starting with `Validating`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to the next stage. Returns the new state.
    pub fn advance(&mut self) -> Result<PipelineState, RegguardError> {
        let next = self.current.successor().ok_or_else(|| {
            RegguardError::Internal(format!("cannot advance from terminal state {}", self.current))
        })?;
        self.enter(next);
        Ok(next)
    }

    pub fn fail(&mut self, code: FailureCode) -> Result<(), RegguardError> {
        self.terminate(PipelineState::Failed(code))
    }

    pub fn cancel(&mut self) -> Result<(), RegguardError> {
        self.terminate(PipelineState::Cancelled)
    }

    fn terminate(&mut self, state: PipelineState) -> Result<(), RegguardError> {
        if self.current.is_terminal() {
            return Err(RegguardError::Internal(format!(
                "cannot leave terminal state {}",
                self.current
            )));
        }
        self.enter(state);
        Ok(())
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(request_id = %self.request_id, from = %self.current, to = %state, "pipeline transition");
        self.current = state;
        self.history.push(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let mut machine = StateMachine::new("req-1");
        while !machine.current().is_terminal() {
            machine.advance().unwrap();
        }
        assert_eq!(
            machine.history(),
            &[
                PipelineState::Validating,
                PipelineState::Resolving,
                PipelineState::Authorizing,
                PipelineState::Fetching,
                PipelineState::SchemaChecking,
                PipelineState::Redacting,
                PipelineState::Composing,
                PipelineState::Done,
            ]
        );
    }

    #[test]
    fn any_stage_can_fail() {
        let mut machine = StateMachine::new("req-1");
        machine.advance().unwrap();
        machine.fail(FailureCode::PrivateAddressBlocked).unwrap();
        assert_eq!(
            machine.current(),
            PipelineState::Failed(FailureCode::PrivateAddressBlocked)
        );
    }

    #[test]
    fn terminal_states_are_final() {
        let mut machine = StateMachine::new("req-1");
        machine.cancel().unwrap();
        assert!(machine.advance().is_err());
        assert!(machine.fail(FailureCode::InternalError).is_err());
        assert!(machine.cancel().is_err());
        assert_eq!(machine.current(), PipelineState::Cancelled);
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(PipelineState::SchemaChecking.to_string(), "schema_checking");
        assert_eq!(PipelineState::Failed(FailureCode::Overloaded).to_string(), "failed");
    }
}
