//! Operation lifecycle.
//!
//! ```text
//! Idle -> FileSelected -> Validating -> Invalid -> Idle
//!                                    -> Configuring -> Processing -> Succeeded -> Idle
//!                                                                -> Failed -> Configuring
//! ```

use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    FileSelected,
    Validating,
    Invalid,
    Configuring,
    Processing,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Idle => "idle",
            OperationState::FileSelected => "file_selected",
            OperationState::Validating => "validating",
            OperationState::Invalid => "invalid",
            OperationState::Configuring => "configuring",
            OperationState::Processing => "processing",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (*self, next),
            (Idle, FileSelected)
                | (FileSelected, Validating)
                | (Validating, Invalid)
                | (Validating, Configuring)
                | (Invalid, Idle)
                | (Configuring, Processing)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Succeeded, Idle)
                | (Failed, Configuring)
        )
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tool run walking through [`OperationState`]
#[derive(Debug)]
pub struct Operation {
    name: &'static str,
    state: OperationState,
}

impl Operation {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: OperationState::Idle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn transition(&mut self, next: OperationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(operation = self.name, from = %self.state, to = %next, "state transition");
        self.state = next;
        Ok(())
    }

    /// Idle -> FileSelected -> Validating
    pub fn begin_validation(&mut self) -> Result<()> {
        self.transition(OperationState::FileSelected)?;
        self.transition(OperationState::Validating)
    }

    /// Close validation with its outcome: Configuring when the input is
    /// usable, otherwise Invalid and back to Idle
    pub fn finish_validation(&mut self, valid: bool) -> Result<()> {
        if valid {
            self.transition(OperationState::Configuring)
        } else {
            self.transition(OperationState::Invalid)?;
            self.transition(OperationState::Idle)
        }
    }

    /// Run `work` in the Processing state and record how it ended.
    ///
    /// Success returns to Idle; failure rests in Failed, from which only
    /// Configuring is reachable.
    pub fn process<T>(&mut self, work: impl FnOnce() -> Result<T>) -> Result<T> {
        self.transition(OperationState::Processing)?;
        match work() {
            Ok(value) => {
                self.transition(OperationState::Succeeded)?;
                self.transition(OperationState::Idle)?;
                Ok(value)
            }
            Err(e) => {
                self.transition(OperationState::Failed)?;
                Err(e)
            }
        }
    }
}
