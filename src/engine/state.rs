//! Swap lifecycle state machine

use serde::Serialize;

use crate::errors::SwapError;
use crate::structured_logging::StructuredLogger;

/// Lifecycle state of a single swap execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwapState {
    Quoting,
    RiskChecking,
    Building,
    Signing,
    Submitting,
    Confirming,
    Confirmed,
    Rejected,
    Failed,
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected | Self::Failed)
    }

    /// Legal transitions. `Rejected` is reachable only from `RiskChecking`.
    pub fn can_transition_to(&self, next: SwapState) -> bool {
        use SwapState::*;
        matches!(
            (self, next),
            (Quoting, RiskChecking)
                | (Quoting, Failed)
                | (RiskChecking, Building)
                | (RiskChecking, Rejected)
                | (Building, Signing)
                | (Building, Failed)
                | (Signing, Submitting)
                | (Signing, Failed)
                | (Submitting, Confirming)
                | (Submitting, Failed)
                | (Confirming, Confirmed)
                | (Confirming, Failed)
        )
    }
}

/// Tracks the current state of one execution and refuses illegal moves
pub struct StateMachine {
    state: SwapState,
    logger: StructuredLogger,
}

impl StateMachine {
    pub fn new(logger: StructuredLogger) -> Self {
        Self {
            state: SwapState::Quoting,
            logger,
        }
    }

    pub fn state(&self) -> SwapState {
        self.state
    }

    pub fn advance(&mut self, next: SwapState) -> Result<(), SwapError> {
        if !self.state.can_transition_to(next) {
            return Err(SwapError::Internal(format!(
                "illegal state transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.logger.log_transition(self.state, next);
        self.state = next;
        Ok(())
    }
}
