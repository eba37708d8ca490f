use crate::state::{CombatPhase, CombatantId};
use rollback_command::CommandFailure;

/// Errors raised by combat commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    #[error("combatant {0} not found")]
    CombatantNotFound(CombatantId),
    #[error("combatant {0} has left the encounter")]
    CombatantInactive(CombatantId),
    #[error("invalid amount {0}")]
    InvalidAmount(i32),
    #[error("turn order is empty")]
    EmptyTurnOrder,
    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalPhaseTransition { from: CombatPhase, to: CombatPhase },
    #[error("{0} undone before it was executed")]
    NotExecuted(&'static str),
}

impl From<CombatError> for CommandFailure {
    fn from(err: CombatError) -> Self {
        CommandFailure::new(err)
    }
}
