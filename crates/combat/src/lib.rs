//! Combat encounter state and the reversible commands that mutate it.
//!
//! # Invariants
//! - Every command validates before mutating; a rejected command leaves the state untouched.
//! - Undo restores a state equal to the one `execute` started from.
//! - Combatant ids are assigned from a counter that undo rewinds, so redo reproduces them.

pub mod commands;
pub mod error;
pub mod scenario;
pub mod state;

pub use commands::{AdvanceTurn, ApplyDamage, ApplyEffect, Heal, JoinCombat, SetPhase};
pub use error::CombatError;
pub use state::{CombatPhase, CombatState, Combatant, CombatantId, CombatantStatus, StatusEffect};
