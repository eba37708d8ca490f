//! Deterministic scripted encounters for demos, replay checks and tests.

use crate::commands::{AdvanceTurn, ApplyDamage, ApplyEffect, Heal, SetPhase};
use crate::state::{CombatPhase, CombatState, Combatant, CombatantId, StatusEffect};
use rollback_command::Command;

pub const ALDRIC: CombatantId = CombatantId(0);
pub const MIRA: CombatantId = CombatantId(1);
pub const BRUTE: CombatantId = CombatantId(2);

/// Two adventurers against a gnoll brute, before the fight starts.
pub fn skirmish_roster() -> CombatState {
    let mut state = CombatState::new();
    state.insert_combatant(Combatant::new("Aldric", "party", 30));
    state.insert_combatant(Combatant::new("Mira", "party", 24));
    state.insert_combatant(Combatant::new("Gnoll Brute", "raiders", 40));
    state
}

/// Commands that open the encounter and play `rounds` full rounds.
///
/// Every command is valid against [`skirmish_roster`] in script order.
pub fn skirmish(rounds: u32) -> Vec<Box<dyn Command<CombatState>>> {
    let mut script: Vec<Box<dyn Command<CombatState>>> = vec![
        Box::new(SetPhase::new(CombatPhase::Initialization)),
        Box::new(SetPhase::new(CombatPhase::Active)),
    ];
    for round in 0..rounds {
        let swing = 4 + (round % 3) as i32;

        // Aldric
        script.push(Box::new(ApplyDamage::new(BRUTE, swing + 2)));
        script.push(Box::new(AdvanceTurn::new()));

        // Mira alternates between a bleeding cut and a healing word.
        if round % 2 == 0 {
            script.push(Box::new(ApplyEffect::new(
                BRUTE,
                StatusEffect::new("bleeding", 2),
            )));
        } else {
            script.push(Box::new(Heal::new(ALDRIC, 3)));
        }
        script.push(Box::new(AdvanceTurn::new()));

        // The brute
        let target = if round % 2 == 0 { ALDRIC } else { MIRA };
        script.push(Box::new(ApplyDamage::new(target, swing)));
        script.push(Box::new(AdvanceTurn::new()));
    }
    script
}
