use crate::error::CombatError;
use crate::state::{
    CombatPhase, CombatState, Combatant, CombatantId, CombatantStatus, StatusEffect,
};
use async_trait::async_trait;
use rollback_command::{Command, CommandFailure};
use rollback_common::CommandId;
use std::collections::BTreeMap;

/// A new combatant joins mid-encounter at the end of the turn order.
/// Undo removes it and rewinds the id counter.
#[derive(Debug, Clone)]
pub struct JoinCombat {
    id: CommandId,
    name: String,
    faction: String,
    max_hp: i32,
    joined: Option<CombatantId>,
}

impl JoinCombat {
    pub fn new(name: impl Into<String>, faction: impl Into<String>, max_hp: i32) -> Self {
        Self {
            id: CommandId::new(),
            name: name.into(),
            faction: faction.into(),
            max_hp,
            joined: None,
        }
    }

    /// Id assigned by the last successful execute.
    pub fn joined(&self) -> Option<CombatantId> {
        self.joined
    }
}

#[async_trait]
impl Command<CombatState> for JoinCombat {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "join_combat"
    }

    async fn execute(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let id = state.add_combatant(self.name.clone(), self.faction.clone(), self.max_hp)?;
        self.joined = Some(id);
        Ok(())
    }

    async fn undo(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let id = self
            .joined
            .ok_or(CombatError::NotExecuted("join_combat"))?;
        state
            .remove_last_added(id)
            .ok_or(CombatError::CombatantNotFound(id))?;
        self.joined = None;
        Ok(())
    }
}

/// Hit points and status before a health change.
#[derive(Debug, Clone, Copy)]
struct Vitals {
    hp: i32,
    status: CombatantStatus,
}

fn standing_target(
    state: &mut CombatState,
    target: CombatantId,
) -> Result<&mut Combatant, CombatError> {
    let combatant = state
        .get_mut(target)
        .ok_or(CombatError::CombatantNotFound(target))?;
    if combatant.status == CombatantStatus::Fled {
        return Err(CombatError::CombatantInactive(target));
    }
    Ok(combatant)
}

fn restore_vitals(
    state: &mut CombatState,
    target: CombatantId,
    vitals: Vitals,
) -> Result<(), CombatError> {
    let combatant = state
        .get_mut(target)
        .ok_or(CombatError::CombatantNotFound(target))?;
    combatant.current_hp = vitals.hp;
    combatant.status = vitals.status;
    Ok(())
}

/// Reduce a combatant's hit points, floored at zero. Dropping to zero
/// knocks the combatant unconscious.
#[derive(Debug, Clone)]
pub struct ApplyDamage {
    id: CommandId,
    target: CombatantId,
    amount: i32,
    before: Option<Vitals>,
}

impl ApplyDamage {
    pub fn new(target: CombatantId, amount: i32) -> Self {
        Self {
            id: CommandId::new(),
            target,
            amount,
            before: None,
        }
    }
}

#[async_trait]
impl Command<CombatState> for ApplyDamage {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "apply_damage"
    }

    async fn execute(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        if self.amount < 0 {
            return Err(CombatError::InvalidAmount(self.amount).into());
        }
        let combatant = standing_target(state, self.target)?;
        self.before = Some(Vitals {
            hp: combatant.current_hp,
            status: combatant.status,
        });
        combatant.current_hp = combatant.current_hp.saturating_sub(self.amount).max(0);
        if combatant.current_hp == 0 {
            combatant.status = CombatantStatus::Unconscious;
        }
        tracing::trace!(combatant = %self.target, hp = combatant.current_hp, "damage applied");
        Ok(())
    }

    async fn undo(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let before = self
            .before
            .take()
            .ok_or(CombatError::NotExecuted("apply_damage"))?;
        restore_vitals(state, self.target, before)?;
        Ok(())
    }
}

/// Restore hit points up to the maximum. Healing an unconscious combatant
/// above zero brings it back into the fight.
#[derive(Debug, Clone)]
pub struct Heal {
    id: CommandId,
    target: CombatantId,
    amount: i32,
    before: Option<Vitals>,
}

impl Heal {
    pub fn new(target: CombatantId, amount: i32) -> Self {
        Self {
            id: CommandId::new(),
            target,
            amount,
            before: None,
        }
    }
}

#[async_trait]
impl Command<CombatState> for Heal {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "heal"
    }

    async fn execute(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        if self.amount < 0 {
            return Err(CombatError::InvalidAmount(self.amount).into());
        }
        let combatant = standing_target(state, self.target)?;
        self.before = Some(Vitals {
            hp: combatant.current_hp,
            status: combatant.status,
        });
        combatant.current_hp = combatant
            .current_hp
            .saturating_add(self.amount)
            .min(combatant.max_hp);
        if combatant.current_hp > 0 && combatant.status == CombatantStatus::Unconscious {
            combatant.status = CombatantStatus::Active;
        }
        Ok(())
    }

    async fn undo(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let before = self.before.take().ok_or(CombatError::NotExecuted("heal"))?;
        restore_vitals(state, self.target, before)?;
        Ok(())
    }
}

/// Attach a timed status effect.
#[derive(Debug, Clone)]
pub struct ApplyEffect {
    id: CommandId,
    target: CombatantId,
    effect: StatusEffect,
    /// Length of the effect list before the push.
    applied_at: Option<usize>,
}

impl ApplyEffect {
    pub fn new(target: CombatantId, effect: StatusEffect) -> Self {
        Self {
            id: CommandId::new(),
            target,
            effect,
            applied_at: None,
        }
    }
}

#[async_trait]
impl Command<CombatState> for ApplyEffect {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "apply_effect"
    }

    async fn execute(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        if self.effect.remaining_rounds == 0 {
            return Err(CombatError::InvalidAmount(0).into());
        }
        let combatant = standing_target(state, self.target)?;
        self.applied_at = Some(combatant.effects.len());
        combatant.effects.push(self.effect.clone());
        Ok(())
    }

    async fn undo(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let at = self
            .applied_at
            .take()
            .ok_or(CombatError::NotExecuted("apply_effect"))?;
        let combatant = state
            .get_mut(self.target)
            .ok_or(CombatError::CombatantNotFound(self.target))?;
        combatant.effects.truncate(at);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct TurnRecord {
    round: u32,
    turn_index: usize,
    /// Effect lists before expiry ticking; only set when the round wrapped.
    effects: Option<BTreeMap<CombatantId, Vec<StatusEffect>>>,
}

/// Pass the turn to the next combatant in order. Wrapping past the last
/// combatant starts a new round and ticks every status effect down by one,
/// dropping the ones that expire.
#[derive(Debug, Clone)]
pub struct AdvanceTurn {
    id: CommandId,
    before: Option<TurnRecord>,
}

impl AdvanceTurn {
    pub fn new() -> Self {
        Self {
            id: CommandId::new(),
            before: None,
        }
    }
}

impl Default for AdvanceTurn {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command<CombatState> for AdvanceTurn {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "advance_turn"
    }

    async fn execute(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let len = state.turn_order().len();
        if len == 0 {
            return Err(CombatError::EmptyTurnOrder.into());
        }
        let round = state.round();
        let turn_index = state.turn_index();
        let next = turn_index + 1;

        if next < len {
            self.before = Some(TurnRecord {
                round,
                turn_index,
                effects: None,
            });
            state.set_turn(round, next);
            return Ok(());
        }

        let saved = state
            .combatants()
            .iter()
            .map(|(id, c)| (*id, c.effects.clone()))
            .collect();
        self.before = Some(TurnRecord {
            round,
            turn_index,
            effects: Some(saved),
        });
        for combatant in state.combatants_mut().values_mut() {
            for effect in &mut combatant.effects {
                effect.remaining_rounds = effect.remaining_rounds.saturating_sub(1);
            }
            combatant.effects.retain(|e| e.remaining_rounds > 0);
        }
        state.set_turn(round + 1, 0);
        tracing::trace!(round = round + 1, "new round");
        Ok(())
    }

    async fn undo(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let before = self
            .before
            .take()
            .ok_or(CombatError::NotExecuted("advance_turn"))?;
        if let Some(effects) = before.effects {
            for (id, saved) in effects {
                let combatant = state
                    .get_mut(id)
                    .ok_or(CombatError::CombatantNotFound(id))?;
                combatant.effects = saved;
            }
        }
        state.set_turn(before.round, before.turn_index);
        Ok(())
    }
}

/// Move the encounter to a later phase.
#[derive(Debug, Clone)]
pub struct SetPhase {
    id: CommandId,
    phase: CombatPhase,
    before: Option<CombatPhase>,
}

impl SetPhase {
    pub fn new(phase: CombatPhase) -> Self {
        Self {
            id: CommandId::new(),
            phase,
            before: None,
        }
    }
}

#[async_trait]
impl Command<CombatState> for SetPhase {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        "set_phase"
    }

    async fn execute(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let current = state.phase();
        if self.phase <= current {
            return Err(CombatError::IllegalPhaseTransition {
                from: current,
                to: self.phase,
            }
            .into());
        }
        self.before = Some(current);
        state.set_phase(self.phase);
        Ok(())
    }

    async fn undo(&mut self, state: &mut CombatState) -> Result<(), CommandFailure> {
        let before = self
            .before
            .take()
            .ok_or(CombatError::NotExecuted("set_phase"))?;
        state.set_phase(before);
        Ok(())
    }
}
