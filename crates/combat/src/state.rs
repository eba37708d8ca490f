use crate::error::CombatError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of a combatant within one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Encounter lifecycle. Phases only move forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    #[default]
    NotStarted,
    Initialization,
    Active,
    PostCombat,
    Ended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatantStatus {
    #[default]
    Active,
    /// Reduced to zero hit points. Healing brings the combatant back.
    Unconscious,
    Fled,
}

/// A timed condition on a combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub name: String,
    /// Rounds left before the effect expires.
    pub remaining_rounds: u32,
}

impl StatusEffect {
    pub fn new(name: impl Into<String>, remaining_rounds: u32) -> Self {
        Self {
            name: name.into(),
            remaining_rounds,
        }
    }
}

/// Per-combatant data stored in the encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub name: String,
    pub faction: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub effects: Vec<StatusEffect>,
    pub status: CombatantStatus,
}

impl Combatant {
    pub fn new(name: impl Into<String>, faction: impl Into<String>, max_hp: i32) -> Self {
        Self {
            name: name.into(),
            faction: faction.into(),
            current_hp: max_hp,
            max_hp,
            effects: Vec::new(),
            status: CombatantStatus::Active,
        }
    }

    pub fn is_standing(&self) -> bool {
        self.status == CombatantStatus::Active
    }
}

/// The managed state of one combat encounter.
///
/// Uses BTreeMap so serialized payloads and diffs have a deterministic key
/// order. Outside of initial setup, all mutation goes through the commands
/// in [`crate::commands`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    phase: CombatPhase,
    round: u32,
    turn_index: usize,
    turn_order: Vec<CombatantId>,
    combatants: BTreeMap<CombatantId, Combatant>,
    next_id: u32,
}

impl CombatState {
    /// Create an empty encounter in the `NotStarted` phase, round 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a combatant at the end of the turn order. Returns its id.
    ///
    /// Meant for setting up an encounter before it is handed to a state
    /// manager; mid-encounter arrivals use [`crate::JoinCombat`]. The hit
    /// point maximum must be positive.
    pub fn add_combatant(
        &mut self,
        name: impl Into<String>,
        faction: impl Into<String>,
        max_hp: i32,
    ) -> Result<CombatantId, CombatError> {
        if max_hp <= 0 {
            return Err(CombatError::InvalidAmount(max_hp));
        }
        Ok(self.insert_combatant(Combatant::new(name, faction, max_hp)))
    }

    pub fn phase(&self) -> CombatPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn turn_order(&self) -> &[CombatantId] {
        &self.turn_order
    }

    /// Combatant whose turn it is.
    pub fn active_combatant(&self) -> Option<CombatantId> {
        self.turn_order.get(self.turn_index).copied()
    }

    pub fn combatant_count(&self) -> usize {
        self.combatants.len()
    }

    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    /// Read-only access to all combatants (BTreeMap for deterministic iteration).
    pub fn combatants(&self) -> &BTreeMap<CombatantId, Combatant> {
        &self.combatants
    }

    /// Factions that still have a combatant standing.
    pub fn standing_factions(&self) -> BTreeSet<&str> {
        self.combatants
            .values()
            .filter(|c| c.is_standing())
            .map(|c| c.faction.as_str())
            .collect()
    }

    /// Whether at most one faction is left standing.
    pub fn is_resolved(&self) -> bool {
        self.standing_factions().len() <= 1
    }

    pub(crate) fn get_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.get_mut(&id)
    }

    pub(crate) fn combatants_mut(&mut self) -> &mut BTreeMap<CombatantId, Combatant> {
        &mut self.combatants
    }

    pub(crate) fn set_phase(&mut self, phase: CombatPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_turn(&mut self, round: u32, turn_index: usize) {
        self.round = round;
        self.turn_index = turn_index;
    }

    /// Insert an already validated combatant.
    pub(crate) fn insert_combatant(&mut self, combatant: Combatant) -> CombatantId {
        let id = CombatantId(self.next_id);
        self.next_id += 1;
        self.combatants.insert(id, combatant);
        self.turn_order.push(id);
        id
    }

    pub(crate) fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Remove the most recently added combatant, rewinding the id counter.
    pub(crate) fn remove_last_added(&mut self, id: CombatantId) -> Option<Combatant> {
        if self.turn_order.last() != Some(&id) || self.next_id != id.0 + 1 {
            return None;
        }
        self.turn_order.pop();
        self.next_id = id.0;
        self.combatants.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encounter_starts_empty() {
        let state = CombatState::new();
        assert_eq!(state.phase(), CombatPhase::NotStarted);
        assert_eq!(state.round(), 0);
        assert_eq!(state.combatant_count(), 0);
        assert!(state.active_combatant().is_none());
    }

    #[test]
    fn add_combatant_assigns_sequential_ids() {
        let mut state = CombatState::new();
        let a = state.add_combatant("Aldric", "party", 30).unwrap();
        let b = state.add_combatant("Gnoll", "raiders", 40).unwrap();
        assert_eq!(a, CombatantId(0));
        assert_eq!(b, CombatantId(1));
        assert_eq!(state.turn_order(), &[a, b]);
        assert_eq!(state.active_combatant(), Some(a));
        assert_eq!(state.get(b).unwrap().current_hp, 40);
    }

    #[test]
    fn resolution_tracks_standing_factions() {
        let mut state = CombatState::new();
        let a = state.add_combatant("Aldric", "party", 30).unwrap();
        state.add_combatant("Gnoll", "raiders", 40).unwrap();
        assert!(!state.is_resolved());

        state.get_mut(a).unwrap().status = CombatantStatus::Unconscious;
        assert!(state.is_resolved());
        assert_eq!(
            state.standing_factions().into_iter().collect::<Vec<_>>(),
            vec!["raiders"]
        );
    }

    #[test]
    fn remove_last_added_rewinds_counter() {
        let mut state = CombatState::new();
        let a = state.add_combatant("Aldric", "party", 30).unwrap();
        let b = state.add_combatant("Gnoll", "raiders", 40).unwrap();

        assert!(state.remove_last_added(a).is_none());
        assert!(state.remove_last_added(b).is_some());
        assert_eq!(state.next_id(), 1);
        assert_eq!(state.add_combatant("Gnoll", "raiders", 40).unwrap(), b);
    }

    #[test]
    fn non_positive_max_hp_is_rejected() {
        let mut state = CombatState::new();
        assert_eq!(
            state.add_combatant("Ghost", "none", 0),
            Err(CombatError::InvalidAmount(0))
        );
        assert_eq!(
            state.add_combatant("Wraith", "none", i32::MIN),
            Err(CombatError::InvalidAmount(i32::MIN))
        );
        assert_eq!(state, CombatState::new());
    }

    #[test]
    fn combatant_display() {
        assert_eq!(CombatantId(3).to_string(), "c3");
    }
}
