//! Rollback properties of the state manager, driven by combat encounters.

use proptest::prelude::*;
use rollback_combat::scenario::{self, ALDRIC, BRUTE, MIRA};
use rollback_combat::{
    AdvanceTurn, ApplyDamage, ApplyEffect, CombatPhase, CombatState, CombatantId,
    CombatantStatus, Heal, JoinCombat, SetPhase, StatusEffect,
};
use rollback_command::Command;
use rollback_common::SnapshotIndex;
use rollback_kernel::{ManagerConfig, ManagerError, StateManager};
use rollback_logger::Severity;

#[derive(Debug, Clone)]
enum Op {
    Damage(u32, i32),
    Heal(u32, i32),
    Effect(u32, u32),
    Advance,
    Join(i32),
    Phase(CombatPhase),
}

impl Op {
    fn command(&self) -> Box<dyn Command<CombatState>> {
        match *self {
            Op::Damage(target, amount) => Box::new(ApplyDamage::new(CombatantId(target), amount)),
            Op::Heal(target, amount) => Box::new(Heal::new(CombatantId(target), amount)),
            Op::Effect(target, rounds) => Box::new(ApplyEffect::new(
                CombatantId(target),
                StatusEffect::new("slowed", rounds),
            )),
            Op::Advance => Box::new(AdvanceTurn::new()),
            Op::Join(hp) => Box::new(JoinCombat::new("Reinforcement", "raiders", hp)),
            Op::Phase(phase) => Box::new(SetPhase::new(phase)),
        }
    }
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..4, 0i32..20).prop_map(|(t, a)| Op::Damage(t, a)),
        2 => (0u32..4, 0i32..10).prop_map(|(t, a)| Op::Heal(t, a)),
        2 => (0u32..4, 1u32..4).prop_map(|(t, r)| Op::Effect(t, r)),
        4 => Just(Op::Advance),
        1 => (1i32..30).prop_map(Op::Join),
        1 => prop_oneof![
            Just(CombatPhase::Initialization),
            Just(CombatPhase::Active),
            Just(CombatPhase::PostCombat),
        ]
        .prop_map(Op::Phase),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Apply every op, skipping rejected ones. Returns the state after each
/// accepted command, starting with the initial state.
async fn play(manager: &mut StateManager<CombatState>, ops: &[Op]) -> Vec<CombatState> {
    let mut states = vec![manager.get_state().await];
    for op in ops {
        match manager.apply_command(op.command()).await {
            Ok(()) => states.push(manager.get_state().await),
            Err(err) => assert!(!err.is_fatal(), "{op:?} failed fatally: {err}"),
        }
    }
    states
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn undo_then_redo_is_deterministic(ops in prop::collection::vec(op(), 0..40), undo in 0usize..48) {
        runtime().block_on(async {
            let mut manager = StateManager::new(scenario::skirmish_roster());
            let states = play(&mut manager, &ops).await;
            let applied = states.len() - 1;
            let m = undo.min(applied);

            for _ in 0..m {
                prop_assert!(manager.undo().await.unwrap().is_some());
            }
            prop_assert_eq!(&manager.get_state().await, &states[applied - m]);

            for _ in 0..m {
                prop_assert!(manager.redo().await.unwrap().is_some());
            }
            prop_assert_eq!(&manager.get_state().await, &states[applied]);
            Ok(())
        })?;
    }

    #[test]
    fn restore_matches_checkpoint(
        before in prop::collection::vec(op(), 0..20),
        after in prop::collection::vec(op(), 1..20),
    ) {
        runtime().block_on(async {
            let mut manager = StateManager::new(scenario::skirmish_roster());
            play(&mut manager, &before).await;
            let checkpoint = manager.get_state().await;
            let index = manager.take_snapshot().await.unwrap();

            play(&mut manager, &after).await;
            manager.restore_snapshot(index).await.unwrap();

            prop_assert_eq!(manager.get_state().await, checkpoint);
            prop_assert!(manager.command_manager().is_empty());
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn skirmish_rewinds_to_opening() {
    let mut manager = StateManager::new(scenario::skirmish_roster());
    for command in scenario::skirmish(1) {
        manager.apply_command(command).await.unwrap();
    }
    let opening = manager.take_snapshot().await.unwrap();
    let after_round_one = manager.get_state().await;

    for command in scenario::skirmish(4).into_iter().skip(2) {
        manager.apply_command(command).await.unwrap();
    }
    let state = manager.get_state().await;
    assert_eq!(state.round(), 5);
    assert_eq!(state.get(BRUTE).unwrap().current_hp, 40 - 6 - 27);

    manager.restore_snapshot(opening).await.unwrap();
    assert_eq!(manager.get_state().await, after_round_one);
    assert_eq!(manager.get_state().await.phase(), CombatPhase::Active);
}

#[tokio::test]
async fn knockout_is_undone() {
    let mut manager = StateManager::new(scenario::skirmish_roster());
    manager
        .apply_command(Box::new(ApplyDamage::new(MIRA, 100)))
        .await
        .unwrap();
    assert_eq!(
        manager.get_state().await.get(MIRA).unwrap().status,
        CombatantStatus::Unconscious
    );

    // Rejections are journaled and leave the history alone.
    let err = manager
        .apply_command(Box::new(ApplyDamage::new(CombatantId(9), 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Command(_)));
    assert_eq!(manager.logger().entries_at(Severity::Warn).count(), 1);
    assert_eq!(manager.command_manager().len(), 1);

    manager.undo().await.unwrap();
    let mira = manager.get_state().await.get(MIRA).cloned().unwrap();
    assert_eq!(mira.current_hp, 24);
    assert!(mira.is_standing());
}

#[tokio::test]
async fn redo_reassigns_joined_ids() {
    let mut manager = StateManager::new(scenario::skirmish_roster());
    manager
        .apply_command(Box::new(JoinCombat::new("Gnoll Archer", "raiders", 18)))
        .await
        .unwrap();
    let joined = CombatantId(3);
    assert_eq!(manager.get_state().await.get(joined).unwrap().max_hp, 18);

    manager.undo().await.unwrap();
    assert!(manager.get_state().await.get(joined).is_none());

    manager.redo().await.unwrap();
    let state = manager.get_state().await;
    assert_eq!(state.get(joined).unwrap().name, "Gnoll Archer");
    assert_eq!(state.turn_order().last(), Some(&joined));
}

#[tokio::test]
async fn archived_encounter_resumes_elsewhere() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("skirmish.rbk");

    let mut manager = StateManager::new(scenario::skirmish_roster());
    manager.take_snapshot().await.unwrap();
    for command in scenario::skirmish(2) {
        manager.apply_command(command).await.unwrap();
    }
    manager.take_snapshot().await.unwrap();
    std::fs::write(&path, manager.export_archive().to_bytes().unwrap()).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let archive = rollback_snapshot::SnapshotArchive::from_bytes(&bytes).unwrap();
    let mut resumed =
        StateManager::<CombatState>::from_archive(archive, ManagerConfig::default()).unwrap();
    assert_eq!(resumed.get_state().await, manager.get_state().await);

    resumed
        .apply_command(Box::new(Heal::new(ALDRIC, 50)))
        .await
        .unwrap();
    let aldric = resumed.get_state().await.get(ALDRIC).cloned().unwrap();
    assert_eq!(aldric.current_hp, aldric.max_hp);

    resumed.restore_snapshot(SnapshotIndex(0)).await.unwrap();
    assert_eq!(resumed.get_state().await, scenario::skirmish_roster());
}
