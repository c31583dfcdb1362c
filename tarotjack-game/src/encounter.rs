//! Active-encounter state machine.
//!
//! `Idle -> Active -> (round loop) -> Completing -> Idle`. The engine only
//! touches the in-memory [`ProgressionStore`]; persistence and scene hand-off
//! belong to the session that owns it.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{BossData, MinionData};
use crate::events::{EventQueue, GameEvent};
use crate::ids::{BossId, MinionId, NodeInstanceId};
use crate::progression::{ActAdvance, HealthChange, ProgressionStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncounterError {
    #[error("an encounter against {0} is already active")]
    AlreadyActive(String),
    #[error("no encounter is active")]
    NotActive,
    #[error("no opponent data for '{0}'")]
    UnknownOpponent(String),
    #[error("{name} has non-positive health {health}")]
    InvalidHealth { name: String, health: i32 },
    #[error("{name} has no rounds to play")]
    NoRounds { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpponentRef {
    Minion { minion: MinionId, boss: BossId },
    Boss(BossId),
}

impl OpponentRef {
    #[must_use]
    pub const fn is_boss(self) -> bool {
        matches!(self, Self::Boss(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncounterSession {
    pub opponent: OpponentRef,
    pub name: String,
    pub remaining_health: i32,
    pub max_health: i32,
    pub rounds: u32,
    pub node_instance_id: Option<NodeInstanceId>,
    pub replay: bool,
}

impl EncounterSession {
    fn checked(
        opponent: OpponentRef,
        name: &str,
        max_health: i32,
        rounds: u32,
    ) -> Result<Self, EncounterError> {
        if max_health <= 0 {
            return Err(EncounterError::InvalidHealth {
                name: name.to_string(),
                health: max_health,
            });
        }
        if rounds == 0 {
            return Err(EncounterError::NoRounds {
                name: name.to_string(),
            });
        }
        Ok(Self {
            opponent,
            name: name.to_string(),
            remaining_health: max_health,
            max_health,
            rounds,
            node_instance_id: None,
            replay: false,
        })
    }

    /// Validate minion data and build a session ready to begin.
    ///
    /// # Errors
    ///
    /// Returns an [`EncounterError`] for non-positive health or zero rounds.
    pub fn for_minion(data: &MinionData, boss: BossId) -> Result<Self, EncounterError> {
        Self::checked(
            OpponentRef::Minion {
                minion: data.id,
                boss,
            },
            &data.name,
            data.max_health,
            data.rounds,
        )
    }

    /// Validate boss data and build a session ready to begin.
    ///
    /// # Errors
    ///
    /// Returns an [`EncounterError`] for non-positive health or zero rounds.
    pub fn for_boss(data: &BossData) -> Result<Self, EncounterError> {
        Self::checked(
            OpponentRef::Boss(data.id),
            &data.name,
            data.max_health,
            data.rounds,
        )
    }

    #[must_use]
    pub fn at_node(mut self, id: Option<NodeInstanceId>, replay: bool) -> Self {
        self.node_instance_id = id;
        self.replay = replay;
        self
    }
}

/// What a finished encounter changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub opponent: OpponentRef,
    pub won: bool,
    pub replay: bool,
    pub node_instance_id: Option<NodeInstanceId>,
    pub boss_unlocked: Option<BossId>,
    pub act: Option<ActAdvance>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EncounterPhase {
    #[default]
    Idle,
    Active(EncounterSession),
}

/// Apply a signed health change and announce it.
pub fn apply_health(
    progression: &mut ProgressionStore,
    delta: f32,
    events: &mut EventQueue,
) -> HealthChange {
    let change = progression.apply_health_delta(delta);
    events.push(GameEvent::PlayerHealthChanged(change.current));
    if change.game_over {
        log::info!("player health reached zero (was {:.1})", change.previous);
    }
    change
}

#[derive(Debug, Clone)]
pub struct EncounterEngine {
    phase: EncounterPhase,
    unlock_threshold: usize,
}

impl EncounterEngine {
    #[must_use]
    pub const fn new(unlock_threshold: usize) -> Self {
        Self {
            phase: EncounterPhase::Idle,
            unlock_threshold,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> &EncounterPhase {
        &self.phase
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.phase, EncounterPhase::Active(_))
    }

    #[must_use]
    pub const fn session(&self) -> Option<&EncounterSession> {
        match &self.phase {
            EncounterPhase::Active(session) => Some(session),
            EncounterPhase::Idle => None,
        }
    }

    fn ensure_idle(&self) -> Result<(), EncounterError> {
        match &self.phase {
            EncounterPhase::Active(session) => {
                Err(EncounterError::AlreadyActive(session.name.clone()))
            }
            EncounterPhase::Idle => Ok(()),
        }
    }

    /// Enter `Active` with a prepared session.
    ///
    /// # Errors
    ///
    /// Returns [`EncounterError::AlreadyActive`] if a fight is in progress.
    pub fn begin(
        &mut self,
        session: EncounterSession,
        events: &mut EventQueue,
    ) -> Result<(), EncounterError> {
        self.ensure_idle()?;
        log::debug!(
            "encounter start: {} ({} hp, replay {})",
            session.name,
            session.max_health,
            session.replay
        );
        events.push(GameEvent::EncounterStarted(session.name.clone()));
        events.push(GameEvent::EncounterHealthChanged(session.remaining_health));
        self.phase = EncounterPhase::Active(session);
        Ok(())
    }

    /// # Errors
    ///
    /// Rejects invalid data or a second concurrent encounter without
    /// changing state.
    pub fn start_minion(
        &mut self,
        data: &MinionData,
        boss: BossId,
        node_instance_id: Option<NodeInstanceId>,
        replay: bool,
        events: &mut EventQueue,
    ) -> Result<(), EncounterError> {
        self.ensure_idle()?;
        let session = EncounterSession::for_minion(data, boss)?.at_node(node_instance_id, replay);
        self.begin(session, events)
    }

    /// # Errors
    ///
    /// Rejects invalid data or a second concurrent encounter without
    /// changing state.
    pub fn start_boss(
        &mut self,
        data: &BossData,
        node_instance_id: Option<NodeInstanceId>,
        replay: bool,
        events: &mut EventQueue,
    ) -> Result<(), EncounterError> {
        self.ensure_idle()?;
        let session = EncounterSession::for_boss(data)?.at_node(node_instance_id, replay);
        self.begin(session, events)
    }

    /// The player took a round. Completes the encounter when the opponent
    /// runs out of health.
    ///
    /// # Errors
    ///
    /// Returns [`EncounterError::NotActive`] outside a fight.
    pub fn on_round_win(
        &mut self,
        progression: &mut ProgressionStore,
        events: &mut EventQueue,
    ) -> Result<Option<Completion>, EncounterError> {
        let EncounterPhase::Active(session) = &mut self.phase else {
            return Err(EncounterError::NotActive);
        };
        session.remaining_health -= 1;
        if session.remaining_health <= 0 {
            events.push(GameEvent::EncounterHealthChanged(0));
            return self.complete(true, progression, events).map(Some);
        }
        events.push(GameEvent::EncounterHealthChanged(session.remaining_health));
        Ok(None)
    }

    /// The player lost a round. Damage goes through the health contract;
    /// the encounter itself carries on.
    ///
    /// # Errors
    ///
    /// Returns [`EncounterError::NotActive`] outside a fight.
    pub fn on_round_lose(
        &mut self,
        damage: f32,
        progression: &mut ProgressionStore,
        events: &mut EventQueue,
    ) -> Result<HealthChange, EncounterError> {
        if !self.is_active() {
            return Err(EncounterError::NotActive);
        }
        Ok(apply_health(progression, -damage.max(0.0), events))
    }

    /// Resolve the active encounter and return to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`EncounterError::NotActive`] outside a fight.
    pub fn complete(
        &mut self,
        won: bool,
        progression: &mut ProgressionStore,
        events: &mut EventQueue,
    ) -> Result<Completion, EncounterError> {
        let EncounterPhase::Active(session) = std::mem::take(&mut self.phase) else {
            return Err(EncounterError::NotActive);
        };
        let mut completion = Completion {
            opponent: session.opponent,
            won,
            replay: session.replay,
            node_instance_id: session.node_instance_id.clone(),
            boss_unlocked: None,
            act: None,
        };

        if won {
            match session.opponent {
                OpponentRef::Minion { minion, boss } => {
                    let defeat =
                        progression.mark_minion_defeated(boss, minion, self.unlock_threshold);
                    completion.boss_unlocked = defeat.boss_unlocked;
                    events.push(GameEvent::MinionDefeated(minion));
                    if let Some(unlocked) = defeat.boss_unlocked {
                        events.push(GameEvent::BossUnlocked(unlocked));
                    }
                }
                OpponentRef::Boss(boss) => {
                    progression.mark_boss_defeated(boss);
                    let advance = progression.complete_act(boss);
                    completion.act = Some(advance);
                    events.push(GameEvent::BossDefeated(boss));
                    if advance == ActAdvance::RunComplete {
                        events.push(GameEvent::RunCompleted);
                    }
                }
            }
            if let Some(id) = &session.node_instance_id {
                progression.mark_node_instance_defeated(id);
            }
        }

        log::debug!("encounter complete: {} (won {won})", session.name);
        progression.clear_pending_node_point();
        events.push(GameEvent::ReturnToMap);
        Ok(completion)
    }

    /// Drop the active encounter without rewards, as a game over does.
    pub fn abort(&mut self) -> Option<EncounterSession> {
        match std::mem::take(&mut self.phase) {
            EncounterPhase::Active(session) => Some(session),
            EncounterPhase::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EncounterCatalog;

    fn minion(id: MinionId, max_health: i32) -> MinionData {
        MinionData {
            id,
            name: id.as_str().to_string(),
            max_health,
            rounds: 1,
        }
    }

    #[test]
    fn minion_fight_completes_after_health_runs_out() {
        let mut engine = EncounterEngine::new(2);
        let mut store = ProgressionStore::new(100.0);
        let mut events = EventQueue::new();
        let node = NodeInstanceId::from("minion_pickpocket_0_0_00000001");
        engine
            .start_minion(
                &minion(MinionId::Pickpocket, 3),
                BossId::Dealer,
                Some(node.clone()),
                false,
                &mut events,
            )
            .unwrap();
        assert_eq!(engine.session().unwrap().remaining_health, 3);

        assert!(engine.on_round_win(&mut store, &mut events).unwrap().is_none());
        assert!(engine.on_round_win(&mut store, &mut events).unwrap().is_none());
        let done = engine.on_round_win(&mut store, &mut events).unwrap().unwrap();
        assert!(done.won);
        assert!(!engine.is_active());
        assert!(store.is_minion_defeated(BossId::Dealer, MinionId::Pickpocket));
        assert!(store.is_node_instance_defeated(&node));
        let drained = events.drain();
        assert_eq!(drained.last(), Some(&GameEvent::ReturnToMap));
        assert!(drained.contains(&GameEvent::MinionDefeated(MinionId::Pickpocket)));
    }

    #[test]
    fn invalid_data_and_double_start_are_rejected() {
        let mut engine = EncounterEngine::new(2);
        let mut events = EventQueue::new();
        let err = engine
            .start_minion(&minion(MinionId::Oracle, 0), BossId::Priestess, None, false, &mut events)
            .unwrap_err();
        assert!(matches!(err, EncounterError::InvalidHealth { .. }));

        let mut no_rounds = minion(MinionId::Oracle, 2);
        no_rounds.rounds = 0;
        assert!(matches!(
            engine.start_minion(&no_rounds, BossId::Priestess, None, false, &mut events),
            Err(EncounterError::NoRounds { .. })
        ));
        assert!(events.is_empty());

        engine
            .start_minion(&minion(MinionId::Oracle, 2), BossId::Priestess, None, false, &mut events)
            .unwrap();
        let boss = EncounterCatalog::load_from_static()
            .boss(BossId::Priestess)
            .cloned()
            .unwrap();
        assert!(matches!(
            engine.start_boss(&boss, None, false, &mut events),
            Err(EncounterError::AlreadyActive(_))
        ));
        assert!(!engine.session().unwrap().opponent.is_boss());
    }

    #[test]
    fn round_loss_never_completes_the_fight() {
        let mut engine = EncounterEngine::new(2);
        let mut store = ProgressionStore::new(20.0);
        let mut events = EventQueue::new();
        engine
            .start_minion(&minion(MinionId::Bouncer, 2), BossId::Dealer, None, false, &mut events)
            .unwrap();
        let hit = engine.on_round_lose(15.0, &mut store, &mut events).unwrap();
        assert!(!hit.game_over);
        let hit = engine.on_round_lose(15.0, &mut store, &mut events).unwrap();
        assert!(hit.game_over);
        assert!(engine.is_active());
    }

    #[test]
    fn boss_win_closes_act_and_clears_marker() {
        let mut engine = EncounterEngine::new(2);
        let mut store = ProgressionStore::new(100.0);
        let mut events = EventQueue::new();
        store.set_pending_node_point(crate::ids::Coord::new(0, 6));
        let boss = EncounterCatalog::load_from_static()
            .boss(BossId::Dealer)
            .cloned()
            .unwrap();
        engine.start_boss(&boss, None, false, &mut events).unwrap();
        for _ in 1..boss.max_health {
            engine.on_round_win(&mut store, &mut events).unwrap();
        }
        let done = engine.on_round_win(&mut store, &mut events).unwrap().unwrap();
        assert_eq!(done.act, Some(ActAdvance::NextAct(BossId::Magician)));
        assert!(store.is_boss_defeated(BossId::Dealer));
        assert_eq!(store.current_act_boss(), BossId::Magician);
        assert!(store.pending_node_point().is_none());
    }

    #[test]
    fn forfeit_grants_nothing() {
        let mut engine = EncounterEngine::new(1);
        let mut store = ProgressionStore::new(100.0);
        let mut events = EventQueue::new();
        engine
            .start_minion(
                &minion(MinionId::Herald, 4),
                BossId::Emperor,
                Some(NodeInstanceId::from("n")),
                false,
                &mut events,
            )
            .unwrap();
        let done = engine.complete(false, &mut store, &mut events).unwrap();
        assert!(!done.won);
        assert!(!store.is_minion_defeated(BossId::Emperor, MinionId::Herald));
        assert!(!store.is_boss_unlocked(BossId::Emperor));
        assert_eq!(
            engine.complete(true, &mut store, &mut events),
            Err(EncounterError::NotActive)
        );
    }
}
