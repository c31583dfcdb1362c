//! The inbound command surface: one owned run, its map, its encounter and
//! the storage they persist to.
//!
//! Every mutating command saves the documents it touched before returning.
//! Events raised along the way queue up until [`RunSession::drain_events`].
use std::error::Error as StdError;
use thiserror::Error;

use crate::GameStorage;
use crate::config::EngineConfig;
use crate::constants::{MAP_KEY, MAP_SEED_STEP, PROGRESSION_KEY};
use crate::data::EncounterCatalog;
use crate::encounter::{Completion, EncounterEngine, EncounterError, EncounterSession, apply_health};
use crate::events::{EventQueue, GameEvent};
use crate::handoff::SceneHandoff;
use crate::ids::{BossId, Coord, MinionId};
use crate::map::{GraphError, MapError, MapGenerator, MapState, Node, NodeKind};
use crate::progression::{HealthChange, ProgressionError, ProgressionStore};
use crate::recovery::{RecoveryOutcome, RecoveryReconciler};
use crate::traversal::{DenialReason, TraversalDecision, TraversalPolicy};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("an encounter is in progress")]
    EncounterActive,
    #[error("no map has been generated yet")]
    NoMap,
    #[error("the run is over; reset progression to play again")]
    GameOver,
    #[error("no boss has been selected")]
    NoBossSelected,
    #[error(transparent)]
    Encounter(#[from] EncounterError),
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("map generation failed: {0}")]
    Generation(#[from] GraphError),
    #[error("failed to persist '{key}': {source}")]
    Storage {
        key: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl SessionError {
    fn storage<E>(key: &'static str) -> impl FnOnce(E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        move |err| Self::Storage {
            key,
            source: Box::new(err),
        }
    }
}

/// What happened on map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub recovery: RecoveryOutcome,
    pub regenerated: bool,
    pub handoff: SceneHandoff,
}

/// Immediate effect of a non-battle node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeResolution {
    Regen { healed: f32 },
    Shop,
    Treasure,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectOutcome {
    Denied(DenialReason),
    EncounterStarted { replay: bool },
    Resolved(NodeResolution),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// The fight carries on.
    Continue,
    Completed(Completion),
    GameOver,
}

pub struct RunSession<S: GameStorage> {
    storage: S,
    catalog: EncounterCatalog,
    config: EngineConfig,
    generator: MapGenerator,
    progression: ProgressionStore,
    map: Option<MapState>,
    encounter: EncounterEngine,
    events: EventQueue,
    seed: u64,
    entered_kind: Option<NodeKind>,
}

impl<S: GameStorage> RunSession<S> {
    /// Load the saved documents, falling back to a fresh save when the
    /// progression document is missing, unreadable, or left over from a
    /// game over. A bad map document is dropped and rebuilt on the next
    /// [`RunSession::enter_map`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if a fresh progression document
    /// cannot be written.
    pub fn open(
        storage: S,
        catalog: EncounterCatalog,
        config: EngineConfig,
        seed: u64,
    ) -> Result<Self, SessionError> {
        let max_health = config.progression.max_health;
        let loaded = match storage.load_document::<ProgressionStore>(PROGRESSION_KEY) {
            Ok(doc) => doc,
            Err(err) => {
                log::warn!("progression document unreadable, starting fresh: {err}");
                None
            }
        };
        let mut persist = loaded.is_none();
        let mut progression = loaded.map_or_else(
            || ProgressionStore::new(max_health),
            |store| store.rehydrate(max_health),
        );
        if progression.is_game_over() {
            log::info!("saved run ended in a game over; starting a fresh save");
            progression = progression.restarted();
            persist = true;
        }

        let map = match storage.load_document::<MapState>(MAP_KEY) {
            Ok(Some(map)) => match map.validate() {
                Ok(()) => Some(map),
                Err(err) => {
                    log::warn!("map document rejected: {err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                log::warn!("map document unreadable: {err}");
                None
            }
        };

        let session = Self {
            generator: MapGenerator::new(config.map.clone()),
            encounter: EncounterEngine::new(config.progression.minions_to_unlock_boss),
            storage,
            catalog,
            config,
            progression,
            map,
            events: EventQueue::new(),
            seed,
            entered_kind: None,
        };
        if persist {
            session.save_progression()?;
        }
        Ok(session)
    }

    #[must_use]
    pub const fn progression(&self) -> &ProgressionStore {
        &self.progression
    }

    #[must_use]
    pub const fn map(&self) -> Option<&MapState> {
        self.map.as_ref()
    }

    #[must_use]
    pub const fn encounter(&self) -> &EncounterEngine {
        &self.encounter
    }

    #[must_use]
    pub const fn catalog(&self) -> &EncounterCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Events raised since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    fn save_progression(&self) -> Result<(), SessionError> {
        self.storage
            .save_document(PROGRESSION_KEY, &self.progression)
            .map_err(SessionError::storage(PROGRESSION_KEY))
    }

    fn save_map(&self) -> Result<(), SessionError> {
        match &self.map {
            Some(map) => self
                .storage
                .save_document(MAP_KEY, map)
                .map_err(SessionError::storage(MAP_KEY)),
            None => self
                .storage
                .delete_document(MAP_KEY)
                .map_err(SessionError::storage(MAP_KEY)),
        }
    }

    fn write_handoff(&self, handoff: SceneHandoff) -> Result<(), SessionError> {
        handoff
            .write(&self.storage)
            .map_err(SessionError::storage("SceneHandoff"))
    }

    fn ensure_playable(&self) -> Result<(), SessionError> {
        if self.encounter.is_active() {
            return Err(SessionError::EncounterActive);
        }
        if self.progression.is_game_over() {
            return Err(SessionError::GameOver);
        }
        Ok(())
    }

    fn regenerate_map(&mut self) -> Result<(), SessionError> {
        let index = self.progression.note_map_generated();
        let seed = self
            .seed
            .wrapping_add(index.wrapping_mul(MAP_SEED_STEP));
        let act_boss = self.progression.current_act_boss();
        let map = self.generator.generate(act_boss, seed)?;
        log::info!("new map #{index} for act boss {act_boss}");
        self.map = Some(map);
        self.save_progression()?;
        self.save_map()?;
        self.events.push(GameEvent::MapRegenerated);
        Ok(())
    }

    /// Map scene load: consume the scene hand-off, repair an interrupted
    /// encounter, then replace the map if it is missing or finished.
    ///
    /// # Errors
    ///
    /// Fails while an encounter is active, after a game over, or when
    /// storage rejects a write.
    pub fn enter_map(&mut self) -> Result<MapEntry, SessionError> {
        self.ensure_playable()?;
        let handoff =
            SceneHandoff::take(&self.storage).map_err(SessionError::storage("SceneHandoff"))?;

        let recovery = RecoveryReconciler::reconcile(self.map.as_mut(), &mut self.progression);
        if recovery.path_changed() {
            self.save_map()?;
        }
        if recovery.marker_cleared() {
            self.save_progression()?;
        }

        let regenerated = match &self.map {
            None => true,
            Some(map) => RecoveryReconciler::needs_regeneration(map),
        };
        if regenerated {
            self.regenerate_map()?;
        }
        log::debug!("entered map (recovery {recovery:?}, regenerated {regenerated})");
        Ok(MapEntry {
            recovery,
            regenerated,
            handoff,
        })
    }

    /// Discard the current map and generate a new one for the act boss.
    ///
    /// # Errors
    ///
    /// Fails while an encounter is active, after a game over, or when
    /// storage rejects a write.
    pub fn request_new_map(&mut self) -> Result<(), SessionError> {
        self.ensure_playable()?;
        self.regenerate_map()
    }

    /// Try to move to `coord`.
    ///
    /// # Errors
    ///
    /// Fails while an encounter is active, before a map exists, or when the
    /// node's opponent data is missing or invalid. Nothing is mutated on
    /// failure.
    pub fn select_node(&mut self, coord: Coord) -> Result<SelectOutcome, SessionError> {
        self.ensure_playable()?;
        let map = self.map.as_ref().ok_or(SessionError::NoMap)?;
        let replay = match TraversalPolicy::evaluate(map, &self.progression, coord) {
            TraversalDecision::Allowed { replay } => replay,
            TraversalDecision::Denied(reason) => {
                log::debug!("selection of {coord} denied: {reason}");
                return Ok(SelectOutcome::Denied(reason));
            }
        };
        let node = map.get_node(coord).cloned().ok_or(SessionError::NoMap)?;

        if node.kind.is_battle() {
            let session = self.prepare_encounter(&node)?.at_node(Some(node.id.clone()), replay);
            if !replay {
                self.append_to_path(coord)?;
                self.progression.set_pending_node_point(coord);
                self.save_progression()?;
            }
            self.encounter.begin(session, &mut self.events)?;
            self.entered_kind = Some(node.kind);
            self.write_handoff(SceneHandoff::entering(node.kind, replay))?;
            return Ok(SelectOutcome::EncounterStarted { replay });
        }

        self.append_to_path(coord)?;
        let resolution = self.resolve_non_battle(&node);
        self.progression.mark_node_instance_defeated(&node.id);
        self.save_progression()?;
        Ok(SelectOutcome::Resolved(resolution))
    }

    fn append_to_path(&mut self, coord: Coord) -> Result<(), SessionError> {
        let map = self.map.as_mut().ok_or(SessionError::NoMap)?;
        map.append(coord)?;
        self.save_map()
    }

    fn prepare_encounter(&self, node: &Node) -> Result<EncounterSession, SessionError> {
        let unknown = || EncounterError::UnknownOpponent(node.blueprint_name.clone());
        let session = match node.kind {
            NodeKind::Boss => {
                let id: BossId = node.blueprint_name.parse().map_err(|_| unknown())?;
                let data = self.catalog.boss(id).ok_or_else(unknown)?;
                EncounterSession::for_boss(data)?
            }
            _ => {
                let id: MinionId = node.blueprint_name.parse().map_err(|_| unknown())?;
                let data = self.catalog.minion(id).ok_or_else(unknown)?;
                EncounterSession::for_minion(data, id.boss())?
            }
        };
        Ok(session)
    }

    fn resolve_non_battle(&mut self, node: &Node) -> NodeResolution {
        match node.kind {
            NodeKind::Regen => {
                let change = apply_health(
                    &mut self.progression,
                    self.config.progression.regen_heal,
                    &mut self.events,
                );
                NodeResolution::Regen {
                    healed: change.current - change.previous,
                }
            }
            NodeKind::Shop => {
                self.events.push(GameEvent::ShopOpened);
                NodeResolution::Shop
            }
            _ => {
                self.events.push(GameEvent::TreasureFound);
                NodeResolution::Treasure
            }
        }
    }

    /// Feed the result of one blackjack round into the active encounter.
    ///
    /// # Errors
    ///
    /// Returns [`EncounterError::NotActive`] outside a fight, or a storage
    /// failure.
    pub fn report_round_outcome(
        &mut self,
        won: bool,
        damage: f32,
    ) -> Result<RoundOutcome, SessionError> {
        if won {
            let completion = self
                .encounter
                .on_round_win(&mut self.progression, &mut self.events)?;
            return match completion {
                Some(completion) => {
                    self.finish_encounter(&completion)?;
                    Ok(RoundOutcome::Completed(completion))
                }
                None => Ok(RoundOutcome::Continue),
            };
        }
        let change =
            self.encounter
                .on_round_lose(damage, &mut self.progression, &mut self.events)?;
        self.save_progression()?;
        if change.game_over {
            self.game_over()?;
            return Ok(RoundOutcome::GameOver);
        }
        Ok(RoundOutcome::Continue)
    }

    /// Walk away from the active fight with nothing gained.
    ///
    /// # Errors
    ///
    /// Returns [`EncounterError::NotActive`] outside a fight, or a storage
    /// failure.
    pub fn forfeit_encounter(&mut self) -> Result<Completion, SessionError> {
        let completion = self
            .encounter
            .complete(false, &mut self.progression, &mut self.events)?;
        self.finish_encounter(&completion)?;
        Ok(completion)
    }

    fn finish_encounter(&mut self, completion: &Completion) -> Result<(), SessionError> {
        self.save_progression()?;
        let kind = self.entered_kind.take();
        self.write_handoff(SceneHandoff::returning(kind, completion.replay))
    }

    /// # Errors
    ///
    /// Returns [`ProgressionError::BossLocked`] for a locked boss.
    pub fn select_boss(&mut self, boss: BossId) -> Result<(), SessionError> {
        self.progression.select_boss(boss)?;
        self.save_progression()
    }

    /// Start a fight against the selected boss, consuming the selection.
    ///
    /// # Errors
    ///
    /// Fails when nothing is selected, the boss has no valid data, a fight
    /// is already running, or the run is over.
    pub fn start_selected_boss(&mut self) -> Result<BossId, SessionError> {
        self.ensure_playable()?;
        let boss = self
            .progression
            .selected_boss()
            .ok_or(SessionError::NoBossSelected)?;
        let data = self
            .catalog
            .boss(boss)
            .ok_or_else(|| EncounterError::UnknownOpponent(boss.to_string()))?;
        let replay = self.progression.is_boss_defeated(boss);
        let session = EncounterSession::for_boss(data)?.at_node(None, replay);
        self.progression.take_selected_boss();
        self.save_progression()?;
        self.encounter.begin(session, &mut self.events)?;
        self.entered_kind = Some(NodeKind::Boss);
        self.write_handoff(SceneHandoff::entering(NodeKind::Boss, replay))?;
        Ok(boss)
    }

    /// Direct damage from a card effect.
    ///
    /// # Errors
    ///
    /// Returns a storage failure.
    pub fn damage_player(&mut self, amount: f32) -> Result<HealthChange, SessionError> {
        let change = apply_health(&mut self.progression, -amount.max(0.0), &mut self.events);
        self.save_progression()?;
        if change.game_over {
            self.game_over()?;
        }
        Ok(change)
    }

    /// Direct healing from a card effect.
    ///
    /// # Errors
    ///
    /// Returns a storage failure.
    pub fn heal_player(&mut self, amount: f32) -> Result<HealthChange, SessionError> {
        let change = apply_health(&mut self.progression, amount.max(0.0), &mut self.events);
        self.save_progression()?;
        Ok(change)
    }

    fn game_over(&mut self) -> Result<(), SessionError> {
        log::info!("game over");
        self.events.push(GameEvent::GameOver);
        if let Some(session) = self.encounter.abort() {
            log::debug!("abandoned encounter against {}", session.name);
        }
        self.entered_kind = None;
        self.map = None;
        self.save_map()?;
        self.progression.wipe_for_game_over();
        self.save_progression()?;
        self.write_handoff(SceneHandoff::to_title())
    }

    /// Throw away the run and start a fresh save at full health.
    ///
    /// # Errors
    ///
    /// Returns a storage failure.
    pub fn reset_progression(&mut self) -> Result<(), SessionError> {
        self.encounter.abort();
        self.entered_kind = None;
        self.progression = self.progression.restarted();
        self.save_progression()?;
        self.map = None;
        self.save_map()?;
        self.events
            .push(GameEvent::PlayerHealthChanged(self.progression.player_health()));
        log::info!("progression reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HANDOFF_RETURN_TO_TITLE;
    use crate::map::GraphBuilder;
    use crate::map::graph::tests::node;
    use crate::storage::{MemoryStorage, StorageError};
    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use std::collections::BTreeSet;

    /// Memory storage whose map writes always fail.
    #[derive(Clone)]
    struct MapWriteFails(MemoryStorage);

    impl GameStorage for MapWriteFails {
        type Error = StorageError;

        fn load_document<T>(&self, key: &str) -> Result<Option<T>, Self::Error>
        where
            T: DeserializeOwned,
        {
            self.0.load_document(key)
        }

        fn save_document<T>(&self, key: &str, value: &T) -> Result<(), Self::Error>
        where
            T: Serialize,
        {
            if key == MAP_KEY {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.0.save_document(key, value)
        }

        fn delete_document(&self, key: &str) -> Result<(), Self::Error> {
            self.0.delete_document(key)
        }
    }

    /// Shop, regen and treasure on layer 0, all leading to the boss.
    fn side_rooms() -> MapState {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(node(0, 0, NodeKind::Shop, "shop"))
            .add_node(node(1, 0, NodeKind::Regen, "regen"))
            .add_node(node(2, 0, NodeKind::Treasure, "treasure"))
            .add_node(node(0, 1, NodeKind::Boss, "dealer"));
        for x in 0..3 {
            builder.connect(Coord::new(x, 0), Coord::new(0, 1));
        }
        MapState::new(builder.build().unwrap())
    }

    fn open_with_map(storage: &MemoryStorage, map: &MapState) -> RunSession<MemoryStorage> {
        storage.save_document(MAP_KEY, map).unwrap();
        let mut session = open(storage);
        assert!(!session.enter_map().unwrap().regenerated);
        session.drain_events();
        session
    }

    fn assert_walked_without_marker(
        session: &RunSession<MemoryStorage>,
        storage: &MemoryStorage,
        coord: Coord,
    ) {
        assert_eq!(session.map().unwrap().tip(), Some(coord));
        assert!(session.progression().pending_node_point().is_none());
        assert!(!session.encounter().is_active());
        let node = session.map().unwrap().get_node(coord).unwrap();
        assert!(session.progression().is_node_instance_defeated(&node.id));

        let stored_map: MapState = storage.load_document(MAP_KEY).unwrap().unwrap();
        assert_eq!(stored_map.path(), &[coord]);
        let stored: ProgressionStore = storage.load_document(PROGRESSION_KEY).unwrap().unwrap();
        assert!(stored.pending_node_point().is_none());
        assert!(stored.is_node_instance_defeated(&node.id));
    }

    fn open(storage: &MemoryStorage) -> RunSession<MemoryStorage> {
        RunSession::open(
            storage.clone(),
            EncounterCatalog::load_from_static(),
            EngineConfig::default(),
            42,
        )
        .unwrap()
    }

    fn entry_minion(session: &RunSession<MemoryStorage>) -> Coord {
        session
            .map()
            .unwrap()
            .graph
            .nodes_in_layer(0)
            .next()
            .unwrap()
            .coord
    }

    #[test]
    fn open_persists_fresh_progression() {
        let storage = MemoryStorage::new();
        let mut session = open(&storage);
        assert!(storage.contains(PROGRESSION_KEY));
        assert!(session.map().is_none());
        assert!(matches!(
            session.select_node(Coord::new(0, 0)),
            Err(SessionError::NoMap)
        ));
        let entry = session.enter_map().unwrap();
        assert!(entry.regenerated);
        assert!(storage.contains(MAP_KEY));
        assert!(session.drain_events().contains(&GameEvent::MapRegenerated));
    }

    #[test]
    fn selection_is_rejected_mid_fight() {
        let storage = MemoryStorage::new();
        let mut session = open(&storage);
        session.enter_map().unwrap();
        let coord = entry_minion(&session);
        assert_eq!(
            session.select_node(coord).unwrap(),
            SelectOutcome::EncounterStarted { replay: false }
        );
        assert!(matches!(
            session.select_node(coord),
            Err(SessionError::EncounterActive)
        ));
        assert!(matches!(session.enter_map(), Err(SessionError::EncounterActive)));
    }

    #[test]
    fn bad_blueprint_is_rejected_before_any_mutation() {
        let storage = MemoryStorage::new();
        let mut session = open(&storage);
        session.enter_map().unwrap();
        let coord = entry_minion(&session);
        let mut catalog = EncounterCatalog::load_from_static();
        catalog.minions.clear();
        let mut session = RunSession::open(storage.clone(), catalog, EngineConfig::default(), 42)
            .unwrap();
        session.enter_map().unwrap();
        let before = storage.raw(MAP_KEY);
        assert!(matches!(
            session.select_node(coord),
            Err(SessionError::Encounter(EncounterError::UnknownOpponent(_)))
        ));
        assert!(session.map().unwrap().path().is_empty());
        assert!(session.progression().pending_node_point().is_none());
        assert_eq!(storage.raw(MAP_KEY), before);
    }

    #[test]
    fn game_over_clears_run_and_points_to_title() {
        let storage = MemoryStorage::new();
        let mut session = open(&storage);
        session.enter_map().unwrap();
        let coord = entry_minion(&session);
        session.select_node(coord).unwrap();
        session.drain_events();

        let outcome = session.report_round_outcome(false, 250.0).unwrap();
        assert_eq!(outcome, RoundOutcome::GameOver);
        assert!(!session.encounter().is_active());
        assert!(!storage.contains(MAP_KEY));
        assert!(storage.contains(HANDOFF_RETURN_TO_TITLE));
        let events = session.drain_events();
        assert_eq!(events.iter().filter(|e| **e == GameEvent::GameOver).count(), 1);

        assert!(matches!(session.enter_map(), Err(SessionError::GameOver)));
        let again = session.damage_player(5.0).unwrap();
        assert!(!again.game_over);

        session.reset_progression().unwrap();
        assert!(!session.progression().is_game_over());
        let entry = session.enter_map().unwrap();
        assert!(entry.handoff.return_to_title);
        assert!(entry.regenerated);
    }

    #[test]
    fn selected_boss_fight_is_consumed() {
        let storage = MemoryStorage::new();
        let mut session = open(&storage);
        assert!(matches!(
            session.start_selected_boss(),
            Err(SessionError::NoBossSelected)
        ));
        assert!(matches!(
            session.select_boss(BossId::Emperor),
            Err(SessionError::Progression(ProgressionError::BossLocked(_)))
        ));
        session.select_boss(BossId::Dealer).unwrap();
        assert_eq!(session.start_selected_boss().unwrap(), BossId::Dealer);
        assert!(session.progression().selected_boss().is_none());
        let hp = session.encounter().session().unwrap().max_health;
        for _ in 1..hp {
            assert_eq!(
                session.report_round_outcome(true, 0.0).unwrap(),
                RoundOutcome::Continue
            );
        }
        let RoundOutcome::Completed(done) = session.report_round_outcome(true, 0.0).unwrap() else {
            panic!("boss fight should complete");
        };
        assert!(done.won);
        assert!(session.progression().is_boss_defeated(BossId::Dealer));
        assert_eq!(session.progression().current_act_boss(), BossId::Magician);
    }

    #[test]
    fn forfeit_returns_to_map_without_rewards() {
        let storage = MemoryStorage::new();
        let mut session = open(&storage);
        session.enter_map().unwrap();
        let coord = entry_minion(&session);
        session.select_node(coord).unwrap();
        let done = session.forfeit_encounter().unwrap();
        assert!(!done.won);
        assert!(session.progression().defeated_node_instances().is_empty());
        let entry = session.enter_map().unwrap();
        assert!(entry.handoff.return_to_map);
        assert_eq!(entry.recovery, RecoveryOutcome::Nothing);
        assert_eq!(session.map().unwrap().path(), &[coord]);
    }

    #[test]
    fn shop_node_is_walked_and_saved_without_a_marker() {
        let storage = MemoryStorage::new();
        let mut session = open_with_map(&storage, &side_rooms());
        let shop = Coord::new(0, 0);
        assert_eq!(
            session.select_node(shop).unwrap(),
            SelectOutcome::Resolved(NodeResolution::Shop)
        );
        assert_walked_without_marker(&session, &storage, shop);
        assert_eq!(session.drain_events(), vec![GameEvent::ShopOpened]);
    }

    #[test]
    fn treasure_node_is_walked_and_saved_without_a_marker() {
        let storage = MemoryStorage::new();
        let mut session = open_with_map(&storage, &side_rooms());
        let treasure = Coord::new(2, 0);
        assert_eq!(
            session.select_node(treasure).unwrap(),
            SelectOutcome::Resolved(NodeResolution::Treasure)
        );
        assert_walked_without_marker(&session, &storage, treasure);
        assert_eq!(session.drain_events(), vec![GameEvent::TreasureFound]);
    }

    #[test]
    fn regen_node_heals_configured_amount_up_to_max() {
        let regen = Coord::new(1, 0);
        let heal = EngineConfig::default().progression.regen_heal;

        for (damage, expected) in [(40.0_f32, heal), (10.0, 10.0)] {
            let storage = MemoryStorage::new();
            let mut session = open_with_map(&storage, &side_rooms());
            session.damage_player(damage).unwrap();
            session.drain_events();

            let SelectOutcome::Resolved(NodeResolution::Regen { healed }) =
                session.select_node(regen).unwrap()
            else {
                panic!("regen node should resolve immediately");
            };
            assert!((healed - expected).abs() < f32::EPSILON);
            let health = 100.0 - damage + expected;
            assert!((session.progression().player_health() - health).abs() < f32::EPSILON);
            assert_eq!(
                session.drain_events(),
                vec![GameEvent::PlayerHealthChanged(health)]
            );
            assert_walked_without_marker(&session, &storage, regen);
            let stored: ProgressionStore =
                storage.load_document(PROGRESSION_KEY).unwrap().unwrap();
            assert!((stored.player_health() - health).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn failed_map_write_never_reuses_the_generation_index() {
        let storage = MemoryStorage::new();
        let mut session = RunSession::open(
            MapWriteFails(storage.clone()),
            EncounterCatalog::load_from_static(),
            EngineConfig::default(),
            42,
        )
        .unwrap();
        assert!(matches!(
            session.enter_map(),
            Err(SessionError::Storage { key: MAP_KEY, .. })
        ));
        drop(session);

        let stored: ProgressionStore = storage.load_document(PROGRESSION_KEY).unwrap().unwrap();
        assert_eq!(stored.maps_generated(), 1);
        assert!(!storage.contains(MAP_KEY));

        let lost: BTreeSet<_> = MapGenerator::new(EngineConfig::default().map)
            .generate(BossId::Dealer, 42)
            .unwrap()
            .graph
            .nodes()
            .map(|n| n.id.clone())
            .collect();
        let mut resumed = open(&storage);
        assert!(resumed.enter_map().unwrap().regenerated);
        assert_eq!(resumed.progression().maps_generated(), 2);
        assert!(
            resumed
                .map()
                .unwrap()
                .graph
                .nodes()
                .all(|n| !lost.contains(&n.id))
        );
    }

    #[test]
    fn reopening_after_game_over_starts_a_fresh_save_at_the_title() {
        let storage = MemoryStorage::new();
        let mut session = open(&storage);
        session.enter_map().unwrap();
        assert!(session.damage_player(500.0).unwrap().game_over);
        let maps = session.progression().maps_generated();
        drop(session);

        let mut reopened = open(&storage);
        assert!(!reopened.progression().is_game_over());
        assert!((reopened.progression().player_health() - 100.0).abs() < f32::EPSILON);
        assert_eq!(reopened.progression().maps_generated(), maps);
        let stored: ProgressionStore = storage.load_document(PROGRESSION_KEY).unwrap().unwrap();
        assert!(!stored.is_game_over());

        let entry = reopened.enter_map().unwrap();
        assert!(entry.handoff.return_to_title);
        assert!(entry.regenerated);
    }
}
