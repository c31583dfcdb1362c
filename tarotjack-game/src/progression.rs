//! Durable run progression: player health, boss unlocks and defeats, and
//! the per-placement clear record.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::ids::{BossId, Coord, MinionId, NodeInstanceId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    #[error("boss {0} is still locked")]
    BossLocked(BossId),
}

/// Progress within one boss's act.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActState {
    #[serde(default)]
    pub defeated_minions: BTreeSet<MinionId>,
    #[serde(default)]
    pub boss_unlocked_in_act: bool,
    #[serde(default)]
    pub completed: bool,
}

/// Result of a single health mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthChange {
    pub previous: f32,
    pub current: f32,
    /// True exactly once per run: the call that took health to zero.
    pub game_over: bool,
}

/// Result of recording a minion kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinionDefeat {
    pub newly_defeated: bool,
    pub boss_unlocked: Option<BossId>,
}

/// Result of closing out an act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActAdvance {
    AlreadyComplete,
    NextAct(BossId),
    RunComplete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionStore {
    player_health: f32,
    #[serde(default = "ProgressionStore::default_max_health")]
    max_health: f32,
    #[serde(default)]
    unlocked_bosses: BTreeSet<BossId>,
    #[serde(default)]
    defeated_bosses: BTreeSet<BossId>,
    #[serde(default)]
    act_state: BTreeMap<BossId, ActState>,
    #[serde(default)]
    defeated_node_instances: BTreeSet<NodeInstanceId>,
    #[serde(default)]
    selected_boss: Option<BossId>,
    #[serde(default)]
    current_act_boss: Option<BossId>,
    #[serde(default)]
    pending_node_point: Option<String>,
    #[serde(default)]
    game_over: bool,
    /// Maps generated over the life of this save; salts map seeds.
    #[serde(default)]
    maps_generated: u64,
}

impl Default for ProgressionStore {
    fn default() -> Self {
        Self::new(Self::default_max_health())
    }
}

impl ProgressionStore {
    const fn default_max_health() -> f32 {
        100.0
    }

    /// Fresh save: first boss unlocked, full health.
    #[must_use]
    pub fn new(max_health: f32) -> Self {
        Self {
            player_health: max_health,
            max_health,
            unlocked_bosses: BTreeSet::from([BossId::first()]),
            defeated_bosses: BTreeSet::new(),
            act_state: BTreeMap::new(),
            defeated_node_instances: BTreeSet::new(),
            selected_boss: None,
            current_act_boss: Some(BossId::first()),
            pending_node_point: None,
            game_over: false,
            maps_generated: 0,
        }
    }

    /// Re-apply configuration after loading and repair invariants that a
    /// hand-edited or older document may break.
    #[must_use]
    pub fn rehydrate(mut self, max_health: f32) -> Self {
        self.max_health = max_health;
        if !self.player_health.is_finite() {
            self.player_health = max_health;
        }
        self.player_health = self.player_health.clamp(0.0, max_health);
        if self.game_over {
            self.player_health = 0.0;
        }
        let defeated: Vec<BossId> = self.defeated_bosses.iter().copied().collect();
        self.unlocked_bosses.extend(defeated);
        if self.unlocked_bosses.is_empty() {
            self.unlocked_bosses.insert(BossId::first());
        }
        if self.current_act_boss.is_none() {
            self.current_act_boss = Some(BossId::first());
        }
        self
    }

    #[must_use]
    pub const fn player_health(&self) -> f32 {
        self.player_health
    }

    #[must_use]
    pub const fn max_health(&self) -> f32 {
        self.max_health
    }

    #[must_use]
    pub const fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Apply a signed health change, clamped to `[0, max_health]`.
    ///
    /// Health is frozen at zero once the game-over edge has fired, so the
    /// edge can never fire twice in one run.
    pub fn apply_health_delta(&mut self, delta: f32) -> HealthChange {
        let previous = self.player_health;
        if self.game_over || !delta.is_finite() {
            return HealthChange {
                previous,
                current: previous,
                game_over: false,
            };
        }
        let current = (previous + delta).clamp(0.0, self.max_health);
        self.player_health = current;
        let game_over = current <= 0.0 && previous > 0.0;
        if game_over {
            self.game_over = true;
        }
        HealthChange {
            previous,
            current,
            game_over,
        }
    }

    pub fn damage(&mut self, amount: f32) -> HealthChange {
        self.apply_health_delta(-amount.max(0.0))
    }

    pub fn heal(&mut self, amount: f32) -> HealthChange {
        self.apply_health_delta(amount.max(0.0))
    }

    #[must_use]
    pub fn is_boss_unlocked(&self, boss: BossId) -> bool {
        self.unlocked_bosses.contains(&boss)
    }

    #[must_use]
    pub fn is_boss_defeated(&self, boss: BossId) -> bool {
        self.defeated_bosses.contains(&boss)
    }

    #[must_use]
    pub const fn unlocked_bosses(&self) -> &BTreeSet<BossId> {
        &self.unlocked_bosses
    }

    #[must_use]
    pub const fn defeated_bosses(&self) -> &BTreeSet<BossId> {
        &self.defeated_bosses
    }

    #[must_use]
    pub fn act_state(&self, boss: BossId) -> Option<&ActState> {
        self.act_state.get(&boss)
    }

    #[must_use]
    pub fn is_minion_defeated(&self, boss: BossId, minion: MinionId) -> bool {
        self.act_state
            .get(&boss)
            .is_some_and(|act| act.defeated_minions.contains(&minion))
    }

    /// Record a minion kill for `boss`, unlocking the boss once `threshold`
    /// distinct minions have fallen. Repeat kills change nothing.
    pub fn mark_minion_defeated(
        &mut self,
        boss: BossId,
        minion: MinionId,
        threshold: usize,
    ) -> MinionDefeat {
        let act = self.act_state.entry(boss).or_default();
        let newly_defeated = act.defeated_minions.insert(minion);
        let mut boss_unlocked = None;
        if act.defeated_minions.len() >= threshold && !act.boss_unlocked_in_act {
            act.boss_unlocked_in_act = true;
            let defeats = act.defeated_minions.len();
            if self.unlocked_bosses.insert(boss) {
                boss_unlocked = Some(boss);
                log::info!("boss {boss} unlocked after {defeats} minion defeats");
            }
        }
        MinionDefeat {
            newly_defeated,
            boss_unlocked,
        }
    }

    /// Record a boss kill. Returns false if it was already recorded.
    pub fn mark_boss_defeated(&mut self, boss: BossId) -> bool {
        self.unlocked_bosses.insert(boss);
        self.defeated_bosses.insert(boss)
    }

    /// Close the act of `boss` and move the act pointer forward.
    pub fn complete_act(&mut self, boss: BossId) -> ActAdvance {
        let act = self.act_state.entry(boss).or_default();
        if act.completed {
            return ActAdvance::AlreadyComplete;
        }
        act.completed = true;
        match boss.next() {
            Some(next) => {
                if self.current_act_boss.is_none_or(|current| current <= boss) {
                    self.current_act_boss = Some(next);
                }
                ActAdvance::NextAct(next)
            }
            None => ActAdvance::RunComplete,
        }
    }

    pub fn mark_node_instance_defeated(&mut self, id: &NodeInstanceId) -> bool {
        if self.defeated_node_instances.contains(id) {
            return false;
        }
        self.defeated_node_instances.insert(id.clone())
    }

    #[must_use]
    pub fn is_node_instance_defeated(&self, id: &NodeInstanceId) -> bool {
        self.defeated_node_instances.contains(id)
    }

    #[must_use]
    pub const fn defeated_node_instances(&self) -> &BTreeSet<NodeInstanceId> {
        &self.defeated_node_instances
    }

    /// Boss whose act is being played; the first boss on a fresh save.
    #[must_use]
    pub fn current_act_boss(&self) -> BossId {
        self.current_act_boss.unwrap_or_else(BossId::first)
    }

    /// # Errors
    ///
    /// Returns [`ProgressionError::BossLocked`] for bosses not yet unlocked.
    pub fn select_boss(&mut self, boss: BossId) -> Result<(), ProgressionError> {
        if !self.is_boss_unlocked(boss) {
            return Err(ProgressionError::BossLocked(boss));
        }
        self.selected_boss = Some(boss);
        Ok(())
    }

    #[must_use]
    pub const fn selected_boss(&self) -> Option<BossId> {
        self.selected_boss
    }

    pub fn take_selected_boss(&mut self) -> Option<BossId> {
        self.selected_boss.take()
    }

    #[must_use]
    pub fn pending_node_point(&self) -> Option<&str> {
        self.pending_node_point.as_deref()
    }

    pub fn set_pending_node_point(&mut self, coord: Coord) {
        self.pending_node_point = Some(coord.to_string());
    }

    /// Store a raw marker, as an older or damaged save might carry.
    pub fn set_pending_marker_raw(&mut self, raw: impl Into<String>) {
        self.pending_node_point = Some(raw.into());
    }

    pub fn clear_pending_node_point(&mut self) -> Option<String> {
        self.pending_node_point.take()
    }

    #[must_use]
    pub const fn maps_generated(&self) -> u64 {
        self.maps_generated
    }

    /// Count a new map and return its generation index.
    pub const fn note_map_generated(&mut self) -> u64 {
        let index = self.maps_generated;
        self.maps_generated = self.maps_generated.wrapping_add(1);
        index
    }

    /// Fresh save that keeps the map counter, so node instance ids from
    /// earlier runs are never handed out again.
    #[must_use]
    pub fn restarted(&self) -> Self {
        let mut fresh = Self::new(self.max_health);
        fresh.maps_generated = self.maps_generated;
        fresh
    }

    /// Wipe run progress after a game over. Health stays at zero and the
    /// game-over latch stays set until a fresh save replaces this one.
    pub fn wipe_for_game_over(&mut self) {
        *self = self.restarted();
        self.player_health = 0.0;
        self.game_over = true;
    }
}
