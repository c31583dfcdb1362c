//! Outbound notifications for presentation collaborators.
use serde::{Deserialize, Serialize};

use crate::ids::{BossId, MinionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum GameEvent {
    PlayerHealthChanged(f32),
    EncounterHealthChanged(i32),
    EncounterStarted(String),
    MinionDefeated(MinionId),
    BossDefeated(BossId),
    BossUnlocked(BossId),
    GameOver,
    ReturnToMap,
    ShopOpened,
    TreasureFound,
    MapRegenerated,
    RunCompleted,
}

/// Ordered buffer of events raised during a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GameEvent) {
        log::trace!("event {event:?}");
        self.events.push(event);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.iter().filter(|event| pred(event)).count()
    }
}
