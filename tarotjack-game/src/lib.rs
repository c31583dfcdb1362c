//! Tarotjack Progression Engine
//!
//! Platform-agnostic run state for the Tarotjack card battler: player health,
//! the layered node map, encounter lifecycle, boss unlocks and crash-safe
//! persistence. Rendering and the blackjack round engine live elsewhere and
//! talk to this crate through [`RunSession`].

pub mod config;
pub mod constants;
pub mod data;
pub mod encounter;
pub mod events;
pub mod handoff;
pub mod ids;
pub mod map;
pub mod progression;
pub mod recovery;
pub mod session;
pub mod storage;
pub mod traversal;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig, KindWeights, MapConfig, ProgressionConfig};
pub use data::{BossData, DataLoadError, EncounterCatalog, MinionData, StaticDataLoader};
pub use encounter::{
    Completion, EncounterEngine, EncounterError, EncounterPhase, EncounterSession, OpponentRef,
};
pub use events::{EventQueue, GameEvent};
pub use handoff::SceneHandoff;
pub use ids::{BossId, Coord, MinionId, NodeInstanceId, ParseCoordError, UnknownIdError};
pub use map::{
    GraphError, MapError, MapGenerator, MapState, Node, NodeGraph, NodeKind, NodePosition,
    PathError,
};
pub use progression::{
    ActAdvance, ActState, HealthChange, MinionDefeat, ProgressionError, ProgressionStore,
};
pub use recovery::{RecoveryOutcome, RecoveryReconciler};
pub use session::{MapEntry, NodeResolution, RoundOutcome, RunSession, SelectOutcome, SessionError};
pub use storage::{FileStorage, MemoryStorage, StorageError};
pub use traversal::{DenialReason, TraversalDecision, TraversalPolicy};

/// Trait for abstracting data loading operations
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the opponent catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    fn load_catalog(&self) -> Result<EncounterCatalog, Self::Error>;

    /// Load configuration data for a specific system
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

/// Trait for abstracting document persistence
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the document stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or decoded.
    fn load_document<T>(&self, key: &str) -> Result<Option<T>, Self::Error>
    where
        T: serde::de::DeserializeOwned;

    /// Replace the document stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be saved.
    fn save_document<T>(&self, key: &str, value: &T) -> Result<(), Self::Error>
    where
        T: serde::Serialize;

    /// Delete the document stored under `key`; deleting a missing key is fine
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be deleted.
    fn delete_document(&self, key: &str) -> Result<(), Self::Error>;
}

/// Binds a data source to a save location and boots runs from them
pub struct GameEngine<L, S>
where
    L: DataLoader,
    S: GameStorage,
{
    data_loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: DataLoader,
    S: GameStorage,
{
    /// Create a new game engine with the provided data loader and storage
    pub const fn new(data_loader: L, storage: S) -> Self {
        Self {
            data_loader,
            storage,
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Load and validate the engine configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or breaks an invariant.
    pub fn load_config(&self) -> Result<EngineConfig, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
    {
        let config: EngineConfig = self
            .data_loader
            .load_config("engine")
            .map_err(Into::into)?;
        config.validate()?;
        Ok(config)
    }

    /// Open the saved run (or a fresh one) and enter its map
    ///
    /// # Errors
    ///
    /// Returns an error if data cannot be loaded or storage rejects a write.
    pub fn boot(&self, seed: u64) -> Result<RunSession<S>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S: Clone,
    {
        let config = self.load_config()?;
        let catalog = self.data_loader.load_catalog().map_err(Into::into)?;
        let mut session = RunSession::open(self.storage.clone(), catalog, config, seed)?;
        let entry = session.enter_map()?;
        log::debug!(
            "booted run (seed {seed}, recovery {:?}, regenerated {})",
            entry.recovery,
            entry.regenerated
        );
        Ok(session)
    }

    /// Delete every document of the run
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be deleted.
    pub fn delete_run(&self) -> Result<(), S::Error> {
        self.storage.delete_document(constants::MAP_KEY)?;
        self.storage.delete_document(constants::PROGRESSION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;
    use std::convert::Infallible;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl DataLoader for FixtureLoader {
        type Error = Infallible;

        fn load_catalog(&self) -> Result<EncounterCatalog, Self::Error> {
            Ok(EncounterCatalog::load_from_static())
        }

        fn load_config<T>(&self, _config_name: &str) -> Result<T, Self::Error>
        where
            T: DeserializeOwned,
        {
            let parsed = serde_json::from_str("{}")
                .or_else(|_| serde_json::from_str("null"))
                .unwrap();
            Ok(parsed)
        }
    }

    #[test]
    fn boot_creates_and_resumes_run() {
        let storage = MemoryStorage::new();
        let engine = GameEngine::new(FixtureLoader, storage.clone());
        let session = engine.boot(0xABCD).unwrap();
        let ids = |s: &RunSession<MemoryStorage>| -> Vec<NodeInstanceId> {
            s.map().unwrap().graph.nodes().map(|n| n.id.clone()).collect()
        };
        assert!(storage.contains(constants::PROGRESSION_KEY));
        assert!(storage.contains(constants::MAP_KEY));

        let resumed = engine.boot(0xABCD).unwrap();
        assert_eq!(ids(&resumed), ids(&session));
        assert_eq!(resumed.progression(), session.progression());
    }

    #[test]
    fn boot_after_game_over_returns_a_fresh_run() {
        let storage = MemoryStorage::new();
        let engine = GameEngine::new(StaticDataLoader, storage.clone());
        let mut session = engine.boot(1).unwrap();
        assert!(session.damage_player(500.0).unwrap().game_over);
        drop(session);

        let session = engine.boot(1).unwrap();
        assert!(!session.progression().is_game_over());
        assert!((session.progression().player_health() - 100.0).abs() < f32::EPSILON);
        assert!(session.map().is_some());
        assert!(!storage.contains(constants::HANDOFF_RETURN_TO_TITLE));
    }

    #[test]
    fn boot_with_static_loader_and_delete_run() {
        let engine = GameEngine::new(StaticDataLoader, MemoryStorage::new());
        let session = engine.boot(7).unwrap();
        assert_eq!(
            session.config().progression.minions_to_unlock_boss,
            EngineConfig::default().progression.minions_to_unlock_boss
        );
        engine.delete_run().unwrap();
        assert!(engine.storage().keys().is_empty());
    }
}
