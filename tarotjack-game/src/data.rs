//! Opponent catalog: health and round counts for every boss and minion.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DataLoader;
use crate::ids::{BossId, MinionId};

const DEFAULT_CATALOG: &str = include_str!("../assets/data/catalog.json");
const DEFAULT_ENGINE_CONFIG: &str = include_str!("../assets/data/engine.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossData {
    pub id: BossId,
    pub name: String,
    pub max_health: i32,
    /// Blackjack rounds dealt per hand of the fight.
    pub rounds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinionData {
    pub id: MinionId,
    pub name: String,
    pub max_health: i32,
    pub rounds: u32,
}

impl MinionData {
    #[must_use]
    pub const fn boss(&self) -> BossId {
        self.id.boss()
    }
}

/// Container for all opponent data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EncounterCatalog {
    #[serde(default)]
    pub bosses: Vec<BossData>,
    #[serde(default)]
    pub minions: Vec<MinionData>,
}

impl EncounterCatalog {
    /// Create an empty catalog (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load catalog data from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Catalog bundled with the crate.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_CATALOG).unwrap_or_default()
    }

    #[must_use]
    pub fn boss(&self, id: BossId) -> Option<&BossData> {
        self.bosses.iter().find(|boss| boss.id == id)
    }

    #[must_use]
    pub fn minion(&self, id: MinionId) -> Option<&MinionData> {
        self.minions.iter().find(|minion| minion.id == id)
    }

    /// Minions of `boss` that the catalog knows about, in roster order.
    #[must_use]
    pub fn roster(&self, boss: BossId) -> Vec<MinionId> {
        boss.minions()
            .into_iter()
            .filter(|id| self.minion(*id).is_some())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("no bundled config named '{0}'")]
    UnknownConfig(String),
    #[error("bundled {name} data is malformed: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Serves the JSON assets compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDataLoader;

impl DataLoader for StaticDataLoader {
    type Error = DataLoadError;

    fn load_catalog(&self) -> Result<EncounterCatalog, Self::Error> {
        EncounterCatalog::from_json(DEFAULT_CATALOG).map_err(|source| DataLoadError::Parse {
            name: "catalog".to_string(),
            source,
        })
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        let text = match config_name {
            "engine" => DEFAULT_ENGINE_CONFIG,
            other => return Err(DataLoadError::UnknownConfig(other.to_string())),
        };
        serde_json::from_str(text).map_err(|source| DataLoadError::Parse {
            name: config_name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_catalog_covers_every_opponent() {
        let catalog = EncounterCatalog::load_from_static();
        for boss in BossId::ALL {
            let data = catalog.boss(boss).unwrap();
            assert!(data.max_health > 0 && data.rounds > 0);
            assert_eq!(catalog.roster(boss).len(), 3);
        }
        for minion in MinionId::ALL {
            assert!(catalog.minion(minion).unwrap().max_health > 0);
        }
    }

    #[test]
    fn catalog_from_json_rejects_unknown_ids() {
        let json = r#"{ "minions": [ { "id": "joker", "name": "Joker", "max_health": 1, "rounds": 1 } ] }"#;
        assert!(EncounterCatalog::from_json(json).is_err());

        let json = r#"{ "minions": [ { "id": "oracle", "name": "Oracle", "max_health": 4, "rounds": 2 } ] }"#;
        let catalog = EncounterCatalog::from_json(json).unwrap();
        assert_eq!(catalog.minion(MinionId::Oracle).unwrap().boss(), BossId::Priestess);
        assert!(catalog.boss(BossId::Priestess).is_none());
        assert_eq!(catalog.roster(BossId::Priestess), vec![MinionId::Oracle]);
    }

    #[test]
    fn static_loader_serves_bundled_assets() {
        let loader = StaticDataLoader;
        assert_eq!(loader.load_catalog().unwrap(), EncounterCatalog::load_from_static());
        let config: crate::config::EngineConfig = loader.load_config("engine").unwrap();
        assert_eq!(config, crate::config::EngineConfig::default());
        assert!(matches!(
            loader.load_config::<crate::config::EngineConfig>("weather"),
            Err(DataLoadError::UnknownConfig(_))
        ));
    }
}
