//! Tunable engine configuration.
//!
//! Every field carries a serde default so partial JSON overrides stay valid;
//! `EngineConfig::default()` reads the embedded asset and falls back to the
//! compiled defaults if that asset ever fails to parse.
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_ENGINE_CONFIG: &str = include_str!("../assets/data/engine.json");

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f32,
        value: f32,
    },
    #[error("layer width bounds invalid (min {min} > max {max})")]
    WidthRange { min: u8, max: u8 },
    #[error("node kind weights must not all be zero")]
    EmptyWeights,
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "ProgressionConfig::default_max_health")]
    pub max_health: f32,
    /// Distinct minions of a boss that must fall before the boss unlocks.
    #[serde(default = "ProgressionConfig::default_minions_to_unlock_boss")]
    pub minions_to_unlock_boss: usize,
    #[serde(default = "ProgressionConfig::default_regen_heal")]
    pub regen_heal: f32,
}

impl ProgressionConfig {
    const fn default_max_health() -> f32 {
        100.0
    }

    const fn default_minions_to_unlock_boss() -> usize {
        2
    }

    const fn default_regen_heal() -> f32 {
        25.0
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] for non-positive health or unlock thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_health <= 0.0 || !self.max_health.is_finite() {
            return Err(ConfigError::MinViolation {
                field: "max_health",
                min: f32::EPSILON,
                value: self.max_health,
            });
        }
        if self.minions_to_unlock_boss == 0 {
            return Err(ConfigError::MinViolation {
                field: "minions_to_unlock_boss",
                min: 1.0,
                value: 0.0,
            });
        }
        if self.regen_heal < 0.0 {
            return Err(ConfigError::MinViolation {
                field: "regen_heal",
                min: 0.0,
                value: self.regen_heal,
            });
        }
        Ok(())
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            max_health: Self::default_max_health(),
            minions_to_unlock_boss: Self::default_minions_to_unlock_boss(),
            regen_heal: Self::default_regen_heal(),
        }
    }
}

/// Relative draw weights for the middle layers of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindWeights {
    #[serde(default)]
    pub minion: u32,
    #[serde(default)]
    pub shop: u32,
    #[serde(default)]
    pub regen: u32,
    #[serde(default)]
    pub treasure: u32,
}

impl KindWeights {
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.minion + self.shop + self.regen + self.treasure
    }
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            minion: 60,
            shop: 12,
            regen: 12,
            treasure: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Total layers including the entry layer and the stage boss.
    #[serde(default = "MapConfig::default_layers")]
    pub layers: u8,
    #[serde(default = "MapConfig::default_min_width")]
    pub min_width: u8,
    #[serde(default = "MapConfig::default_max_width")]
    pub max_width: u8,
    #[serde(default = "MapConfig::default_layer_spacing")]
    pub layer_spacing: f32,
    #[serde(default = "MapConfig::default_node_spacing")]
    pub node_spacing: f32,
    #[serde(default = "MapConfig::default_jitter")]
    pub jitter: f32,
    /// Chance of a second outgoing edge per node.
    #[serde(default = "MapConfig::default_branch_chance")]
    pub branch_chance: f32,
    #[serde(default)]
    pub weights: KindWeights,
}

impl MapConfig {
    const fn default_layers() -> u8 {
        7
    }

    const fn default_min_width() -> u8 {
        2
    }

    const fn default_max_width() -> u8 {
        4
    }

    const fn default_layer_spacing() -> f32 {
        2.5
    }

    const fn default_node_spacing() -> f32 {
        3.0
    }

    const fn default_jitter() -> f32 {
        0.35
    }

    const fn default_branch_chance() -> f32 {
        0.35
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the layout cannot produce a valid map.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers < 3 {
            return Err(ConfigError::MinViolation {
                field: "layers",
                min: 3.0,
                value: f32::from(self.layers),
            });
        }
        if self.min_width == 0 {
            return Err(ConfigError::MinViolation {
                field: "min_width",
                min: 1.0,
                value: 0.0,
            });
        }
        if self.min_width > self.max_width {
            return Err(ConfigError::WidthRange {
                min: self.min_width,
                max: self.max_width,
            });
        }
        for (field, value) in [
            ("layer_spacing", self.layer_spacing),
            ("node_spacing", self.node_spacing),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::MinViolation {
                    field,
                    min: f32::EPSILON,
                    value,
                });
            }
        }
        if self.jitter < 0.0 {
            return Err(ConfigError::MinViolation {
                field: "jitter",
                min: 0.0,
                value: self.jitter,
            });
        }
        if !(0.0..=1.0).contains(&self.branch_chance) {
            return Err(ConfigError::RangeViolation {
                field: "branch_chance",
                min: 0.0,
                max: 1.0,
                value: self.branch_chance,
            });
        }
        if self.weights.total() == 0 {
            return Err(ConfigError::EmptyWeights);
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            layers: Self::default_layers(),
            min_width: Self::default_min_width(),
            max_width: Self::default_max_width(),
            layer_spacing: Self::default_layer_spacing(),
            node_spacing: Self::default_node_spacing(),
            jitter: Self::default_jitter(),
            branch_chance: Self::default_branch_chance(),
            weights: KindWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub map: MapConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        serde_json::from_str(DEFAULT_ENGINE_CONFIG).unwrap_or(Self {
            progression: ProgressionConfig::default(),
            map: MapConfig::default(),
        })
    }
}

impl EngineConfig {
    /// Parse a JSON override.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in either section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.progression.validate()?;
        self.map.validate()
    }
}
