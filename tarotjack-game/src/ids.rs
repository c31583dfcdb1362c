//! Identifiers shared by the map, progression and encounter layers.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Grid coordinate of a map node. The layer of a node is its `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn layer(self) -> i32 {
        self.y
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid coordinate '{0}'")]
pub struct ParseCoordError(pub String);

impl FromStr for Coord {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();
        let (x, y) = trimmed
            .split_once(',')
            .ok_or_else(|| ParseCoordError(s.to_string()))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| ParseCoordError(s.to_string()))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| ParseCoordError(s.to_string()))?;
        Ok(Self { x, y })
    }
}

/// Unique id of one placement of a blueprint on a generated map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeInstanceId(String);

impl NodeInstanceId {
    /// Compose the `kind_blueprint_x_y_random8` form.
    #[must_use]
    pub fn compose(kind: &str, blueprint: &str, coord: Coord, salt: u32) -> Self {
        Self(format!(
            "{kind}_{blueprint}_{}_{}_{salt:08x}",
            coord.x, coord.y
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeInstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for NodeInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} id '{value}'")]
pub struct UnknownIdError {
    pub kind: &'static str,
    pub value: String,
}

/// Act bosses, in act order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BossId {
    Dealer,
    Magician,
    Priestess,
    Emperor,
}

impl BossId {
    pub const ALL: [Self; 4] = [Self::Dealer, Self::Magician, Self::Priestess, Self::Emperor];

    #[must_use]
    pub const fn first() -> Self {
        Self::Dealer
    }

    /// Boss of the following act, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Dealer => Some(Self::Magician),
            Self::Magician => Some(Self::Priestess),
            Self::Priestess => Some(Self::Emperor),
            Self::Emperor => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dealer => "dealer",
            Self::Magician => "magician",
            Self::Priestess => "priestess",
            Self::Emperor => "emperor",
        }
    }

    #[must_use]
    pub const fn minions(self) -> [MinionId; 3] {
        match self {
            Self::Dealer => [MinionId::Pickpocket, MinionId::Cardsharp, MinionId::Bouncer],
            Self::Magician => [
                MinionId::Illusionist,
                MinionId::Apprentice,
                MinionId::Conjurer,
            ],
            Self::Priestess => [MinionId::Acolyte, MinionId::Oracle, MinionId::Veiled],
            Self::Emperor => [MinionId::Herald, MinionId::Sentinel, MinionId::Warden],
        }
    }
}

impl fmt::Display for BossId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BossId {
    type Err = UnknownIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|boss| boss.as_str() == s)
            .ok_or_else(|| UnknownIdError {
                kind: "boss",
                value: s.to_string(),
            })
    }
}

impl From<BossId> for String {
    fn from(value: BossId) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for BossId {
    type Error = UnknownIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Minion archetypes. Each belongs to exactly one act boss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MinionId {
    Pickpocket,
    Cardsharp,
    Bouncer,
    Illusionist,
    Apprentice,
    Conjurer,
    Acolyte,
    Oracle,
    Veiled,
    Herald,
    Sentinel,
    Warden,
}

impl MinionId {
    pub const ALL: [Self; 12] = [
        Self::Pickpocket,
        Self::Cardsharp,
        Self::Bouncer,
        Self::Illusionist,
        Self::Apprentice,
        Self::Conjurer,
        Self::Acolyte,
        Self::Oracle,
        Self::Veiled,
        Self::Herald,
        Self::Sentinel,
        Self::Warden,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pickpocket => "pickpocket",
            Self::Cardsharp => "cardsharp",
            Self::Bouncer => "bouncer",
            Self::Illusionist => "illusionist",
            Self::Apprentice => "apprentice",
            Self::Conjurer => "conjurer",
            Self::Acolyte => "acolyte",
            Self::Oracle => "oracle",
            Self::Veiled => "veiled",
            Self::Herald => "herald",
            Self::Sentinel => "sentinel",
            Self::Warden => "warden",
        }
    }

    #[must_use]
    pub const fn boss(self) -> BossId {
        match self {
            Self::Pickpocket | Self::Cardsharp | Self::Bouncer => BossId::Dealer,
            Self::Illusionist | Self::Apprentice | Self::Conjurer => BossId::Magician,
            Self::Acolyte | Self::Oracle | Self::Veiled => BossId::Priestess,
            Self::Herald | Self::Sentinel | Self::Warden => BossId::Emperor,
        }
    }
}

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinionId {
    type Err = UnknownIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|minion| minion.as_str() == s)
            .ok_or_else(|| UnknownIdError {
                kind: "minion",
                value: s.to_string(),
            })
    }
}

impl From<MinionId> for String {
    fn from(value: MinionId) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for MinionId {
    type Error = UnknownIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_parses_display_and_bare_forms() {
        let coord = Coord::new(3, -1);
        assert_eq!(coord.to_string(), "(3, -1)");
        assert_eq!("(3, -1)".parse::<Coord>().unwrap(), coord);
        assert_eq!(" 3,-1 ".parse::<Coord>().unwrap(), coord);
        assert!("".parse::<Coord>().is_err());
        assert!("(3;1)".parse::<Coord>().is_err());
        assert!("(a, 1)".parse::<Coord>().is_err());
    }

    #[test]
    fn coord_orders_by_layer_first() {
        assert!(Coord::new(5, 0) < Coord::new(0, 1));
        assert!(Coord::new(0, 2) < Coord::new(1, 2));
    }

    #[test]
    fn boss_and_minion_codecs_are_lossless() {
        for boss in BossId::ALL {
            assert_eq!(boss.as_str().parse::<BossId>().unwrap(), boss);
            for minion in boss.minions() {
                assert_eq!(minion.boss(), boss);
            }
        }
        for minion in MinionId::ALL {
            let json = serde_json::to_string(&minion).unwrap();
            assert_eq!(serde_json::from_str::<MinionId>(&json).unwrap(), minion);
        }
        assert!("joker".parse::<BossId>().is_err());
        assert!(serde_json::from_str::<MinionId>("\"joker\"").is_err());
    }

    #[test]
    fn boss_order_walks_every_act() {
        let mut boss = BossId::first();
        let mut seen = vec![boss];
        while let Some(next) = boss.next() {
            seen.push(next);
            boss = next;
        }
        assert_eq!(seen, BossId::ALL.to_vec());
    }

    #[test]
    fn node_instance_id_embeds_placement() {
        let id = NodeInstanceId::compose("minion", "pickpocket", Coord::new(2, 0), 0xab);
        assert_eq!(id.as_str(), "minion_pickpocket_2_0_000000ab");
    }
}
