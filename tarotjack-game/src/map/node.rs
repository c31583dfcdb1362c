use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::ids::{Coord, NodeInstanceId};

/// Adjacency set of a node; kept sorted and free of duplicates.
pub type CoordSet = SmallVec<[Coord; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Minion,
    Boss,
    Shop,
    Regen,
    Treasure,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minion => "minion",
            Self::Boss => "boss",
            Self::Shop => "shop",
            Self::Regen => "regen",
            Self::Treasure => "treasure",
        }
    }

    /// Minion and boss nodes start an encounter; the rest resolve immediately.
    #[must_use]
    pub const fn is_battle(self) -> bool {
        matches!(self, Self::Minion | Self::Boss)
    }

    #[must_use]
    pub const fn allows_replay(self) -> bool {
        self.is_battle()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout point used by presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NodePosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeInstanceId,
    pub coord: Coord,
    pub kind: NodeKind,
    pub blueprint_name: String,
    #[serde(default)]
    pub position: NodePosition,
    #[serde(default)]
    pub incoming: CoordSet,
    #[serde(default)]
    pub outgoing: CoordSet,
}

impl Node {
    #[must_use]
    pub fn new(
        id: NodeInstanceId,
        coord: Coord,
        kind: NodeKind,
        blueprint_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            coord,
            kind,
            blueprint_name: blueprint_name.into(),
            position: NodePosition::default(),
            incoming: CoordSet::new(),
            outgoing: CoordSet::new(),
        }
    }

    #[must_use]
    pub fn has_outgoing(&self, coord: Coord) -> bool {
        self.outgoing.binary_search(&coord).is_ok()
    }

    #[must_use]
    pub fn has_incoming(&self, coord: Coord) -> bool {
        self.incoming.binary_search(&coord).is_ok()
    }

    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }
}

pub(crate) fn insert_sorted(set: &mut CoordSet, coord: Coord) {
    if let Err(idx) = set.binary_search(&coord) {
        set.insert(idx, coord);
    }
}
