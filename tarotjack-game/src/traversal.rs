//! Which map nodes the player may select next.
use std::fmt;

use crate::ids::Coord;
use crate::map::MapState;
use crate::progression::ProgressionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The path is empty and the target is not an entry node.
    NotOnLayerZero,
    /// The target is not an outgoing neighbour of the path tip.
    NotAdjacent,
    UnknownNode,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotOnLayerZero => "only layer 0 can start a path",
            Self::NotAdjacent => "node is not adjacent to the current position",
            Self::UnknownNode => "node is not on the map",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDecision {
    Allowed { replay: bool },
    Denied(DenialReason),
}

impl TraversalDecision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Selection rules, checked in order: replay of a defeated battle node,
/// entry on an empty path, then adjacency to the path tip.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraversalPolicy;

impl TraversalPolicy {
    #[must_use]
    pub fn evaluate(
        map: &MapState,
        progression: &ProgressionStore,
        target: Coord,
    ) -> TraversalDecision {
        let Some(node) = map.get_node(target) else {
            return TraversalDecision::Denied(DenialReason::UnknownNode);
        };

        let replayable = node.kind.allows_replay()
            && progression.is_node_instance_defeated(&node.id)
            && (map.in_path(target) || target.layer() == 0);
        if replayable {
            return TraversalDecision::Allowed { replay: true };
        }

        match map.tip() {
            None if target.layer() == 0 => TraversalDecision::Allowed { replay: false },
            None => TraversalDecision::Denied(DenialReason::NotOnLayerZero),
            Some(_) if map.is_successor(target) => TraversalDecision::Allowed { replay: false },
            Some(_) => TraversalDecision::Denied(DenialReason::NotAdjacent),
        }
    }

    #[must_use]
    pub fn can_select(map: &MapState, progression: &ProgressionStore, target: Coord) -> bool {
        Self::evaluate(map, progression, target).is_allowed()
    }
}
