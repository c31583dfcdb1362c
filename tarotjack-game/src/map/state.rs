use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::graph::NodeGraph;
use super::node::Node;
use crate::ids::Coord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("no node at {0}")]
    UnknownNode(Coord),
    #[error("{0} cannot start a path: only layer 0 is an entry point")]
    NotAnEntry(Coord),
    #[error("{to} is not reachable from {from}")]
    IllegalStep { from: Coord, to: Coord },
}

/// Errors found when a decoded map document breaks the path invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path visits {0}, which is not on the map")]
    UnknownNode(Coord),
    #[error("path starts at {0}, which is not on layer 0")]
    BadEntry(Coord),
    #[error("path step {from} -> {to} is not an edge")]
    BrokenStep { from: Coord, to: Coord },
}

/// A generated map plus the player's walk through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapState {
    pub graph: NodeGraph,
    #[serde(default)]
    path: Vec<Coord>,
}

impl MapState {
    #[must_use]
    pub const fn new(graph: NodeGraph) -> Self {
        Self {
            graph,
            path: Vec::new(),
        }
    }

    /// Check the path against the graph after decoding.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] if the stored walk is not a legal one.
    pub fn validate(&self) -> Result<(), PathError> {
        let Some(first) = self.path.first() else {
            return Ok(());
        };
        if first.layer() != 0 {
            return Err(PathError::BadEntry(*first));
        }
        for coord in &self.path {
            if !self.graph.contains(*coord) {
                return Err(PathError::UnknownNode(*coord));
            }
        }
        for step in self.path.windows(2) {
            let from = step[0];
            let to = step[1];
            let linked = self
                .graph
                .get(from)
                .is_some_and(|node| node.has_outgoing(to));
            if !linked {
                return Err(PathError::BrokenStep { from, to });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &[Coord] {
        &self.path
    }

    #[must_use]
    pub fn tip(&self) -> Option<Coord> {
        self.path.last().copied()
    }

    #[must_use]
    pub fn in_path(&self, coord: Coord) -> bool {
        self.path.contains(&coord)
    }

    #[must_use]
    pub fn get_node(&self, coord: Coord) -> Option<&Node> {
        self.graph.get(coord)
    }

    #[must_use]
    pub fn stage_boss_node(&self) -> Option<&Node> {
        self.graph.stage_boss_node()
    }

    #[must_use]
    pub fn distance_between_first_and_last_layers(&self) -> f32 {
        self.graph.distance_between_first_and_last_layers()
    }

    /// Whether the stage boss has been entered on this map.
    #[must_use]
    pub fn stage_boss_reached(&self) -> bool {
        self.stage_boss_node()
            .is_some_and(|boss| self.in_path(boss.coord))
    }

    /// Whether `coord` is a legal next step from the current tip.
    #[must_use]
    pub fn is_successor(&self, coord: Coord) -> bool {
        match self.tip() {
            None => coord.layer() == 0 && self.graph.contains(coord),
            Some(tip) => self
                .graph
                .get(tip)
                .is_some_and(|node| node.has_outgoing(coord)),
        }
    }

    /// Push `coord` onto the path. The caller persists the result.
    ///
    /// # Errors
    ///
    /// Returns a [`MapError`] and leaves the path unchanged when `coord` is
    /// not a legal successor of the tip.
    pub fn append(&mut self, coord: Coord) -> Result<(), MapError> {
        if !self.graph.contains(coord) {
            return Err(MapError::UnknownNode(coord));
        }
        match self.tip() {
            None if coord.layer() != 0 => return Err(MapError::NotAnEntry(coord)),
            Some(from) if !self.is_successor(coord) => {
                return Err(MapError::IllegalStep { from, to: coord });
            }
            _ => {}
        }
        self.path.push(coord);
        Ok(())
    }

    /// Remove the tip if it equals `coord`.
    pub fn pop_if_tip(&mut self, coord: Coord) -> bool {
        if self.tip() == Some(coord) {
            self.path.pop();
            true
        } else {
            false
        }
    }
}
