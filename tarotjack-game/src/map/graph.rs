use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::node::{Node, NodeKind, insert_sorted};
use crate::ids::{Coord, NodeInstanceId};

/// Structural violations that make a graph unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("graph has no nodes")]
    Empty,
    #[error("duplicate node at {0}")]
    DuplicateCoord(Coord),
    #[error("duplicate node instance id {0}")]
    DuplicateInstance(NodeInstanceId),
    #[error("node {0} links to itself")]
    SelfLoop(Coord),
    #[error("edge {from} -> {to} points at a missing node")]
    Dangling { from: Coord, to: Coord },
    #[error("edge {from} -> {to} is not mirrored by the target's incoming set")]
    Asymmetric { from: Coord, to: Coord },
    #[error("edge {from} -> {to} does not advance exactly one layer")]
    LayerSkip { from: Coord, to: Coord },
    #[error("node {0} has no connections")]
    Isolated(Coord),
    #[error("first layer is {0}, expected 0")]
    MissingLayerZero(i32),
}

/// Layered directed graph of map nodes. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Node>", into = "Vec<Node>")]
pub struct NodeGraph {
    nodes: BTreeMap<Coord, Node>,
}

impl TryFrom<Vec<Node>> for NodeGraph {
    type Error = GraphError;

    fn try_from(value: Vec<Node>) -> Result<Self, Self::Error> {
        Self::from_nodes(value)
    }
}

impl From<NodeGraph> for Vec<Node> {
    fn from(value: NodeGraph) -> Self {
        value.nodes.into_values().collect()
    }
}

impl NodeGraph {
    /// Build a graph from decoded nodes, normalising adjacency sets and
    /// checking every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] describing the first violation found.
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self, GraphError> {
        let mut map = BTreeMap::new();
        for mut node in nodes {
            node.incoming.sort_unstable();
            node.incoming.dedup();
            node.outgoing.sort_unstable();
            node.outgoing.dedup();
            let coord = node.coord;
            if map.insert(coord, node).is_some() {
                return Err(GraphError::DuplicateCoord(coord));
            }
        }
        let graph = Self { nodes: map };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<(), GraphError> {
        let Some(first) = self.nodes.keys().next() else {
            return Err(GraphError::Empty);
        };
        if first.layer() != 0 {
            return Err(GraphError::MissingLayerZero(first.layer()));
        }

        let mut instances = std::collections::HashSet::new();
        let single_layer = self.layer_count() == 1;
        for (coord, node) in &self.nodes {
            if !instances.insert(&node.id) {
                return Err(GraphError::DuplicateInstance(node.id.clone()));
            }
            if node.has_outgoing(*coord) || node.has_incoming(*coord) {
                return Err(GraphError::SelfLoop(*coord));
            }
            if node.is_isolated() && !single_layer {
                return Err(GraphError::Isolated(*coord));
            }
            for to in &node.outgoing {
                let target = self.nodes.get(to).ok_or(GraphError::Dangling {
                    from: *coord,
                    to: *to,
                })?;
                if to.layer() != coord.layer() + 1 {
                    return Err(GraphError::LayerSkip {
                        from: *coord,
                        to: *to,
                    });
                }
                if !target.has_incoming(*coord) {
                    return Err(GraphError::Asymmetric {
                        from: *coord,
                        to: *to,
                    });
                }
            }
            for from in &node.incoming {
                let source = self.nodes.get(from).ok_or(GraphError::Dangling {
                    from: *from,
                    to: *coord,
                })?;
                if !source.has_outgoing(*coord) {
                    return Err(GraphError::Asymmetric {
                        from: *from,
                        to: *coord,
                    });
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, coord: Coord) -> Option<&Node> {
        self.nodes.get(&coord)
    }

    #[must_use]
    pub fn contains(&self, coord: Coord) -> bool {
        self.nodes.contains_key(&coord)
    }

    /// Nodes ordered by layer, then column.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn find_instance(&self, id: &NodeInstanceId) -> Option<&Node> {
        self.nodes.values().find(|node| &node.id == id)
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.nodes
            .keys()
            .next_back()
            .map_or(0, |last| usize::try_from(last.layer() + 1).unwrap_or(0))
    }

    pub fn nodes_in_layer(&self, layer: i32) -> impl Iterator<Item = &Node> {
        self.nodes
            .range(Coord::new(i32::MIN, layer)..=Coord::new(i32::MAX, layer))
            .map(|(_, node)| node)
    }

    /// The boss node that terminates the map.
    #[must_use]
    pub fn stage_boss_node(&self) -> Option<&Node> {
        let last = self.nodes.keys().next_back()?.layer();
        self.nodes_in_layer(last)
            .find(|node| node.kind == NodeKind::Boss)
    }

    /// Vertical span between the mean positions of the first and last layers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn distance_between_first_and_last_layers(&self) -> f32 {
        let Some(last) = self.nodes.keys().next_back().map(|c| c.layer()) else {
            return 0.0;
        };
        let mean_y = |layer: i32| {
            let (sum, count) = self
                .nodes_in_layer(layer)
                .fold((0.0_f32, 0_usize), |(sum, count), node| {
                    (sum + node.position.y, count + 1)
                });
            if count == 0 { 0.0 } else { sum / count as f32 }
        };
        (mean_y(last) - mean_y(0)).abs()
    }
}

/// Incremental builder used by the generator and by tests.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: BTreeMap<Coord, Node>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> &mut Self {
        self.nodes.insert(node.coord, node);
        self
    }

    /// Link `from` to `to`, updating both adjacency sets. Unknown
    /// coordinates and self links are ignored.
    pub fn connect(&mut self, from: Coord, to: Coord) -> &mut Self {
        if from == to || !self.nodes.contains_key(&to) {
            return self;
        }
        if let Some(source) = self.nodes.get_mut(&from) {
            insert_sorted(&mut source.outgoing, to);
        } else {
            return self;
        }
        if let Some(target) = self.nodes.get_mut(&to) {
            insert_sorted(&mut target.incoming, from);
        }
        self
    }

    #[must_use]
    pub fn get(&self, coord: Coord) -> Option<&Node> {
        self.nodes.get(&coord)
    }

    /// Drop nodes that never received a connection.
    pub fn prune_isolated(&mut self) -> &mut Self {
        if self
            .nodes
            .keys()
            .map(|c| c.layer())
            .collect::<std::collections::BTreeSet<_>>()
            .len()
            > 1
        {
            self.nodes.retain(|_, node| !node.is_isolated());
        }
        self
    }

    /// Finalise the graph.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] when the collected nodes violate an invariant.
    pub fn build(self) -> Result<NodeGraph, GraphError> {
        NodeGraph::from_nodes(self.nodes.into_values().collect())
    }
}
