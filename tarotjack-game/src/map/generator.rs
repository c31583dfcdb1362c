//! Seeded layered map generation.
//!
//! Layer 0 holds the act's minions, the second to last layer is all regen
//! stops and the last layer is the stage boss. Middle layers draw kinds from
//! [`KindWeights`]. Every node links forward to at least one node of the next
//! layer and every node past layer 0 has at least one incoming link.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::graph::{GraphBuilder, GraphError, NodeGraph};
use super::node::{Node, NodeKind, NodePosition};
use super::state::MapState;
use crate::config::{KindWeights, MapConfig};
use crate::ids::{BossId, Coord, NodeInstanceId};

#[derive(Debug, Clone)]
pub struct MapGenerator {
    cfg: MapConfig,
}

impl MapGenerator {
    #[must_use]
    pub const fn new(cfg: MapConfig) -> Self {
        Self { cfg }
    }

    /// Generate a fresh map for the act of `act_boss`.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] if the assembled graph breaks an invariant.
    pub fn generate(&self, act_boss: BossId, seed: u64) -> Result<MapState, GraphError> {
        let graph = self.generate_graph(act_boss, seed)?;
        log::debug!(
            "generated map for {act_boss}: {} nodes over {} layers (seed {seed})",
            graph.len(),
            graph.layer_count()
        );
        Ok(MapState::new(graph))
    }

    fn generate_graph(&self, act_boss: BossId, seed: u64) -> Result<NodeGraph, GraphError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let layers = i32::from(self.cfg.layers.max(3));
        let mut builder = GraphBuilder::new();
        let mut widths = Vec::with_capacity(usize::from(self.cfg.layers));

        for layer in 0..layers {
            let width = if layer == layers - 1 {
                1
            } else {
                i32::from(rng.gen_range(self.cfg.min_width..=self.cfg.max_width.max(self.cfg.min_width)))
            };
            widths.push(width);
            for x in 0..width {
                let coord = Coord::new(x, layer);
                let kind = self.kind_for(layer, layers, &mut rng);
                let blueprint = blueprint_for(kind, act_boss, &mut rng);
                let salt: u32 = rng.r#gen();
                let mut node = Node::new(
                    NodeInstanceId::compose(kind.as_str(), &blueprint, coord, salt),
                    coord,
                    kind,
                    blueprint,
                );
                node.position = self.position_for(coord, width, &mut rng);
                builder.add_node(node);
            }
        }

        for layer in 0..layers - 1 {
            let here = widths[usize::try_from(layer).unwrap_or_default()];
            let next = widths[usize::try_from(layer + 1).unwrap_or_default()];
            self.link_layers(&mut builder, layer, here, next, &mut rng);
        }

        builder.prune_isolated();
        builder.build()
    }

    fn kind_for(&self, layer: i32, layers: i32, rng: &mut ChaCha8Rng) -> NodeKind {
        if layer == 0 {
            NodeKind::Minion
        } else if layer == layers - 1 {
            NodeKind::Boss
        } else if layer == layers - 2 {
            NodeKind::Regen
        } else {
            weighted_kind(&self.cfg.weights, rng)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn position_for(&self, coord: Coord, width: i32, rng: &mut ChaCha8Rng) -> NodePosition {
        let centre = (width - 1) as f32 / 2.0;
        let (jx, jy) = if self.cfg.jitter > 0.0 {
            (
                rng.gen_range(-self.cfg.jitter..=self.cfg.jitter),
                rng.gen_range(-self.cfg.jitter..=self.cfg.jitter),
            )
        } else {
            (0.0, 0.0)
        };
        NodePosition {
            x: (coord.x as f32 - centre) * self.cfg.node_spacing + jx,
            y: coord.layer() as f32 * self.cfg.layer_spacing + jy,
        }
    }

    fn link_layers(
        &self,
        builder: &mut GraphBuilder,
        layer: i32,
        here: i32,
        next: i32,
        rng: &mut ChaCha8Rng,
    ) {
        for x in 0..here {
            let primary = scale_index(x, here, next);
            builder.connect(Coord::new(x, layer), Coord::new(primary, layer + 1));
            if rng.gen_bool(f64::from(self.cfg.branch_chance)) {
                let offset = if rng.gen_bool(0.5) { 1 } else { -1 };
                let branch = primary + offset;
                if (0..next).contains(&branch) {
                    builder.connect(Coord::new(x, layer), Coord::new(branch, layer + 1));
                }
            }
        }
        for x in 0..next {
            let coord = Coord::new(x, layer + 1);
            let orphan = builder.get(coord).is_some_and(|node| node.incoming.is_empty());
            if orphan {
                let source = scale_index(x, next, here);
                builder.connect(Coord::new(source, layer), coord);
            }
        }
    }
}

/// Map column `x` of a layer `from` wide onto a layer `to` wide.
fn scale_index(x: i32, from: i32, to: i32) -> i32 {
    if from <= 1 || to <= 1 {
        return if to <= 1 { 0 } else { (to - 1) / 2 };
    }
    let scaled = (x * (to - 1) * 2 + (from - 1)) / ((from - 1) * 2);
    scaled.clamp(0, to - 1)
}

fn weighted_kind(weights: &KindWeights, rng: &mut ChaCha8Rng) -> NodeKind {
    let total = weights.total().max(1);
    let mut roll = rng.gen_range(0..total);
    for (kind, weight) in [
        (NodeKind::Minion, weights.minion),
        (NodeKind::Shop, weights.shop),
        (NodeKind::Regen, weights.regen),
        (NodeKind::Treasure, weights.treasure),
    ] {
        if roll < weight {
            return kind;
        }
        roll -= weight;
    }
    NodeKind::Minion
}

fn blueprint_for(kind: NodeKind, act_boss: BossId, rng: &mut ChaCha8Rng) -> String {
    match kind {
        NodeKind::Minion => {
            let roster = act_boss.minions();
            roster[rng.gen_range(0..roster.len())].as_str().to_string()
        }
        NodeKind::Boss => act_boss.as_str().to_string(),
        other => other.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MinionId;

    #[test]
    fn generated_maps_follow_layer_plan() {
        let cfg = MapConfig::default();
        let map = MapGenerator::new(cfg.clone())
            .generate(BossId::Dealer, 7)
            .unwrap();
        let graph = &map.graph;
        assert_eq!(graph.layer_count(), usize::from(cfg.layers));
        assert!(graph.nodes_in_layer(0).all(|n| n.kind == NodeKind::Minion));
        let last = i32::from(cfg.layers) - 1;
        assert!(graph.nodes_in_layer(last - 1).all(|n| n.kind == NodeKind::Regen));
        let boss = graph.stage_boss_node().unwrap();
        assert_eq!(boss.blueprint_name, "dealer");
        assert_eq!(boss.coord.layer(), last);
        assert!(map.path().is_empty());
        assert!(map.distance_between_first_and_last_layers() > 0.0);
    }

    #[test]
    fn every_node_is_reachable_and_can_advance() {
        let cfg = MapConfig::default();
        for seed in 0..32 {
            let map = MapGenerator::new(cfg.clone())
                .generate(BossId::Magician, seed)
                .unwrap();
            let last = i32::try_from(map.graph.layer_count()).unwrap() - 1;
            for node in map.graph.nodes() {
                if node.coord.layer() > 0 {
                    assert!(!node.incoming.is_empty(), "seed {seed}: {} orphaned", node.coord);
                }
                if node.coord.layer() < last {
                    assert!(!node.outgoing.is_empty(), "seed {seed}: {} dead end", node.coord);
                }
            }
        }
    }

    #[test]
    fn minion_blueprints_belong_to_the_act_boss() {
        let map = MapGenerator::new(MapConfig::default())
            .generate(BossId::Emperor, 99)
            .unwrap();
        for node in map.graph.nodes().filter(|n| n.kind == NodeKind::Minion) {
            let minion: MinionId = node.blueprint_name.parse().unwrap();
            assert_eq!(minion.boss(), BossId::Emperor);
        }
    }

    #[test]
    fn same_seed_same_map() {
        let generator = MapGenerator::new(MapConfig::default());
        let a = generator.generate(BossId::Dealer, 1234).unwrap();
        let b = generator.generate(BossId::Dealer, 1234).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scale_index_stays_in_bounds() {
        for from in 1..=5 {
            for to in 1..=5 {
                for x in 0..from {
                    let idx = scale_index(x, from, to);
                    assert!((0..to).contains(&idx));
                }
            }
        }
    }
}
