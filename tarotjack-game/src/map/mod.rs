//! Layered map graph, the player's path through it and map generation.
pub mod generator;
pub mod graph;
pub mod node;
pub mod state;

pub use generator::MapGenerator;
pub use graph::{GraphBuilder, GraphError, NodeGraph};
pub use node::{CoordSet, Node, NodeKind, NodePosition};
pub use state::{MapError, MapState, PathError};
