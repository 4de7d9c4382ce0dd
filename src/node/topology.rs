use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use super::NodeName;

/// Directed neighbor graph announced by the `topology` message.
///
/// Kept so the node can acknowledge and report it; fan-out still targets
/// every peer regardless of what the graph says.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    graph: RwLock<HashMap<NodeName, HashSet<NodeName>>>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole graph with `neighbors`. Nothing from a previous
    /// build survives.
    pub fn build(&self, neighbors: HashMap<NodeName, Vec<NodeName>>) {
        let graph: HashMap<NodeName, HashSet<NodeName>> = neighbors
            .into_iter()
            .map(|(node, adjacent)| (node, adjacent.into_iter().collect()))
            .collect();
        *self.graph.write() = graph;
    }

    /// Sorted neighbors of `node`, if the graph mentions it as a source
    pub fn neighbors(&self, node: &NodeName) -> Option<Vec<NodeName>> {
        self.graph.read().get(node).map(|adjacent| {
            let mut adjacent: Vec<NodeName> = adjacent.iter().cloned().collect();
            adjacent.sort();
            adjacent
        })
    }

    /// Number of source nodes in the graph
    pub fn len(&self) -> usize {
        self.graph.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.read().is_empty()
    }
}
