use serde::{Deserialize, Serialize};

/// Identifier of a cluster node or client as it appears on the wire (`n1`, `c4`)
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash,
)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cluster nodes are named `n<k>`; anything else is an external client
    pub fn is_client(&self) -> bool {
        !self.0.starts_with('n')
    }
}

impl From<&str> for NodeName {
    fn from(id: &str) -> Self {
        NodeName::new(id.to_string())
    }
}

impl From<String> for NodeName {
    fn from(id: String) -> Self {
        NodeName::new(id)
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// This node's name plus every member of the cluster, as supplied by `init`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NodeIdentity {
    pub node_id: NodeName,
    pub node_ids: Vec<NodeName>,
}

impl NodeIdentity {
    pub fn new(node_id: NodeName, node_ids: Vec<NodeName>) -> Self {
        Self { node_id, node_ids }
    }

    /// Every other member, in the order `init` listed them
    pub fn peers(&self) -> impl Iterator<Item = &NodeName> {
        self.node_ids.iter().filter(move |id| **id != self.node_id)
    }
}
