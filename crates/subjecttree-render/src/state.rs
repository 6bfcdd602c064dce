use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use subjecttree_core::NodeId;

/// Whether a node shows its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expansion {
    Expanded,
    Collapsed,
}

impl Expansion {
    pub fn is_expanded(self) -> bool {
        self == Expansion::Expanded
    }

    pub fn toggled(self) -> Self {
        match self {
            Expansion::Expanded => Expansion::Collapsed,
            Expansion::Collapsed => Expansion::Expanded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Interaction state kept for one node identity across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub expansion: Expansion,
    /// A "generate more" request for this node is in flight.
    pub pending: bool,
    /// Last laid-out position; `None` until the node has been visible once.
    pub position: Option<Point>,
    pub depth: usize,
}

impl NodeState {
    pub fn new(expansion: Expansion, depth: usize) -> Self {
        Self {
            expansion,
            pending: false,
            position: None,
            depth,
        }
    }
}

/// Everything the renderer remembers between two renders.
///
/// `nodes` holds an entry for every identity of the current snapshot, visible
/// or not. `visible` is the pre-order of the nodes drawn by the last frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    pub root: Option<NodeId>,
    pub nodes: HashMap<NodeId, NodeState>,
    pub visible: Vec<NodeId>,
}

impl RenderState {
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut NodeState> {
        self.nodes.get_mut(id)
    }

    pub fn is_visible(&self, id: &NodeId) -> bool {
        self.visible.iter().any(|v| v == id)
    }

    pub fn is_pending(&self, id: &NodeId) -> bool {
        self.nodes.get(id).map(|n| n.pending).unwrap_or(false)
    }

    pub fn expansion(&self, id: &NodeId) -> Option<Expansion> {
        self.nodes.get(id).map(|n| n.expansion)
    }

    pub fn position(&self, id: &NodeId) -> Option<Point> {
        self.nodes.get(id).and_then(|n| n.position)
    }

    /// Identities with a request in flight.
    pub fn pending(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.pending)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
