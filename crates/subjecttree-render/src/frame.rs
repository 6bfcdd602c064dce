use crate::state::{Expansion, Point};
use serde::{Deserialize, Serialize};
use subjecttree_core::NodeId;

/// Role of a drawn element in an incremental redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Newly visible; animates in from its origin.
    Enter,
    /// Visible before and after; animates between its two positions.
    Update,
    /// No longer visible; animates towards its target, then is removed.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub source: Point,
    pub target: Point,
}

impl LineSegment {
    pub fn new(source: Point, target: Point) -> Self {
        Self { source, target }
    }

    /// Zero-length segment sitting at `at`.
    pub fn collapsed(at: Point) -> Self {
        Self::new(at, at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraw {
    pub id: NodeId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub depth: usize,
    pub phase: Phase,
    pub from: Point,
    pub to: Point,
    pub expansion: Expansion,
    pub pending: bool,
    pub has_children: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDraw {
    pub parent: NodeId,
    pub child: NodeId,
    pub phase: Phase,
    pub from: LineSegment,
    pub to: LineSegment,
}

/// Draw commands for one render.
///
/// Nodes and links are ordered exits first, then updates, then enters; each
/// group follows the visible pre-order. `reset` is set when the frame starts
/// from scratch and earlier drawings should be discarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub trigger: Option<NodeId>,
    pub duration_ms: u64,
    pub reset: bool,
    pub nodes: Vec<NodeDraw>,
    pub links: Vec<LinkDraw>,
}

impl RenderFrame {
    pub fn node(&self, id: &NodeId) -> Option<&NodeDraw> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn link_to(&self, child: &NodeId) -> Option<&LinkDraw> {
        self.links.iter().find(|l| &l.child == child)
    }

    pub fn ids_in(&self, phase: Phase) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.phase == phase)
            .map(|n| &n.id)
            .collect()
    }

    /// Nodes still on screen once the animation settles.
    pub fn settled_nodes(&self) -> impl Iterator<Item = &NodeDraw> {
        self.nodes.iter().filter(|n| n.phase != Phase::Exit)
    }

    pub fn settled_links(&self) -> impl Iterator<Item = &LinkDraw> {
        self.links.iter().filter(|l| l.phase != Phase::Exit)
    }
}
