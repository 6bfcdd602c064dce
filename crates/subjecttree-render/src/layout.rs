//! Node placement for the visible part of a tree.
//!
//! Descendants of a collapsed node take no part in layout, so sibling spacing
//! only reflects what is on screen.

use crate::state::{Expansion, NodeState, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use subjecttree_core::{NodeId, RenderConfig, SubjectTreeError, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Horizontal tree: depth grows to the right, siblings stack downwards.
    #[default]
    Tree,
    /// Indented outline, one row per visible node.
    List,
}

impl FromStr for LayoutMode {
    type Err = SubjectTreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tree" => Ok(LayoutMode::Tree),
            "list" => Ok(LayoutMode::List),
            other => Err(SubjectTreeError::Configuration(format!(
                "Unknown layout '{}'. Use 'tree' or 'list'",
                other
            ))),
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutMode::Tree => write!(f, "tree"),
            LayoutMode::List => write!(f, "list"),
        }
    }
}

/// Spacing, animation and default-expansion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub mode: LayoutMode,
    /// Horizontal distance between depth levels in the tree layout
    pub level_spacing: f64,
    /// Vertical distance between adjacent leaf slots in the tree layout
    pub sibling_spacing: f64,
    pub list_indent: f64,
    pub list_row_height: f64,
    pub animation_ms: u64,
    /// Nodes at this depth or deeper start collapsed when first seen
    pub initial_expand_depth: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Tree,
            level_spacing: 180.0,
            sibling_spacing: 28.0,
            list_indent: 24.0,
            list_row_height: 22.0,
            animation_ms: 750,
            initial_expand_depth: 1,
        }
    }
}

impl LayoutConfig {
    pub fn from_render_config(config: &RenderConfig) -> Result<Self, SubjectTreeError> {
        Ok(Self {
            mode: config.layout.parse()?,
            level_spacing: config.level_spacing,
            sibling_spacing: config.sibling_spacing,
            list_indent: config.list_indent,
            list_row_height: config.list_row_height,
            animation_ms: config.animation_ms,
            initial_expand_depth: config.initial_expand_depth,
        })
    }

    /// Expansion given to a node the first time its identity is seen.
    pub fn default_expansion(&self, depth: usize) -> Expansion {
        if depth == 0 || depth < self.initial_expand_depth {
            Expansion::Expanded
        } else {
            Expansion::Collapsed
        }
    }
}

/// One node of the visible pre-order.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleNode<'a> {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub node: &'a TreeNode,
    pub depth: usize,
}

fn is_expanded(states: &HashMap<NodeId, NodeState>, id: &NodeId) -> bool {
    states
        .get(id)
        .map(|s| s.expansion.is_expanded())
        .unwrap_or(false)
}

/// Pre-order of the nodes not hidden under a collapsed ancestor.
pub fn visible_nodes<'a>(
    root: &'a TreeNode,
    states: &HashMap<NodeId, NodeState>,
) -> Vec<VisibleNode<'a>> {
    fn visit<'a>(
        node: &'a TreeNode,
        id: NodeId,
        parent: Option<NodeId>,
        depth: usize,
        states: &HashMap<NodeId, NodeState>,
        out: &mut Vec<VisibleNode<'a>>,
    ) {
        let expanded = is_expanded(states, &id);
        let child_ids = if expanded { node.child_ids(&id) } else { Vec::new() };
        out.push(VisibleNode {
            id: id.clone(),
            parent,
            node,
            depth,
        });
        for (child, child_id) in node.children.iter().zip(child_ids) {
            visit(child, child_id, Some(id.clone()), depth + 1, states, out);
        }
    }

    let mut out = Vec::new();
    visit(root, root.id(), None, 0, states, &mut out);
    out
}

/// Positions for every visible node.
pub fn layout(visible: &[VisibleNode<'_>], config: &LayoutConfig) -> HashMap<NodeId, Point> {
    match config.mode {
        LayoutMode::Tree => tree_layout(visible, config),
        LayoutMode::List => list_layout(visible, config),
    }
}

fn list_layout(visible: &[VisibleNode<'_>], config: &LayoutConfig) -> HashMap<NodeId, Point> {
    visible
        .iter()
        .enumerate()
        .map(|(row, v)| {
            (
                v.id.clone(),
                Point::new(
                    v.depth as f64 * config.list_indent,
                    row as f64 * config.list_row_height,
                ),
            )
        })
        .collect()
}

/// Leaves take consecutive slots in pre-order; a parent sits midway between
/// its first and last visible child.
fn tree_layout(visible: &[VisibleNode<'_>], config: &LayoutConfig) -> HashMap<NodeId, Point> {
    let mut children: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for v in visible {
        if let Some(parent) = &v.parent {
            children.entry(parent).or_default().push(&v.id);
        }
    }

    let mut slot_y: HashMap<&NodeId, f64> = HashMap::new();
    let mut next_slot = 0usize;
    for v in visible {
        if !children.contains_key(&v.id) {
            slot_y.insert(&v.id, next_slot as f64 * config.sibling_spacing);
            next_slot += 1;
        }
    }

    // Reverse pre-order visits every child before its parent.
    for v in visible.iter().rev() {
        if let Some(kids) = children.get(&v.id) {
            let first = kids.first().and_then(|k| slot_y.get(*k)).copied();
            let last = kids.last().and_then(|k| slot_y.get(*k)).copied();
            if let (Some(first), Some(last)) = (first, last) {
                slot_y.insert(&v.id, (first + last) / 2.0);
            }
        }
    }

    visible
        .iter()
        .map(|v| {
            let y = slot_y.get(&v.id).copied().unwrap_or_default();
            (
                v.id.clone(),
                Point::new(v.depth as f64 * config.level_spacing, y),
            )
        })
        .collect()
}
