use crate::layout::visible_nodes;
use crate::state::{Expansion, RenderState};
use subjecttree_core::{NodeId, TreeNode};

/// Marker shown in front of a node in the outline view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Expanded,
    Collapsed,
    Leaf,
}

impl Marker {
    pub fn symbol(self) -> &'static str {
        match self {
            Marker::Expanded => "▾",
            Marker::Collapsed => "▸",
            Marker::Leaf => "•",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineLine {
    pub id: NodeId,
    pub depth: usize,
    pub marker: Marker,
    pub name: String,
    pub description: Option<String>,
    pub pending: bool,
    /// Number of children hidden under a collapsed node.
    pub hidden_children: usize,
}

/// Visible rows of `snapshot` under `state`, in pre-order.
pub fn outline_lines(snapshot: &TreeNode, state: &RenderState) -> Vec<OutlineLine> {
    visible_nodes(snapshot, &state.nodes)
        .into_iter()
        .map(|v| {
            let node_state = state.get(&v.id);
            let expansion = node_state
                .map(|s| s.expansion)
                .unwrap_or(Expansion::Collapsed);
            let marker = match (v.node.has_children(), expansion) {
                (false, _) => Marker::Leaf,
                (true, Expansion::Expanded) => Marker::Expanded,
                (true, Expansion::Collapsed) => Marker::Collapsed,
            };
            OutlineLine {
                depth: v.depth,
                marker,
                name: v.node.name.clone(),
                description: v.node.description.clone(),
                pending: node_state.map(|s| s.pending).unwrap_or(false),
                hidden_children: if marker == Marker::Collapsed {
                    v.node.children.len()
                } else {
                    0
                },
                id: v.id,
            }
        })
        .collect()
}

/// Plain-text outline, two spaces of indent per level.
pub fn outline(snapshot: &TreeNode, state: &RenderState) -> String {
    let mut out = String::new();
    for line in outline_lines(snapshot, state) {
        out.push_str(&"  ".repeat(line.depth));
        out.push_str(line.marker.symbol());
        out.push(' ');
        out.push_str(&line.name);
        if line.hidden_children > 0 {
            out.push_str(&format!(" ({})", line.hidden_children));
        }
        if line.pending {
            out.push_str(" …");
        }
        out.push('\n');
    }
    out
}
