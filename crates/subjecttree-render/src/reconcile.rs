//! Reconciliation of a new tree snapshot against the previous render.
//!
//! Identities are derived from name paths, so the enter/update/exit partition
//! is a set difference between the visible identities of the previous frame
//! and those of the new one.

use crate::frame::{LineSegment, LinkDraw, NodeDraw, Phase, RenderFrame};
use crate::layout::{layout, visible_nodes, LayoutConfig, VisibleNode};
use crate::state::{Expansion, NodeState, Point, RenderState};
use std::collections::{HashMap, HashSet};
use subjecttree_core::{NodeId, TreeNode};
use tracing::debug;

/// Compute the next render state and the draw commands leading to it.
///
/// `trigger` names the node whose change caused this render; animations are
/// anchored there. When the snapshot's root identity differs from the previous
/// root, nothing is carried over and the frame is marked `reset`.
pub fn reconcile(
    previous: &RenderState,
    snapshot: &TreeNode,
    trigger: Option<&NodeId>,
    config: &LayoutConfig,
) -> (RenderState, RenderFrame) {
    let root_id = snapshot.id();
    let reset = previous.root.as_ref() != Some(&root_id);
    let fresh = RenderState::default();
    if reset && previous.root.is_some() {
        debug!(
            "Root changed from {:?} to {}, starting a fresh render",
            previous.root, root_id
        );
    }
    let previous = if reset { &fresh } else { previous };

    let mut nodes = carry_state(previous, snapshot, config);
    let visible = visible_nodes(snapshot, &nodes);
    let positions = layout(&visible, config);

    let was_visible: HashSet<&NodeId> = previous.visible.iter().collect();
    let now_visible: HashSet<&NodeId> = visible.iter().map(|v| &v.id).collect();
    let previous_position = |id: &NodeId| -> Option<Point> {
        if was_visible.contains(id) {
            previous.position(id)
        } else {
            None
        }
    };

    let root_position = positions.get(&root_id).copied().unwrap_or_default();
    let trigger_before = trigger.and_then(|t| previous_position(t));
    let trigger_after = trigger.and_then(|t| positions.get(t).copied());

    let mut exits = Vec::new();
    let mut exit_links = Vec::new();
    for id in previous.visible.iter().filter(|id| !now_visible.contains(id)) {
        let target = trigger_after
            .or_else(|| nearest_visible_ancestor(id, &positions))
            .unwrap_or(root_position);
        let from = previous.position(id).unwrap_or(target);
        let remaining = snapshot.find(id);
        let state = nodes.get(id).or_else(|| previous.get(id));

        exits.push(NodeDraw {
            id: id.clone(),
            name: display_name(id),
            description: remaining.and_then(|n| n.description.clone()),
            depth: id.depth(),
            phase: Phase::Exit,
            from,
            to: target,
            expansion: state.map(|s| s.expansion).unwrap_or(Expansion::Collapsed),
            pending: state.map(|s| s.pending).unwrap_or(false),
            has_children: remaining.map(TreeNode::has_children).unwrap_or(false),
        });
        if let Some(parent) = id.parent() {
            let parent_from = previous.position(&parent).unwrap_or(from);
            exit_links.push(LinkDraw {
                parent,
                child: id.clone(),
                phase: Phase::Exit,
                from: LineSegment::new(parent_from, from),
                to: LineSegment::collapsed(target),
            });
        }
    }

    let mut updates = Vec::new();
    let mut update_links = Vec::new();
    let mut enters = Vec::new();
    let mut enter_links = Vec::new();
    for v in &visible {
        let to = positions.get(&v.id).copied().unwrap_or_default();
        let parent_to = v
            .parent
            .as_ref()
            .and_then(|p| positions.get(p).copied())
            .unwrap_or(to);

        if was_visible.contains(&v.id) {
            let from = previous.position(&v.id).unwrap_or(to);
            updates.push(draw(v, &nodes, Phase::Update, from, to));
            if let Some(parent) = &v.parent {
                let parent_from = previous_position(parent).unwrap_or(parent_to);
                update_links.push(LinkDraw {
                    parent: parent.clone(),
                    child: v.id.clone(),
                    phase: Phase::Update,
                    from: LineSegment::new(parent_from, from),
                    to: LineSegment::new(parent_to, to),
                });
            }
        } else {
            let origin = v
                .parent
                .as_ref()
                .and_then(|p| previous_position(p))
                .or(trigger_before)
                .or(trigger_after)
                .unwrap_or(root_position);
            enters.push(draw(v, &nodes, Phase::Enter, origin, to));
            if let Some(parent) = &v.parent {
                enter_links.push(LinkDraw {
                    parent: parent.clone(),
                    child: v.id.clone(),
                    phase: Phase::Enter,
                    from: LineSegment::collapsed(origin),
                    to: LineSegment::new(parent_to, to),
                });
            }
        }
    }

    debug!(
        "Reconciled {}: {} enter, {} update, {} exit",
        root_id,
        enters.len(),
        updates.len(),
        exits.len()
    );

    for (id, position) in &positions {
        if let Some(state) = nodes.get_mut(id) {
            state.position = Some(*position);
        }
    }

    let frame = RenderFrame {
        trigger: trigger.cloned(),
        duration_ms: config.animation_ms,
        reset,
        nodes: exits.into_iter().chain(updates).chain(enters).collect(),
        links: exit_links
            .into_iter()
            .chain(update_links)
            .chain(enter_links)
            .collect(),
    };
    let state = RenderState {
        root: Some(root_id),
        nodes,
        visible: visible.into_iter().map(|v| v.id).collect(),
    };
    (state, frame)
}

/// State for every identity in `snapshot`: carried over when known, default
/// otherwise. Identities missing from the snapshot are dropped.
fn carry_state(
    previous: &RenderState,
    snapshot: &TreeNode,
    config: &LayoutConfig,
) -> HashMap<NodeId, NodeState> {
    let mut nodes = HashMap::with_capacity(snapshot.size());
    snapshot.walk_with_ids(&mut |_, id, depth| {
        let state = match previous.get(id) {
            Some(old) => NodeState {
                depth,
                ..old.clone()
            },
            None => NodeState::new(config.default_expansion(depth), depth),
        };
        nodes.insert(id.clone(), state);
    });
    if let Some(root) = nodes.get_mut(&snapshot.id()) {
        root.expansion = Expansion::Expanded;
    }
    nodes
}

fn draw(
    v: &VisibleNode<'_>,
    nodes: &HashMap<NodeId, NodeState>,
    phase: Phase,
    from: Point,
    to: Point,
) -> NodeDraw {
    let state = nodes.get(&v.id);
    NodeDraw {
        id: v.id.clone(),
        name: v.node.name.clone(),
        description: v.node.description.clone(),
        depth: v.depth,
        phase,
        from,
        to,
        expansion: state.map(|s| s.expansion).unwrap_or(Expansion::Collapsed),
        pending: state.map(|s| s.pending).unwrap_or(false),
        has_children: v.node.has_children(),
    }
}

fn nearest_visible_ancestor(id: &NodeId, positions: &HashMap<NodeId, Point>) -> Option<Point> {
    let mut current = id.parent();
    while let Some(ancestor) = current {
        if let Some(position) = positions.get(&ancestor) {
            return Some(*position);
        }
        current = ancestor.parent();
    }
    None
}

fn display_name(id: &NodeId) -> String {
    id.segments()
        .pop()
        .map(|s| s.name)
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> TreeNode {
        TreeNode::new("Algebra").with_children(vec![
            TreeNode::new("Linear Algebra").with_children(vec![TreeNode::new("Vector Spaces")]),
            TreeNode::new("Group Theory"),
        ])
    }

    fn id(path: &str) -> NodeId {
        NodeId::parse_path(path).unwrap()
    }

    #[test]
    fn test_first_render_enters_everything_visible() {
        let (state, frame) = reconcile(&RenderState::default(), &tree(), None, &LayoutConfig::default());

        assert!(frame.reset);
        assert_eq!(frame.ids_in(Phase::Enter).len(), 3);
        assert!(frame.ids_in(Phase::Update).is_empty());
        assert_eq!(state.nodes.len(), 4);
        assert_eq!(state.visible.len(), 3);
        assert_eq!(
            state.expansion(&id("Algebra/Linear Algebra")),
            Some(Expansion::Collapsed)
        );
        // Root enters from its own position when nothing else is known.
        let root = frame.node(&id("Algebra")).unwrap();
        assert_eq!(root.from, root.to);
    }

    #[test]
    fn test_second_render_updates_and_keeps_positions() {
        let config = LayoutConfig::default();
        let (first, _) = reconcile(&RenderState::default(), &tree(), None, &config);
        let (second, frame) = reconcile(&first, &tree(), None, &config);

        assert!(!frame.reset);
        assert!(frame.ids_in(Phase::Enter).is_empty());
        assert!(frame.ids_in(Phase::Exit).is_empty());
        for draw in &frame.nodes {
            assert_eq!(draw.from, draw.to);
        }
        assert_eq!(first.visible, second.visible);
    }

    #[test]
    fn test_removed_node_exits_and_loses_state() {
        let config = LayoutConfig::default();
        let (first, _) = reconcile(&RenderState::default(), &tree(), None, &config);

        let smaller = TreeNode::new("Algebra")
            .with_children(vec![TreeNode::new("Linear Algebra")
                .with_children(vec![TreeNode::new("Vector Spaces")])]);
        let (second, frame) = reconcile(&first, &smaller, None, &config);

        let group = id("Algebra/Group Theory");
        assert_eq!(frame.ids_in(Phase::Exit), vec![&group]);
        let exit = frame.node(&group).unwrap();
        assert_eq!(exit.name, "Group Theory");
        assert!(!exit.has_children);
        // No trigger and the parent is visible: exit towards the parent.
        assert_eq!(exit.to, second.position(&id("Algebra")).unwrap());
        assert!(second.get(&group).is_none());
    }

    #[test]
    fn test_frame_order_is_exit_update_enter() {
        let config = LayoutConfig::default();
        let (first, _) = reconcile(&RenderState::default(), &tree(), None, &config);

        let changed = TreeNode::new("Algebra").with_children(vec![
            TreeNode::new("Linear Algebra").with_children(vec![TreeNode::new("Vector Spaces")]),
            TreeNode::new("Ring Theory"),
        ]);
        let (_, frame) = reconcile(&first, &changed, None, &config);
        let phases: Vec<Phase> = frame.nodes.iter().map(|n| n.phase).collect();
        assert_eq!(
            phases,
            vec![Phase::Exit, Phase::Update, Phase::Update, Phase::Enter]
        );
        let link = frame.link_to(&id("Algebra/Ring Theory")).unwrap();
        assert_eq!(link.phase, Phase::Enter);
        assert_eq!(link.from.source, link.from.target);
    }

    #[test]
    fn test_root_change_discards_state() {
        let config = LayoutConfig::default();
        let (mut first, _) = reconcile(&RenderState::default(), &tree(), None, &config);
        first
            .get_mut(&id("Algebra/Linear Algebra"))
            .unwrap()
            .expansion = Expansion::Expanded;

        let other = TreeNode::new("Geometry").with_children(vec![TreeNode::new("Topology")]);
        let (second, frame) = reconcile(&first, &other, None, &config);

        assert!(frame.reset);
        assert!(frame.ids_in(Phase::Exit).is_empty());
        assert_eq!(second.root, Some(id("Geometry")));
        assert_eq!(second.nodes.len(), 2);
    }

    #[test]
    fn test_collapsed_root_is_reopened() {
        let config = LayoutConfig::default();
        let (mut first, _) = reconcile(&RenderState::default(), &tree(), None, &config);
        first.get_mut(&id("Algebra")).unwrap().expansion = Expansion::Collapsed;

        let (second, _) = reconcile(&first, &tree(), None, &config);
        assert_eq!(second.expansion(&id("Algebra")), Some(Expansion::Expanded));
    }
}
