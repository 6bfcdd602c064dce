use crate::frame::RenderFrame;
use crate::layout::{LayoutConfig, LayoutMode};
use crate::reconcile::reconcile;
use crate::state::{Expansion, RenderState};
use subjecttree_core::{NodeId, TreeNode};
use tracing::debug;

/// Owns the current snapshot and the per-node interaction state.
///
/// Each node moves through `{collapsed, expanded} x {idle, pending}`:
/// expand and collapse only apply to idle nodes, a pending node refuses a
/// second request, and finishing a request returns the node to idle (forcing
/// it open on success). The root is always expanded.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: LayoutConfig,
    snapshot: Option<TreeNode>,
    state: RenderState,
    frame: RenderFrame,
}

impl Renderer {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Option<&TreeNode> {
        self.snapshot.as_ref()
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Frame produced by the most recent render.
    pub fn frame(&self) -> &RenderFrame {
        &self.frame
    }

    /// Render `snapshot`, reconciling it against the previous one.
    pub fn render(&mut self, snapshot: TreeNode, trigger: Option<&NodeId>) -> &RenderFrame {
        let (state, frame) = reconcile(&self.state, &snapshot, trigger, &self.config);
        self.state = state;
        self.frame = frame;
        self.snapshot = Some(snapshot);
        &self.frame
    }

    /// Render the current snapshot again, e.g. after a state change.
    pub fn rerender(&mut self, trigger: Option<&NodeId>) -> Option<&RenderFrame> {
        let snapshot = self.snapshot.take()?;
        Some(self.render(snapshot, trigger))
    }

    fn root_id(&self) -> Option<NodeId> {
        self.snapshot.as_ref().map(TreeNode::id)
    }

    fn is_idle(&self, id: &NodeId) -> bool {
        self.state.get(id).map(|s| !s.pending).unwrap_or(false)
    }

    pub fn expand(&mut self, id: &NodeId) -> bool {
        let has_children = self
            .snapshot
            .as_ref()
            .and_then(|s| s.find(id))
            .map(TreeNode::has_children)
            .unwrap_or(false);
        if !has_children || !self.is_idle(id) {
            return false;
        }
        self.transition(id, Expansion::Expanded)
    }

    pub fn collapse(&mut self, id: &NodeId) -> bool {
        if self.root_id().as_ref() == Some(id) || !self.is_idle(id) {
            return false;
        }
        self.transition(id, Expansion::Collapsed)
    }

    pub fn toggle(&mut self, id: &NodeId) -> bool {
        match self.state.expansion(id) {
            Some(Expansion::Expanded) => self.collapse(id),
            Some(Expansion::Collapsed) => self.expand(id),
            None => false,
        }
    }

    fn transition(&mut self, id: &NodeId, to: Expansion) -> bool {
        match self.state.get_mut(id) {
            Some(node) if node.expansion != to => node.expansion = to,
            _ => return false,
        }
        debug!("{} -> {:?}", id, to);
        self.rerender(Some(id));
        true
    }

    /// Mark `id` as waiting for more children. Returns false when the node is
    /// unknown or already pending.
    pub fn begin_pending(&mut self, id: &NodeId) -> bool {
        match self.state.get_mut(id) {
            Some(node) if !node.pending => node.pending = true,
            _ => return false,
        }
        self.rerender(Some(id));
        true
    }

    /// Return a pending node to idle, expanding it when `success` is set.
    ///
    /// Takes effect on the next render, which normally carries the merged
    /// snapshot. Returns false when the node is not pending.
    pub fn complete_pending(&mut self, id: &NodeId, success: bool) -> bool {
        match self.state.get_mut(id) {
            Some(node) if node.pending => {
                node.pending = false;
                if success {
                    node.expansion = Expansion::Expanded;
                }
                true
            }
            _ => false,
        }
    }

    pub fn expand_all(&mut self) -> bool {
        self.set_all(Expansion::Expanded)
    }

    /// Collapse every node except the root.
    pub fn collapse_all(&mut self) -> bool {
        self.set_all(Expansion::Collapsed)
    }

    fn set_all(&mut self, expansion: Expansion) -> bool {
        let Some(root) = self.root_id() else {
            return false;
        };
        for (id, node) in self.state.nodes.iter_mut() {
            node.expansion = if *id == root {
                Expansion::Expanded
            } else {
                expansion
            };
        }
        self.rerender(Some(&root));
        true
    }

    pub fn set_layout(&mut self, mode: LayoutMode) {
        self.config.mode = mode;
        let root = self.root_id();
        self.rerender(root.as_ref());
    }
}
