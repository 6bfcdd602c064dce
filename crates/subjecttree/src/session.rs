use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use subjecttree_ai::{FetchScope, TreeFetcher};
use subjecttree_core::{
    export_json, merge_children_report, parse_children, parse_tree, NodeId, RenderConfig, Result,
    SubjectTreeError, TreeNode,
};
use subjecttree_render::{
    outline, outline_lines, svg, LayoutConfig, LayoutMode, OutlineLine, RenderFrame, RenderState,
    Renderer,
};
use tracing::{debug, info, warn};

/// Result of a "generate more children" request.
#[derive(Debug, Clone, PartialEq)]
pub enum MoreChildrenOutcome {
    /// New children were merged into the tree.
    Merged {
        added: Vec<String>,
        dropped: Vec<String>,
        frame: RenderFrame,
    },
    /// A request for this node is already in flight; nothing was sent.
    AlreadyPending,
    /// The tree changed underneath the request and its result was discarded.
    Stale,
}

struct SessionState {
    field: Option<String>,
    /// Bumped whenever a new root tree is installed.
    epoch: u64,
    /// Token of the request that owns each pending flag.
    requests: HashMap<NodeId, u64>,
    next_request: u64,
    renderer: Renderer,
}

impl SessionState {
    /// Drop `token`'s claim on `id`. Returns false when a newer request owns
    /// the pending flag, which must then be left alone.
    fn release(&mut self, id: &NodeId, token: u64) -> bool {
        if self.requests.get(id) != Some(&token) {
            return false;
        }
        self.requests.remove(id);
        true
    }
}

/// One exploration of a field of study.
///
/// All methods take `&self`, so a session can be shared across tasks. The
/// state lock is only held between awaits, never across one: fetches run
/// unlocked and their results are applied against whatever tree is current
/// when they complete.
pub struct Session {
    fetcher: Arc<dyn TreeFetcher>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(fetcher: Arc<dyn TreeFetcher>, layout: LayoutConfig) -> Self {
        Self {
            fetcher,
            state: Mutex::new(SessionState {
                field: None,
                epoch: 0,
                requests: HashMap::new(),
                next_request: 0,
                renderer: Renderer::new(layout),
            }),
        }
    }

    pub fn from_config(fetcher: Arc<dyn TreeFetcher>, config: &RenderConfig) -> Result<Self> {
        Ok(Self::new(fetcher, LayoutConfig::from_render_config(config)?))
    }

    pub fn fetcher(&self) -> &Arc<dyn TreeFetcher> {
        &self.fetcher
    }

    /// Generate a whole tree for `field` and render it.
    ///
    /// On failure the current tree, if any, is left as it was.
    pub async fn generate(&self, field: &str) -> Result<RenderFrame> {
        let field = field.trim();
        if field.is_empty() {
            return Err(SubjectTreeError::Validation(
                "field of study must not be empty".to_string(),
            ));
        }

        info!("Generating subject tree for '{}'", field);
        let text = self
            .fetcher
            .fetch(&FetchScope::Field {
                field: field.to_string(),
            })
            .await?;
        let tree = parse_tree(&text)?;
        debug!("Parsed tree '{}' with {} nodes", tree.name, tree.size());

        Ok(self.install(tree, field))
    }

    /// Show a tree read from disk, replacing the current one. The field of
    /// study defaults to the root name.
    pub fn load(&self, tree: TreeNode, field: Option<&str>) -> RenderFrame {
        let field = field.map(str::to_string).unwrap_or_else(|| tree.name.clone());
        self.install(tree, &field)
    }

    fn install(&self, tree: TreeNode, field: &str) -> RenderFrame {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.field = Some(field.to_string());
        state.renderer.render(tree, None).clone()
    }

    /// Ask the provider for more children of `id` and merge them in.
    ///
    /// A second request for a node that is still pending is answered with
    /// `AlreadyPending` without contacting the provider. On failure the node
    /// returns to idle with its children untouched.
    pub async fn request_more_children(&self, id: &NodeId) -> Result<MoreChildrenOutcome> {
        let (scope, epoch, token) = {
            let mut state = self.state.lock();
            let (path, existing) = {
                let snapshot = state
                    .renderer
                    .snapshot()
                    .ok_or_else(|| SubjectTreeError::NodeNotFound(id.to_string()))?;
                let path = snapshot
                    .names_to(id)
                    .ok_or_else(|| SubjectTreeError::NodeNotFound(id.to_string()))?;
                let existing = snapshot
                    .find(id)
                    .map(TreeNode::child_names)
                    .unwrap_or_default();
                (path, existing)
            };
            if !state.renderer.begin_pending(id) {
                debug!("Request for {} already in flight", id);
                return Ok(MoreChildrenOutcome::AlreadyPending);
            }
            state.next_request += 1;
            let token = state.next_request;
            state.requests.insert(id.clone(), token);
            let field = state
                .field
                .clone()
                .or_else(|| path.first().cloned())
                .unwrap_or_default();
            (
                FetchScope::Children {
                    field,
                    path,
                    existing,
                },
                state.epoch,
                token,
            )
        };

        let result = match self.fetcher.fetch(&scope).await {
            Ok(text) => parse_children(&text),
            Err(e) => Err(e),
        };

        let mut state = self.state.lock();
        let state = &mut *state;
        let owner = state.release(id, token);
        let current = owner
            && state.epoch == epoch
            && state
                .renderer
                .snapshot()
                .map(|s| s.contains(id))
                .unwrap_or(false);
        if !current {
            info!("Discarding stale result for {}", id);
            if owner && state.renderer.complete_pending(id, false) {
                state.renderer.rerender(None);
            }
            return Ok(MoreChildrenOutcome::Stale);
        }

        let merged = result.and_then(|children| {
            let snapshot = state
                .renderer
                .snapshot()
                .ok_or_else(|| SubjectTreeError::NodeNotFound(id.to_string()))?;
            merge_children_report(snapshot, id, children)
        });

        match merged {
            Ok(report) => {
                state.renderer.complete_pending(id, true);
                let frame = state.renderer.render(report.tree, Some(id)).clone();
                info!(
                    "Merged {} new children into {} ({} duplicates dropped)",
                    report.added.len(),
                    id,
                    report.dropped.len()
                );
                Ok(MoreChildrenOutcome::Merged {
                    added: report.added,
                    dropped: report.dropped,
                    frame,
                })
            }
            Err(e) => {
                warn!("More children for {} failed: {}", id, e);
                state.renderer.complete_pending(id, false);
                state.renderer.rerender(Some(id));
                Err(e)
            }
        }
    }

    /// Resolve a user-typed node path against the current tree. The root
    /// name may be left out.
    pub fn resolve(&self, input: &str) -> Option<NodeId> {
        let state = self.state.lock();
        let snapshot = state.renderer.snapshot()?;
        let id = NodeId::parse_path(input)?;
        if snapshot.contains(&id) {
            return Some(id);
        }
        let under_root = id
            .segments()
            .iter()
            .fold(snapshot.id(), |parent, s| parent.child(&s.name, s.occurrence));
        snapshot.contains(&under_root).then_some(under_root)
    }

    pub fn toggle(&self, id: &NodeId) -> bool {
        self.state.lock().renderer.toggle(id)
    }

    pub fn expand_all(&self) -> bool {
        self.state.lock().renderer.expand_all()
    }

    pub fn collapse_all(&self) -> bool {
        self.state.lock().renderer.collapse_all()
    }

    pub fn set_layout(&self, mode: LayoutMode) {
        self.state.lock().renderer.set_layout(mode);
    }

    pub fn field(&self) -> Option<String> {
        self.state.lock().field.clone()
    }

    pub fn snapshot(&self) -> Option<TreeNode> {
        self.state.lock().renderer.snapshot().cloned()
    }

    pub fn frame(&self) -> RenderFrame {
        self.state.lock().renderer.frame().clone()
    }

    pub fn render_state(&self) -> RenderState {
        self.state.lock().renderer.state().clone()
    }

    pub fn is_pending(&self, id: &NodeId) -> bool {
        self.state.lock().renderer.state().is_pending(id)
    }

    pub fn outline(&self) -> Option<String> {
        let state = self.state.lock();
        let snapshot = state.renderer.snapshot()?;
        Some(outline(snapshot, state.renderer.state()))
    }

    pub fn outline_lines(&self) -> Vec<OutlineLine> {
        let state = self.state.lock();
        match state.renderer.snapshot() {
            Some(snapshot) => outline_lines(snapshot, state.renderer.state()),
            None => Vec::new(),
        }
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let tree = self.snapshot().ok_or_else(|| {
            SubjectTreeError::Validation("there is no tree to export yet".to_string())
        })?;
        export_json(&tree, path)
    }

    pub fn export_svg(&self, path: &Path) -> Result<()> {
        let frame = self.frame();
        if frame.nodes.is_empty() {
            return Err(SubjectTreeError::Validation(
                "there is no diagram to export yet".to_string(),
            ));
        }
        svg::write_svg(&frame, path)
    }
}
