//! Reconciling renderer for subject trees.
//!
//! Interaction state (expansion, pending requests, last positions) is keyed by
//! [`NodeId`](subjecttree_core::NodeId), never attached to the tree itself, so
//! it survives every new snapshot of the tree. [`reconcile`] turns a previous
//! state and a new snapshot into draw commands that any target can animate;
//! [`Renderer`] wraps it with the per-node state machine.

pub mod frame;
pub mod layout;
pub mod outline;
pub mod reconcile;
pub mod renderer;
pub mod state;
pub mod svg;

pub use frame::{LineSegment, LinkDraw, NodeDraw, Phase, RenderFrame};
pub use layout::{LayoutConfig, LayoutMode};
pub use outline::{outline, outline_lines, Marker, OutlineLine};
pub use reconcile::reconcile;
pub use renderer::Renderer;
pub use state::{Expansion, NodeState, Point, RenderState};
