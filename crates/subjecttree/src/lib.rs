//! SubjectTree: generate a map of any field of study with an LLM, then grow
//! it one node at a time.
//!
//! [`Session`] ties the pieces together: a [`TreeFetcher`](subjecttree_ai::TreeFetcher)
//! supplies model output, the tree model in `subjecttree-core` parses and
//! merges it, and the reconciling renderer in `subjecttree-render` keeps the
//! per-node interaction state across snapshots.

pub mod preferences;
pub mod presets;
pub mod session;

pub use preferences::Preferences;
pub use session::{MoreChildrenOutcome, Session};
