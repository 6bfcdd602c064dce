use crate::identity::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One node of a subject tree.
///
/// A tree is an immutable snapshot: operations that change it return a new
/// tree and leave the original untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            children: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    pub fn id(&self) -> NodeId {
        NodeId::root(&self.name)
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Identities of the children of a node whose identity is `id`.
    pub fn child_ids(&self, id: &NodeId) -> Vec<NodeId> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        self.children
            .iter()
            .map(|child| {
                let occurrence = seen.entry(child.name.as_str()).or_insert(0);
                *occurrence += 1;
                id.child(&child.name, *occurrence)
            })
            .collect()
    }

    /// Visit every node in pre-order with its identity and depth.
    pub fn walk_with_ids<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a TreeNode, &NodeId, usize),
    {
        fn visit<'a, F>(node: &'a TreeNode, id: &NodeId, depth: usize, f: &mut F)
        where
            F: FnMut(&'a TreeNode, &NodeId, usize),
        {
            f(node, id, depth);
            for (child, child_id) in node.children.iter().zip(node.child_ids(id)) {
                visit(child, &child_id, depth + 1, f);
            }
        }
        visit(self, &self.id(), 0, f);
    }

    /// Every identity in the tree, in pre-order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.size());
        self.walk_with_ids(&mut |_, id, _| out.push(id.clone()));
        out
    }

    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        self.path_to(id).and_then(|path| path.last().copied())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.find(id).is_some()
    }

    /// The chain of nodes from the root down to `id`, inclusive.
    pub fn path_to(&self, id: &NodeId) -> Option<Vec<&TreeNode>> {
        let segments = id.segments();
        let (first, rest) = segments.split_first()?;
        if first.name != self.name || first.occurrence != 1 {
            return None;
        }

        let mut path = vec![self];
        let mut current = self;
        for segment in rest {
            current = current
                .children
                .iter()
                .filter(|c| c.name == segment.name)
                .nth(segment.occurrence.checked_sub(1)?)?;
            path.push(current);
        }
        Some(path)
    }

    /// Names along the path from the root to `id`.
    pub fn names_to(&self, id: &NodeId) -> Option<Vec<String>> {
        self.path_to(id)
            .map(|path| path.iter().map(|n| n.name.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        TreeNode::new("Algebra").with_children(vec![
            TreeNode::new("Linear Algebra")
                .with_children(vec![TreeNode::new("Vector Spaces")]),
            TreeNode::new("Group Theory"),
        ])
    }

    #[test]
    fn test_find_by_identity() {
        let tree = sample();
        let id = NodeId::from_names(["Algebra", "Linear Algebra", "Vector Spaces"]).unwrap();
        assert_eq!(tree.find(&id).map(|n| n.name.as_str()), Some("Vector Spaces"));
        assert_eq!(
            tree.names_to(&id).unwrap(),
            vec!["Algebra", "Linear Algebra", "Vector Spaces"]
        );

        let missing = NodeId::from_names(["Algebra", "Topology"]).unwrap();
        assert!(tree.find(&missing).is_none());
        assert!(!tree.contains(&NodeId::root("Geometry")));
    }

    #[test]
    fn test_ids_are_preorder_and_unique_with_duplicate_names() {
        let tree = TreeNode::new("R").with_children(vec![
            TreeNode::new("A"),
            TreeNode::new("B"),
            TreeNode::new("A"),
        ]);
        let ids: Vec<String> = tree.ids().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, vec!["R", "R/A", "R/B", "R/A#2"]);

        let second = NodeId::parse_path("R/A#2").unwrap();
        assert!(tree.find(&second).is_some());
    }

    #[test]
    fn test_walk_reports_depth() {
        let tree = sample();
        let mut depths = Vec::new();
        tree.walk_with_ids(&mut |node, _, depth| depths.push((node.name.clone(), depth)));
        assert_eq!(depths[0], ("Algebra".to_string(), 0));
        assert_eq!(depths[2], ("Vector Spaces".to_string(), 2));
        assert_eq!(tree.size(), 4);
    }
}
