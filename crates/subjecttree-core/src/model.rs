use crate::error::{Result, SubjectTreeError};
use crate::extract::extract_json;
use crate::identity::NodeId;
use crate::node::TreeNode;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Parse a whole subject tree out of raw model output.
pub fn parse_tree(text: &str) -> Result<TreeNode> {
    let value = parse_value(text)?;
    let object = value.as_object().ok_or_else(|| {
        SubjectTreeError::Validation(format!("root must be an object, got {}", kind_of(&value)))
    })?;

    let name = node_name(object).ok_or_else(|| {
        SubjectTreeError::Validation("root node has no string \"name\"".to_string())
    })?;
    let tree = build_node(name, object, "root")?;
    debug!("Parsed subject tree '{}' with {} nodes", tree.name, tree.size());
    Ok(tree)
}

/// Parse a list of newly generated sibling nodes out of raw model output.
///
/// Accepts an array of nodes, a single node object, or an object carrying a
/// `children` array.
pub fn parse_children(text: &str) -> Result<Vec<TreeNode>> {
    let value = parse_value(text)?;
    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(object) if node_name(object).is_some() => std::slice::from_ref(&value),
        Value::Object(object) => match object.get("children") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => {
                return Err(SubjectTreeError::Validation(
                    "expected an array of nodes".to_string(),
                ))
            }
        },
        other => {
            return Err(SubjectTreeError::Validation(format!(
                "expected an array of nodes, got {}",
                kind_of(other)
            )))
        }
    };
    build_children(items, "new children")
}

fn parse_value(text: &str) -> Result<Value> {
    let json = extract_json(text)?;
    serde_json::from_str(json).map_err(|e| {
        let preview: String = json.chars().take(200).collect();
        warn!("Delimited JSON failed to parse: {} ({})", e, preview);
        SubjectTreeError::Extraction(format!("delimited text is not valid JSON: {}", e))
    })
}

fn node_name(object: &Map<String, Value>) -> Option<String> {
    let name = match object.get("name")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

fn build_node(name: String, object: &Map<String, Value>, context: &str) -> Result<TreeNode> {
    let description = match object.get("description") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };

    let children = match object.get("children") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => build_children(items, &name)?,
        Some(other) => {
            return Err(SubjectTreeError::Validation(format!(
                "\"children\" of {} '{}' must be an array, got {}",
                context,
                name,
                kind_of(other)
            )))
        }
    };

    Ok(TreeNode {
        name,
        description,
        children,
    })
}

fn build_children(items: &[Value], parent: &str) -> Result<Vec<TreeNode>> {
    let mut children = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            warn!("Dropping non-object child #{} of '{}'", index, parent);
            continue;
        };
        let Some(name) = node_name(object) else {
            warn!("Dropping child #{} of '{}' without a usable name", index, parent);
            continue;
        };
        children.push(build_node(name, object, "node")?);
    }
    Ok(children)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// What a merge kept and what it threw away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub tree: TreeNode,
    pub added: Vec<String>,
    pub dropped: Vec<String>,
}

/// Append `new_children` to the node at `parent`, skipping any whose name
/// already exists among its siblings. The input tree is left untouched.
pub fn merge_children(tree: &TreeNode, parent: &NodeId, new_children: Vec<TreeNode>) -> Result<TreeNode> {
    merge_children_report(tree, parent, new_children).map(|report| report.tree)
}

pub fn merge_children_report(
    tree: &TreeNode,
    parent: &NodeId,
    new_children: Vec<TreeNode>,
) -> Result<MergeReport> {
    let target = tree
        .find(parent)
        .ok_or_else(|| SubjectTreeError::NodeNotFound(parent.to_string()))?;

    let mut names: HashSet<String> = target.child_names().into_iter().collect();
    let mut added = Vec::new();
    let mut dropped = Vec::new();
    let mut accepted = Vec::new();
    for child in new_children {
        if names.insert(child.name.clone()) {
            added.push(child.name.clone());
            accepted.push(child);
        } else {
            dropped.push(child.name);
        }
    }

    // Path-copy: only the nodes between the root and the target are rebuilt.
    let chain: Vec<usize> = child_indices(tree, parent).ok_or_else(|| {
        SubjectTreeError::NodeNotFound(parent.to_string())
    })?;
    let tree = rebuild(tree, &chain, accepted);

    Ok(MergeReport {
        tree,
        added,
        dropped,
    })
}

fn child_indices(tree: &TreeNode, id: &NodeId) -> Option<Vec<usize>> {
    let segments = id.segments();
    let mut indices = Vec::with_capacity(segments.len().saturating_sub(1));
    let mut current = tree;
    for segment in segments.iter().skip(1) {
        let (index, child) = current
            .children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name == segment.name)
            .nth(segment.occurrence.checked_sub(1)?)?;
        indices.push(index);
        current = child;
    }
    Some(indices)
}

fn rebuild(node: &TreeNode, chain: &[usize], additions: Vec<TreeNode>) -> TreeNode {
    match chain.split_first() {
        None => {
            let mut children = node.children.clone();
            children.extend(additions);
            TreeNode {
                name: node.name.clone(),
                description: node.description.clone(),
                children,
            }
        }
        Some((&index, rest)) => {
            let mut additions = Some(additions);
            let children = node
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| match additions.take() {
                    Some(pending) if i == index => rebuild(child, rest, pending),
                    pending => {
                        additions = pending;
                        child.clone()
                    }
                })
                .collect();
            TreeNode {
                name: node.name.clone(),
                description: node.description.clone(),
                children,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_tree() {
        let tree =
            parse_tree(r#"{"name":"Algebra","children":[{"name":"Linear Algebra","children":[]}]}"#)
                .unwrap();
        assert_eq!(tree.name, "Algebra");
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "Linear Algebra");
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn test_missing_children_defaults_to_empty() {
        let tree = parse_tree(r#"{"name":"Logic","description":"reasoning"}"#).unwrap();
        assert!(tree.children.is_empty());
        assert_eq!(tree.description.as_deref(), Some("reasoning"));

        let tree = parse_tree(r#"{"name":"Logic","children":null}"#).unwrap();
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_root_without_name_is_validation_error() {
        let err = parse_tree(r#"{"title":"Algebra","children":[]}"#).unwrap_err();
        assert!(matches!(err, SubjectTreeError::Validation(_)));

        let err = parse_tree(r#"["Algebra"]"#).unwrap_err();
        assert!(matches!(err, SubjectTreeError::Validation(_)));
    }

    #[test]
    fn test_children_not_a_sequence_is_validation_error() {
        let err = parse_tree(r#"{"name":"Algebra","children":"none"}"#).unwrap_err();
        assert!(matches!(err, SubjectTreeError::Validation(_)));

        let nested = r#"{"name":"A","children":[{"name":"B","children":{"name":"C"}}]}"#;
        assert!(matches!(
            parse_tree(nested).unwrap_err(),
            SubjectTreeError::Validation(_)
        ));
    }

    #[test]
    fn test_malformed_children_are_dropped() {
        let tree = parse_tree(
            r#"{"name":"Physics","children":[{"children":[]},"Optics",{"name":"  "},{"name":"Mechanics","description":7}]}"#,
        )
        .unwrap();
        assert_eq!(tree.child_names(), vec!["Mechanics"]);
        assert!(tree.children[0].description.is_none());
    }

    #[test]
    fn test_invalid_json_inside_braces_is_extraction_error() {
        let err = parse_tree("{name: Algebra}").unwrap_err();
        assert!(matches!(err, SubjectTreeError::Extraction(_)));
    }

    #[test]
    fn test_parse_children_shapes() {
        let list = parse_children(r#"[{"name":"A"},{"name":"B","children":[]}]"#).unwrap();
        assert_eq!(list.len(), 2);

        let single = parse_children(r#"{"name":"A","children":[]}"#).unwrap();
        assert_eq!(single.len(), 1);

        let wrapped = parse_children(r#"{"children":[{"name":"A"}]}"#).unwrap();
        assert_eq!(wrapped[0].name, "A");

        assert!(parse_children(r#"{"items":[]}"#).is_err());
    }

    #[test]
    fn test_merge_dedups_and_preserves_input() {
        let tree = TreeNode::new("Algebra").with_children(vec![TreeNode::new("Linear Algebra")
            .with_children(vec![TreeNode::new("Vector Spaces")])]);
        let before = tree.clone();
        let target = NodeId::from_names(["Algebra", "Linear Algebra"]).unwrap();

        let report = merge_children_report(
            &tree,
            &target,
            vec![
                TreeNode::new("Vector Spaces").with_description("d"),
                TreeNode::new("Eigenvalues").with_description("e"),
                TreeNode::new("Eigenvalues"),
            ],
        )
        .unwrap();

        assert_eq!(tree, before);
        assert_eq!(report.added, vec!["Eigenvalues"]);
        assert_eq!(report.dropped, vec!["Vector Spaces", "Eigenvalues"]);
        let merged = report.tree.find(&target).unwrap();
        assert_eq!(merged.child_names(), vec!["Vector Spaces", "Eigenvalues"]);
        assert!(merged.children[0].description.is_none());
    }

    #[test]
    fn test_merge_unknown_parent() {
        let tree = TreeNode::new("Algebra");
        let missing = NodeId::from_names(["Algebra", "Topology"]).unwrap();
        let err = merge_children(&tree, &missing, vec![TreeNode::new("X")]).unwrap_err();
        assert!(matches!(err, SubjectTreeError::NodeNotFound(_)));
    }
}
