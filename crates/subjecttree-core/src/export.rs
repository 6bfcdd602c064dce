use crate::error::Result;
use crate::model::parse_tree;
use crate::node::TreeNode;
use std::path::Path;
use tracing::info;

pub fn to_json_pretty(tree: &TreeNode) -> Result<String> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// Write `tree` as a `{name, description?, children}` JSON document.
pub fn export_json(tree: &TreeNode, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_json_pretty(tree)?)?;
    info!("Exported '{}' ({} nodes) to {}", tree.name, tree.size(), path.display());
    Ok(())
}

/// Read a previously exported tree, applying the same validation as model output.
pub fn import_json(path: &Path) -> Result<TreeNode> {
    let content = std::fs::read_to_string(path)?;
    parse_tree(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_export_omits_missing_description() {
        let tree = TreeNode::new("Algebra")
            .with_children(vec![TreeNode::new("Rings").with_description("commutative")]);
        let json = to_json_pretty(&tree).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["children"][0]["description"], "commutative");
    }

    #[test]
    fn test_export_then_import() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("algebra.json");
        let tree = TreeNode::new("Algebra").with_children(vec![TreeNode::new("Fields")]);

        export_json(&tree, &path).unwrap();
        assert_eq!(import_json(&path).unwrap(), tree);
    }
}
