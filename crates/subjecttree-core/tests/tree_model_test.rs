use std::collections::HashSet;
use subjecttree_core::{
    extract_json, merge_children, parse_children, parse_tree, NodeId, SubjectTreeError, TreeNode,
};

fn sibling_names_unique(node: &TreeNode) -> bool {
    let mut seen = HashSet::new();
    node.children.iter().all(|c| seen.insert(c.name.as_str()))
        && node.children.iter().all(sibling_names_unique)
}

#[test]
fn test_wrapped_json_extracts_unchanged() {
    let json = r#"{"name":"Biology","children":[{"name":"Genetics","description":"heredity","children":[]}]}"#;
    let wrappers = [
        (String::new(), String::new()),
        ("Sure! Here's your subject tree:\n".to_string(), "\nHope this helps.".to_string()),
        ("```json\n".to_string(), "\n```".to_string()),
        ("Here is the JSON.\n```\n".to_string(), "\n```\nAnything else?".to_string()),
    ];

    for (prefix, suffix) in wrappers {
        let text = format!("{}{}{}", prefix, json, suffix);
        assert_eq!(extract_json(&text).unwrap(), json, "wrapped as {:?}", text);
    }
}

#[test]
fn test_truncated_stream_output_fails_extraction() {
    let err = parse_tree(r#"Here you go: {"name":"Biology","children":[{"name":"Gen"#).unwrap_err();
    assert!(matches!(err, SubjectTreeError::Extraction(_)));
}

#[test]
fn test_merge_twice_with_overlapping_names() {
    let tree = parse_tree(r#"{"name":"Algebra","children":[{"name":"Linear Algebra"}]}"#).unwrap();
    let target = NodeId::from_names(["Algebra", "Linear Algebra"]).unwrap();

    let first = parse_children(r#"[{"name":"Vector Spaces"},{"name":"Matrices"}]"#).unwrap();
    let second =
        parse_children(r#"[{"name":"Matrices"},{"name":"Determinants"},{"name":"Vector Spaces"}]"#)
            .unwrap();

    let once = merge_children(&tree, &target, first).unwrap();
    let twice = merge_children(&once, &target, second).unwrap();

    assert!(sibling_names_unique(&twice));
    assert_eq!(
        twice.find(&target).unwrap().child_names(),
        vec!["Vector Spaces", "Matrices", "Determinants"]
    );
    // Earlier snapshots are unaffected.
    assert!(tree.find(&target).unwrap().children.is_empty());
    assert_eq!(once.find(&target).unwrap().children.len(), 2);
}

#[test]
fn test_merge_into_root() {
    let tree = TreeNode::new("Music").with_children(vec![TreeNode::new("Harmony")]);
    let merged = merge_children(
        &tree,
        &tree.id(),
        vec![TreeNode::new("Rhythm"), TreeNode::new("Harmony")],
    )
    .unwrap();
    assert_eq!(merged.child_names(), vec!["Harmony", "Rhythm"]);
    assert_eq!(tree.child_names(), vec!["Harmony"]);
}

#[test]
fn test_identity_ignores_descriptions() {
    let a = parse_tree(
        r#"{"name":"Chemistry","children":[{"name":"Organic","description":"carbon","children":[{"name":"Alkanes"}]}]}"#,
    )
    .unwrap();
    let b = parse_tree(
        r#"{"name":"Chemistry","children":[{"name":"Organic","description":"carbon compounds and their reactions","children":[{"name":"Alkanes"}]}]}"#,
    )
    .unwrap();
    assert_eq!(a.ids(), b.ids());
}

#[test]
fn test_algebra_scenario_parses() {
    let tree = parse_tree(r#"{"name":"Algebra","children":[{"name":"Linear Algebra","children":[]}]}"#)
        .unwrap();
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].name, "Linear Algebra");
    assert!(tree.children[0].children.is_empty());
}
