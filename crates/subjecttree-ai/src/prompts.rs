//! Prompt construction for tree and child generation.
//!
//! Both scopes produce exactly two messages: a system instruction carrying the
//! task and the strict output format, and a user instruction restating the
//! target and its constraints.

use crate::fetcher::FetchScope;
use crate::llm_provider::Message;
use serde_json::{json, Value};

const TREE_SYSTEM_PROMPT: &str = r#"You are an expert curriculum designer. You map a field of study into a hierarchy of its subjects and subfields.

Output format (strict):
- Respond with a single JSON object and nothing else. No markdown, no commentary.
- Every node has the shape {"name": string, "description": string, "children": [node, ...]}.
- "name" is short (one to five words). "description" is one sentence.
- Leaf nodes use "children": [].
- Go three to four levels deep with three to seven children per node."#;

const CHILDREN_SYSTEM_PROMPT: &str = r#"You are an expert curriculum designer. You extend an existing map of a field of study with further subtopics for one of its subjects.

Output format (strict):
- Respond with a single JSON array and nothing else. No markdown, no commentary.
- Every element has the shape {"name": string, "description": string, "children": []}.
- "name" is short (one to five words). "description" is one sentence.
- Return between three and six new subtopics."#;

/// Build the system and user messages for a fetch scope.
pub fn build_messages(scope: &FetchScope) -> Vec<Message> {
    match scope {
        FetchScope::Field { field } => vec![
            Message::system(TREE_SYSTEM_PROMPT),
            Message::user(format!(
                "Field of study: {field}\n\nProduce the subject tree with \"{field}\" as the root node name."
            )),
        ],
        FetchScope::Children {
            field,
            path,
            existing,
        } => {
            let target = path.last().map(String::as_str).unwrap_or(field.as_str());
            let mut user = format!(
                "Field of study: {field}\nSubject: {target}\nLocation in the tree: {}\n\n",
                path.join(" > ")
            );
            if existing.is_empty() {
                user.push_str(&format!("\"{target}\" has no subtopics yet.\n"));
            } else {
                user.push_str(&format!(
                    "\"{target}\" already has these subtopics. Do not repeat any of them:\n"
                ));
                for name in existing {
                    user.push_str(&format!("- {name}\n"));
                }
            }
            user.push_str(&format!(
                "\nList additional subtopics of \"{target}\" as a JSON array."
            ));
            vec![Message::system(CHILDREN_SYSTEM_PROMPT), Message::user(user)]
        }
    }
}

fn node_schema(children: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "description": { "type": "string" },
            "children": children
        },
        "required": ["name", "children"]
    })
}

/// Schema hint for a whole subject tree.
pub fn tree_schema() -> Value {
    // Structured-output dialects reject unbounded recursion, so nesting stops at four levels.
    let leaf = node_schema(json!({ "type": "array", "maxItems": 0 }));
    let level3 = node_schema(json!({ "type": "array", "items": leaf }));
    let level2 = node_schema(json!({ "type": "array", "items": level3 }));
    let level1 = node_schema(json!({ "type": "array", "items": level2 }));
    node_schema(json!({ "type": "array", "items": level1 }))
}

/// Schema hint for additional children; wrapped in an object because
/// structured-output endpoints require an object at the top level.
pub fn children_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "children": {
                "type": "array",
                "items": node_schema(json!({ "type": "array", "maxItems": 0 }))
            }
        },
        "required": ["children"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::MessageRole;

    #[test]
    fn test_field_prompt() {
        let messages = build_messages(&FetchScope::Field {
            field: "Algebra".to_string(),
        });
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("single JSON object"));
        assert!(messages[1].content.contains("Algebra"));
    }

    #[test]
    fn test_children_prompt_lists_existing_names() {
        let messages = build_messages(&FetchScope::Children {
            field: "Algebra".to_string(),
            path: vec!["Algebra".to_string(), "Linear Algebra".to_string()],
            existing: vec!["Vector Spaces".to_string()],
        });
        let user = &messages[1].content;
        assert!(user.contains("Subject: Linear Algebra"));
        assert!(user.contains("Algebra > Linear Algebra"));
        assert!(user.contains("Do not repeat"));
        assert!(user.contains("- Vector Spaces"));
        assert!(messages[0].content.contains("JSON array"));
    }

    #[test]
    fn test_schemas_are_objects() {
        assert_eq!(tree_schema()["type"], "object");
        assert_eq!(children_schema()["properties"]["children"]["type"], "array");
    }
}
