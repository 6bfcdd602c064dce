use std::sync::Arc;
use subjecttree_ai::testing::{MockProvider, MockReply};
use subjecttree_ai::{FetchScope, GenerationConfig, LlmTreeFetcher, TreeFetcher};
use subjecttree_core::{parse_tree, ErrorKind, SubjectTreeError};

fn field(name: &str) -> FetchScope {
    FetchScope::Field {
        field: name.to_string(),
    }
}

#[tokio::test]
async fn test_streamed_fragments_parse_to_single_node() {
    let provider = Arc::new(MockProvider::new(vec![MockReply::stream([
        "{\"name\"",
        ":\"X\",\"children\":[]}",
    ])]));
    let fetcher = LlmTreeFetcher::new(provider, GenerationConfig::default());

    let text = fetcher.fetch(&field("X")).await.unwrap();
    let tree = parse_tree(&text).unwrap();

    assert_eq!(tree.name, "X");
    assert!(tree.children.is_empty());
}

#[tokio::test]
async fn test_provider_failure_propagates_without_retry() {
    let provider = Arc::new(MockProvider::new(vec![
        MockReply::fail(429, "rate limited"),
        MockReply::text("{\"name\":\"never\"}"),
    ]));
    let fetcher = LlmTreeFetcher::new(provider.clone(), GenerationConfig::default());

    let err = fetcher.fetch(&field("Algebra")).await.unwrap_err();
    assert!(matches!(err, SubjectTreeError::Provider { status: 429, .. }));
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_children_request_carries_existing_names() {
    let provider = Arc::new(MockProvider::new(vec![MockReply::text("[]")]));
    let fetcher = LlmTreeFetcher::new(provider.clone(), GenerationConfig::default());

    fetcher
        .fetch(&FetchScope::Children {
            field: "Algebra".to_string(),
            path: vec!["Algebra".to_string(), "Linear Algebra".to_string()],
            existing: vec!["Vector Spaces".to_string(), "Matrices".to_string()],
        })
        .await
        .unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let prompt = requests[0].user_prompt();
    assert!(prompt.contains("Linear Algebra"));
    assert!(prompt.contains("- Vector Spaces"));
    assert!(prompt.contains("- Matrices"));
    assert!(requests[0].config.json_schema.is_none());
}

#[tokio::test]
async fn test_describe_names_provider_and_model() {
    let fetcher = LlmTreeFetcher::new(
        Arc::new(MockProvider::new(vec![])),
        GenerationConfig::default(),
    );
    assert_eq!(fetcher.describe(), "mock/mock-model");
}
