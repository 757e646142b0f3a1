//! Hierarchical retrieval over an indexed document tree.

mod common;

use std::sync::Arc;

use common::ids;
use common::mock_collaborators::HashingEmbedder;
use sift_foundation::rag::{
    CachedEmbedder, IndexNode, InMemoryVectorStore, NodeIndex, NodeType, RecursiveRetriever,
    RetrieveOptions, Retriever, VectorStore,
};
use tokio_util::sync::CancellationToken;

fn book() -> Vec<IndexNode> {
    vec![
        IndexNode::new("book", NodeType::Summary, "a guide to gardening vegetables and flowers")
            .with_children(["veg", "flowers"]),
        IndexNode::new("veg", NodeType::Index, "vegetables tomatoes carrots")
            .with_parent("book")
            .with_children(["tomatoes", "carrots"]),
        IndexNode::new("flowers", NodeType::Index, "flowers roses tulips")
            .with_parent("book")
            .with_children(["roses"]),
        IndexNode::leaf("tomatoes", "tomatoes need full sun and regular watering").with_parent("veg"),
        IndexNode::leaf("carrots", "carrots grow best in loose sandy soil").with_parent("veg"),
        IndexNode::leaf("roses", "roses need pruning in early spring").with_parent("flowers"),
    ]
}

#[tokio::test]
async fn max_depth_one_never_reaches_grandchildren() {
    let embedder = Arc::new(HashingEmbedder::new(256));
    let store = Arc::new(InMemoryVectorStore::cosine());
    let index = Arc::new(NodeIndex::new());

    let root = IndexNode::new("root", NodeType::Index, "alpha root").with_children(["mid"]);
    let mid = IndexNode::new("mid", NodeType::Index, "alpha mid")
        .with_parent("root")
        .with_children(["leaf"])
        .with_embedding(embedder.vector("alpha mid"));
    let leaf = IndexNode::leaf("leaf", "alpha leaf")
        .with_parent("mid")
        .with_embedding(embedder.vector("alpha leaf"));

    store
        .add(vec![
            sift_foundation::rag::Document::new("root", "alpha root")
                .with_embedding(embedder.vector("alpha root")),
        ])
        .await
        .unwrap();
    index.add_all([root, mid, leaf]);

    let retriever = RecursiveRetriever::builder()
        .index(index)
        .store(store)
        .embedder(CachedEmbedder::with_defaults(embedder))
        .max_depth(1)
        .build()
        .unwrap();

    let docs = retriever.retrieve("alpha", &RetrieveOptions::new(5)).await.unwrap();
    assert!(!ids(&docs).contains(&"leaf"));
}

#[tokio::test]
async fn indexed_tree_resolves_to_leaves() {
    common::init_tracing();
    let embedder = Arc::new(HashingEmbedder::new(256));
    let retriever = RecursiveRetriever::builder()
        .store(Arc::new(InMemoryVectorStore::cosine()))
        .embedder(CachedEmbedder::with_defaults(embedder))
        .build()
        .unwrap();

    retriever.index_nodes(book(), &CancellationToken::new()).await.unwrap();
    assert_eq!(retriever.index().leaves().len(), 3);
    assert_eq!(retriever.index().roots().len(), 1);

    let docs = retriever
        .retrieve("tomatoes sun", &RetrieveOptions::new(2))
        .await
        .unwrap();
    assert_eq!(docs[0].id, "tomatoes");
    assert!(docs.iter().all(|d| d.metadata_str("retrieval_type") == Some("recursive")));
    assert!(docs.iter().all(|d| d.metadata_str("node_type") == Some("chunk")));
}
