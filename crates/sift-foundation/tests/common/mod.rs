//! Common test utilities shared across all `sift-foundation` integration tests.
//!
//! This module is **not** a standalone test binary. It is declared with
//! `mod common;` inside each integration test file that needs it.

#![allow(dead_code)]

pub mod mock_collaborators;

use sift_foundation::rag::Document;

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Ids of a result list, in order.
pub fn ids(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d.id.as_str()).collect()
}

/// Scores never increase along the list.
pub fn assert_descending(docs: &[Document]) {
    assert!(
        docs.windows(2).all(|w| w[0].score >= w[1].score),
        "scores not descending: {:?}",
        docs.iter().map(|d| d.score).collect::<Vec<_>>()
    );
}
