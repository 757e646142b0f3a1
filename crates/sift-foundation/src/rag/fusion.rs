//! Rank fusion and result ordering helpers

use sift_kernel::rag::{Document, RETRIEVAL_TYPE_KEY};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Rank offset from the original RRF paper.
pub const RRF_K: f64 = 60.0;

/// Descending score, ties broken by ascending id.
pub fn compare_by_score(a: &Document, b: &Document) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Sort documents by descending score with a deterministic id tie-break.
pub fn sort_by_score(docs: &mut [Document]) {
    docs.sort_by(compare_by_score);
}

/// Drop later occurrences of an id; the first occurrence wins.
pub fn dedupe_by_id(docs: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect()
}

/// Sort, then keep at most `top_k` documents.
pub fn rank_and_truncate(mut docs: Vec<Document>, top_k: usize) -> Vec<Document> {
    sort_by_score(&mut docs);
    docs.truncate(top_k);
    docs
}

/// Stamp `retrieval_type` on every document.
pub fn tag_retrieval_type(docs: &mut [Document], retrieval_type: &str) {
    for doc in docs {
        doc.metadata
            .insert(RETRIEVAL_TYPE_KEY.to_string(), retrieval_type.into());
    }
}

/// Weighted Reciprocal Rank Fusion.
///
/// Each input is a ranked list with its weight. A document's fused score is
/// `sum(weight / (RRF_K + rank))` over the lists that contain it, with
/// 1-based ranks. A document repeated within one list only counts at its
/// best rank there. Documents present in only one list are kept. The first
/// seen copy of each document supplies its content and metadata. Output is
/// sorted by fused score.
pub fn reciprocal_rank_fusion(ranked_lists: Vec<(Vec<Document>, f64)>) -> Vec<Document> {
    let mut fused: HashMap<String, (Document, f64)> = HashMap::new();

    for (docs, weight) in ranked_lists {
        let mut counted = HashSet::new();
        for (rank, doc) in docs.into_iter().enumerate() {
            if !counted.insert(doc.id.clone()) {
                continue;
            }
            let contribution = weight / (RRF_K + (rank + 1) as f64);
            fused
                .entry(doc.id.clone())
                .and_modify(|(_, score)| *score += contribution)
                .or_insert((doc, contribution));
        }
    }

    let mut merged: Vec<Document> = fused
        .into_values()
        .map(|(mut doc, score)| {
            doc.score = score as f32;
            doc
        })
        .collect();
    sort_by_score(&mut merged);
    merged
}
