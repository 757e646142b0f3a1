//! BM25 keyword scoring
//!
//! A single-document BM25 approximation: term saturation and length
//! normalization are applied, but there is no corpus-level IDF and the
//! average document length is a fixed assumption rather than a measured
//! statistic. Scores are comparable across documents of one call only.

use std::collections::HashMap;

/// Term-frequency saturation parameter.
pub const K1: f64 = 1.2;
/// Length-normalization strength.
pub const B: f64 = 0.75;
/// Assumed average document length in tokens.
pub const AVG_DOC_LEN: f64 = 100.0;

/// CJK unified ideograph blocks (base, extensions A-F, compatibility).
fn is_cjk_ideograph(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2EBEF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || is_cjk_ideograph(c)
}

/// Case-fold and split on anything that is neither ASCII alphanumeric nor
/// a CJK ideograph.
///
/// Runs of CJK text stay a single token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_token_char(c))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Score `content` against pre-tokenized query terms.
///
/// A term with no exact token match that still occurs as a substring of the
/// case-folded content counts once, which keeps CJK queries matching inside
/// longer CJK runs.
pub fn bm25_score(query_terms: &[String], content: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }

    let folded = content.to_lowercase();
    let tokens = tokenize(&folded);
    let doc_len = tokens.len() as f64;

    let mut term_freq: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        *term_freq.entry(token.as_str()).or_insert(0) += 1;
    }

    let length_norm = 1.0 - B + B * doc_len / AVG_DOC_LEN;

    query_terms
        .iter()
        .map(|term| {
            let tf = match term_freq.get(term.as_str()) {
                Some(&count) => count as f64,
                None if !term.is_empty() && folded.contains(term.as_str()) => 1.0,
                None => 0.0,
            };
            if tf == 0.0 {
                0.0
            } else {
                tf * (K1 + 1.0) / (tf + K1 * length_norm)
            }
        })
        .sum()
}
