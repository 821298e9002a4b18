//! Keyword overlap scoring.
//!
//! A query is split on whitespace into distinct lowercase terms. A document
//! scores `matched / total`, where only terms longer than two characters can
//! match (as case-insensitive substrings of the text) but every term counts
//! toward the total. Documents scoring zero are excluded.

use std::collections::HashSet;

use ordered_float::OrderedFloat;

/// Minimum term length, in characters, for a term to match.
const MIN_MATCH_CHARS: usize = 3;

/// A document that shares at least one term with the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalMatch {
    /// Position of the document in the ranked collection.
    pub position: usize,

    /// Fraction of query terms found, in `(0, 1]`.
    pub score: f32,
}

impl LexicalMatch {
    /// Distance reported for this match: `1 - score`.
    pub fn distance(&self) -> f32 {
        1.0 - self.score
    }
}

/// Distinct lowercase whitespace-separated terms of `query`.
pub fn query_terms(query: &str) -> HashSet<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Overlap score of `text` against `terms`. Zero when `terms` is empty.
pub fn score(terms: &HashSet<String>, text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let matched = terms
        .iter()
        .filter(|term| term.chars().count() >= MIN_MATCH_CHARS && text.contains(term.as_str()))
        .count();
    matched as f32 / terms.len() as f32
}

/// Rank `texts` against `query`, best first, keeping at most `top_k`.
///
/// Ties keep collection order.
pub fn rank<'a, I>(query: &str, texts: I, top_k: usize) -> Vec<LexicalMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let terms = query_terms(query);
    if terms.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut matches: Vec<LexicalMatch> = texts
        .into_iter()
        .enumerate()
        .filter_map(|(position, text)| {
            let score = score(&terms, text);
            (score > 0.0).then_some(LexicalMatch { position, score })
        })
        .collect();

    matches.sort_by_key(|m| std::cmp::Reverse(OrderedFloat(m.score)));
    matches.truncate(top_k);
    matches
}
