//! Search modes, hits and their presentation forms.

use serde::{Deserialize, Serialize};

use kb_document_store::{Document, DocumentId, DocumentMetadata};

/// Placeholder for empty metadata fields in knowledge results.
const UNKNOWN: &str = "Unknown";

/// Header of a rendered conversation context.
const CONTEXT_HEADER: &str = "Here is some information that might help answer the question:\n\n";

/// How a query is matched against the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Nearest neighbours of the query embedding.
    #[default]
    Semantic,
    /// Keyword overlap.
    Lexical,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub text: String,
    pub metadata: DocumentMetadata,

    /// Distance to the query; smaller is better.
    ///
    /// Squared L2 for semantic search, `1 - overlap` for lexical search.
    pub score: f32,
}

impl SearchHit {
    pub(crate) fn new(document: &Document, score: f32) -> Self {
        Self {
            id: document.id.clone(),
            text: document.text.clone(),
            metadata: document.metadata.clone(),
            score,
        }
    }
}

/// A search hit flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeResult {
    pub id: DocumentId,
    pub text: String,
    pub title: String,
    pub source: String,
    pub category: String,

    /// `1 - distance / scale`. May be negative for distant matches.
    pub relevance_score: f32,
}

impl KnowledgeResult {
    /// Flatten `hit`, mapping its distance onto a relevance with `scale`.
    pub fn from_hit(hit: SearchHit, scale: f32) -> Self {
        let or_unknown = |value: String| {
            if value.is_empty() {
                UNKNOWN.to_string()
            } else {
                value
            }
        };

        Self {
            id: hit.id,
            text: hit.text,
            title: or_unknown(hit.metadata.title),
            source: or_unknown(hit.metadata.source),
            category: or_unknown(hit.metadata.category),
            relevance_score: relevance(hit.score, scale),
        }
    }
}

/// Map a distance onto a relevance score.
pub fn relevance(distance: f32, scale: f32) -> f32 {
    1.0 - distance / scale
}

/// Render hits as a context block for a chat prompt.
///
/// Returns an empty string when there are no hits.
pub fn render_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut context = String::from(CONTEXT_HEADER);
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("Document {}:\n{}\n\n", i + 1, hit.text));
    }
    context
}
