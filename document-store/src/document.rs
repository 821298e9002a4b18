//! Knowledge document model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::embedding::parse_embedding;

/// Identifier assigned by whichever backend persisted the document.
pub type DocumentId = String;

/// Descriptive metadata attached to every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    /// Human-readable title.
    pub title: String,

    /// Where the text came from (handbook, upload, ...).
    pub source: String,

    /// Free-form category used for grouping.
    pub category: String,
}

impl DocumentMetadata {
    /// Create metadata from its three fields.
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            category: category.into(),
        }
    }

    /// Parse metadata from a stored value.
    ///
    /// Accepts a JSON object or a string holding one. Each field is read on
    /// its own: a field that is missing or not a string stays empty and the
    /// others are kept.
    fn from_value(value: &Value) -> Self {
        let object = match value {
            Value::String(text) => serde_json::from_str::<Value>(text).ok(),
            other => Some(other.clone()),
        };
        let Some(Value::Object(fields)) = object else {
            return Self::default();
        };

        let field = |name: &str| match fields.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(_) => {
                warn!("Ignoring non-string metadata field {name}");
                String::new()
            }
        };

        Self {
            title: field("title"),
            source: field("source"),
            category: field("category"),
        }
    }
}

/// A document as held in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Backend-assigned identifier.
    pub id: DocumentId,

    /// Full document text.
    pub text: String,

    /// Title, source and category.
    #[serde(default)]
    pub metadata: DocumentMetadata,

    /// Embedding vector, absent when it could not be parsed.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Normalize a raw stored row into a document.
    ///
    /// Rows without an id or text are dropped. The id may be a string or a
    /// number. The embedding goes through [`parse_embedding`]; a failed parse
    /// keeps the document with `embedding = None`.
    pub fn from_row(row: &Value) -> Option<Self> {
        let id = match row.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                warn!("Skipping stored document without an id");
                return None;
            }
        };

        let Some(text) = row.get("text").and_then(Value::as_str) else {
            warn!("Skipping stored document {id}: missing text");
            return None;
        };

        let metadata = row
            .get("metadata")
            .map(DocumentMetadata::from_value)
            .unwrap_or_default();

        let embedding = match row.get("embedding") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let parsed = parse_embedding(raw);
                if parsed.is_none() {
                    warn!("Could not parse embedding for document {id}; excluding it from the vector index");
                }
                parsed
            }
        };

        Some(Self {
            id,
            text: text.to_string(),
            metadata,
            embedding,
        })
    }
}

/// A document that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Full document text.
    pub text: String,

    /// Title, source and category.
    pub metadata: DocumentMetadata,

    /// Embedding produced by the gateway.
    pub embedding: Vec<f32>,
}

impl NewDocument {
    /// Attach the backend-assigned id.
    pub fn with_id(self, id: impl Into<DocumentId>) -> Document {
        Document {
            id: id.into(),
            text: self.text,
            metadata: self.metadata,
            embedding: Some(self.embedding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_row_native_embedding() {
        let row = json!({
            "id": "a1",
            "text": "Annual leave is 25 days.",
            "metadata": {"title": "Leave", "source": "Handbook", "category": "leave"},
            "embedding": [0.1, 0.2]
        });

        let doc = Document::from_row(&row).unwrap();
        assert_eq!(doc.id, "a1");
        assert_eq!(doc.metadata, DocumentMetadata::new("Leave", "Handbook", "leave"));
        assert_eq!(doc.embedding, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_from_row_numeric_id_and_string_metadata() {
        let row = json!({
            "id": 42,
            "text": "Payroll runs monthly.",
            "metadata": "{\"title\": \"Payroll\"}",
            "embedding": "[1.0, 2.0]"
        });

        let doc = Document::from_row(&row).unwrap();
        assert_eq!(doc.id, "42");
        assert_eq!(doc.metadata.title, "Payroll");
        assert_eq!(doc.metadata.source, "");
        assert_eq!(doc.embedding, Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_from_row_unparsable_embedding_is_kept_without_vector() {
        let row = json!({"id": "x", "text": "still searchable", "embedding": "not a vector"});
        let doc = Document::from_row(&row).unwrap();
        assert_eq!(doc.text, "still searchable");
        assert_eq!(doc.embedding, None);
    }

    #[test]
    fn test_metadata_fields_parse_independently() {
        let row = json!({
            "id": "7",
            "text": "Expenses go to HR.",
            "metadata": {"title": 5, "source": "HR", "category": null}
        });

        let doc = Document::from_row(&row).unwrap();
        assert_eq!(doc.metadata, DocumentMetadata::new("", "HR", ""));
    }

    #[test]
    fn test_from_row_requires_id_and_text() {
        assert!(Document::from_row(&json!({"text": "no id"})).is_none());
        assert!(Document::from_row(&json!({"id": "1"})).is_none());
    }
}
