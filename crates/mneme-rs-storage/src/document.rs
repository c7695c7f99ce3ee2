//! Stored documents and search scoring helpers.

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value stored under a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// JSON payload.
    pub body: Value,
    /// Searchable text, when the document takes part in retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Embedding used by vector-capable adapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Wrap a JSON payload.
    pub fn new(body: Value) -> Self {
        Self {
            body,
            text: None,
            embedding: None,
        }
    }

    /// Serialize a value into a document body.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, StorageError> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Deserialize the document body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Attach searchable text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Retrieval request passed to [`crate::BackendAdapter::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Raw query text.
    pub text: String,
    /// Query embedding; ignored by adapters without vector support.
    pub embedding: Option<Vec<f32>>,
}

impl SearchQuery {
    /// Text-only query.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            embedding: None,
        }
    }

    /// Query carrying an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub document: Document,
    pub score: f32,
}

/// Score text relevance in `[0, 1]`.
///
/// A case-insensitive substring match scores 1.0; otherwise the score is the
/// share of query terms found in the text, scaled below an exact match.
pub fn text_match_score(text: &str, query: &str) -> f32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    if text.contains(&query) {
        return 1.0;
    }
    let terms = query.split_whitespace().collect::<Vec<_>>();
    let matched = terms.iter().filter(|term| text.contains(*term)).count();
    if matched == 0 {
        return 0.0;
    }
    0.9 * matched as f32 / terms.len() as f32
}

/// Cosine similarity of two vectors; 0.0 when dimensions differ or a vector is zero.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut left_norm = 0.0f32;
    let mut right_norm = 0.0f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}

/// Sort hits by descending score (key order breaks ties) and keep `top_k`.
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::{Document, cosine_similarity, text_match_score};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn text_match_prefers_exact_substrings() {
        assert_eq!(text_match_score("We shipped Project Alpha today", "project alpha"), 1.0);
        let partial = text_match_score("alpha release notes", "project alpha");
        assert!(partial > 0.0 && partial < 1.0);
        assert_eq!(text_match_score("unrelated", "project alpha"), 0.0);
        assert_eq!(text_match_score("anything", "   "), 0.0);
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn document_encode_decode() {
        let document = Document::encode(&json!({ "a": 1 }))
            .expect("encode")
            .with_text("a");
        let decoded: serde_json::Value = document.decode().expect("decode");
        assert_eq!(decoded, json!({ "a": 1 }));
        assert_eq!(document.text.as_deref(), Some("a"));
    }
}
