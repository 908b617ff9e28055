//! RagStore trait: abstract interface for the vector index.
//!
//! The index holds one chunk per embedded [`DocumentNode`]; the shipped
//! implementation is [`SqliteRagStore`](super::SqliteRagStore).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::nodes::DocumentNode;

/// A stored chunk with the node metadata needed to cite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Node identifier, e.g. `node-00042`.
    pub chunk_id: String,
    pub content: String,
    pub title: String,
    pub link: Option<String>,
    /// Level name (`part`, `section`, ...).
    pub level: String,
    /// Relationship ids (parent, children, previous, next).
    pub metadata: Option<Value>,
}

impl StoredChunk {
    pub fn from_node(node: &DocumentNode) -> Self {
        let rel = &node.relationships;
        let id = |id: Option<crate::nodes::NodeId>| id.map(|id| id.to_string());
        Self {
            chunk_id: node.id.to_string(),
            content: node.text.clone(),
            title: node.metadata.title.clone(),
            link: node.metadata.link.clone(),
            level: node.metadata.level.to_string(),
            metadata: Some(json!({
                "parent": id(rel.parent),
                "children": rel.children.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "previous": id(rel.previous),
                "next": id(rel.next),
            })),
        }
    }
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Similarity score (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Insert multiple chunks in one transaction, replacing existing ids.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Search for chunks similar to the query embedding, best first. A
    /// `limit` of 0 returns nothing.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError>;

    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<StoredChunk>, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;

    /// Embedding model the stored vectors were produced with, if recorded.
    async fn embedding_model(&self) -> Result<Option<String>, ApiError>;

    /// Drop every chunk, clear the completion marker and record the
    /// embedding model for the next build.
    async fn reindex_with_model(&self, embedding_model: &str) -> Result<(), ApiError>;

    /// Record that a build finished; readers refuse an index without it.
    async fn mark_complete(&self) -> Result<(), ApiError>;

    async fn is_complete(&self) -> Result<bool, ApiError>;
}
