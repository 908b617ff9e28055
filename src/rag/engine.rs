//! Question answering over the vector index.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::store::{ChunkSearchResult, RagStore};
use crate::core::config::LlmConfig;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

/// Returned when retrieval finds nothing to answer from.
pub const EMPTY_RESPONSE: &str = "Empty Response";

const QA_SYSTEM_PROMPT: &str = "You are an expert Q&A system that is trusted around the world.\n\
Always answer the query using the provided context information, and not prior knowledge.\n\
Never directly reference the given context in your answer.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    pub chunk_id: String,
    pub title: String,
    pub link: Option<String>,
    pub text: String,
    pub score: f32,
}

impl From<ChunkSearchResult> for SourceNode {
    fn from(result: ChunkSearchResult) -> Self {
        Self {
            chunk_id: result.chunk.chunk_id,
            title: result.chunk.title,
            link: result.chunk.link,
            text: result.chunk.content,
            score: result.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub source_nodes: Vec<SourceNode>,
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, question: &str) -> Result<QueryResponse, ApiError>;
}

/// Model names and sampling options shared by the engines.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
}

impl ModelSettings {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            chat_model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub(crate) fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let mut request = ChatRequest::new(messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }
}

/// Embeds the question, retrieves the closest chunks and asks the chat
/// model to answer from them.
pub struct VectorQueryEngine {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn RagStore>,
    models: ModelSettings,
    similarity_top_k: usize,
}

impl VectorQueryEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn RagStore>,
        models: ModelSettings,
        similarity_top_k: usize,
    ) -> Self {
        Self {
            provider,
            store,
            models,
            similarity_top_k: similarity_top_k.max(1),
        }
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<SourceNode>, ApiError> {
        let mut embeddings = self
            .provider
            .embed(&[question.to_string()], &self.models.embedding_model)
            .await?;
        let query_embedding = embeddings
            .pop()
            .ok_or_else(|| ApiError::Internal("Embedding provider returned no vector".to_string()))?;

        let results = self
            .store
            .search(&query_embedding, self.similarity_top_k)
            .await?;
        Ok(results.into_iter().map(SourceNode::from).collect())
    }
}

fn format_context(sources: &[SourceNode]) -> String {
    sources
        .iter()
        .map(|source| format!("[{}]\n{}", source.title, source.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl QueryEngine for VectorQueryEngine {
    async fn query(&self, question: &str) -> Result<QueryResponse, ApiError> {
        let source_nodes = self.retrieve(question).await?;
        tracing::debug!(
            "Retrieved {} chunks for query: {}",
            source_nodes.len(),
            question
        );

        if source_nodes.is_empty() {
            return Ok(QueryResponse {
                response: EMPTY_RESPONSE.to_string(),
                source_nodes,
            });
        }

        let messages = vec![
            ChatMessage::system(QA_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Context information is below.\n\
---------------------\n\
{}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {}\n\
Answer: ",
                format_context(&source_nodes),
                question
            )),
        ];

        let answer = self
            .provider
            .chat(self.models.request(messages), &self.models.chat_model)
            .await?;

        Ok(QueryResponse {
            response: answer.trim().to_string(),
            source_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::rag::store::StoredChunk;
    use crate::rag::SqliteRagStore;

    /// Embeds by keyword presence and records every chat prompt.
    #[derive(Default)]
    struct KeywordProvider {
        prompts: Mutex<Vec<String>>,
    }

    fn keyword_vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        ["baptism", "prayer", "creed"]
            .iter()
            .map(|word| if text.contains(word) { 1.0 } else { 0.0 })
            .collect()
    }

    #[async_trait]
    impl LlmProvider for KeywordProvider {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
            let prompt = request
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            Ok(format!(" answer from {model_id} "))
        }

        async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|text| keyword_vector(text)).collect())
        }
    }

    fn models() -> ModelSettings {
        ModelSettings {
            chat_model: "chat-test".to_string(),
            embedding_model: "embed-test".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    fn chunk(id: &str, title: &str, content: &str) -> (StoredChunk, Vec<f32>) {
        let chunk = StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            title: title.to_string(),
            link: None,
            level: "chapter".to_string(),
            metadata: None,
        };
        (chunk, keyword_vector(content))
    }

    async fn seeded_store(dir: &TempDir) -> Arc<SqliteRagStore> {
        let store = SqliteRagStore::with_path(dir.path().join("index.db"))
            .await
            .unwrap();
        store
            .insert_batch(vec![
                chunk("node-00000", "Baptism", "Holy Baptism is the basis of Christian life"),
                chunk("node-00001", "Prayer", "Prayer is the raising of one's mind to God"),
                chunk("node-00002", "Creed", "The Creed summarises the faith"),
            ])
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn answers_from_most_similar_chunks() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(KeywordProvider::default());
        let engine = VectorQueryEngine::new(provider.clone(), seeded_store(&dir).await, models(), 1);

        let response = engine.query("What is baptism?").await.unwrap();

        assert_eq!(response.response, "answer from chat-test");
        assert_eq!(response.source_nodes.len(), 1);
        assert_eq!(response.source_nodes[0].title, "Baptism");

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Holy Baptism is the basis"));
        assert!(prompts[0].contains("Query: What is baptism?"));
        assert!(!prompts[0].contains("raising of one's mind"));
    }

    #[tokio::test]
    async fn empty_index_skips_the_chat_model() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            SqliteRagStore::with_path(dir.path().join("index.db"))
                .await
                .unwrap(),
        );
        let provider = Arc::new(KeywordProvider::default());
        let engine = VectorQueryEngine::new(provider.clone(), store, models(), 3);

        let response = engine.query("What is prayer?").await.unwrap();

        assert_eq!(response.response, EMPTY_RESPONSE);
        assert!(response.source_nodes.is_empty());
        assert!(provider.prompts.lock().unwrap().is_empty());
    }
}
