use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmConfig;
use crate::core::errors::ApiError;

/// Client for any server speaking the OpenAI REST API.
///
/// The base URL may be given with or without the trailing `/v1` the OpenAI
/// SDKs expect (`https://api.openai.com/v1`); both reach the same endpoints.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;
        let base_url = base_url.trim_end_matches('/');
        let base_url = base_url.strip_suffix("/v1").unwrap_or(base_url);
        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        }

        let res = self
            .post("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Chat completion error ({}): {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;

        match payload["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(content.to_string()),
            None => Err(ApiError::Internal(format!(
                "Chat completion response has no content: {}",
                payload
            ))),
        }
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Embedding error ({}): {}", status, text)));
        }

        let mut payload: EmbeddingResponse = res.json().await.map_err(ApiError::internal)?;
        payload.data.sort_by_key(|item| item.index);

        if payload.data.len() != inputs.len() {
            return Err(ApiError::Internal(format!(
                "Embedding count mismatch: sent {}, received {}",
                inputs.len(),
                payload.data.len()
            )));
        }

        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    use super::*;
    use crate::llm::types::ChatMessage;

    async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
        }
        let question = body["messages"][0]["content"].as_str().unwrap_or_default();
        let reply = format!("{} says: {}", body["model"].as_str().unwrap_or_default(), question);
        if question == "busy" {
            return (StatusCode::OK, Json(json!({"error": {"message": "overloaded"}})));
        }
        (
            StatusCode::OK,
            Json(json!({"choices": [{"message": {"role": "assistant", "content": reply}}]})),
        )
    }

    async fn embeddings(Json(body): Json<Value>) -> Json<Value> {
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        // Reverse order on purpose; the client must sort by index.
        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(index, input)| {
                let len = input.as_str().unwrap_or_default().len() as f32;
                json!({"index": index, "embedding": [len, 1.0]})
            })
            .collect();
        Json(json!({"data": data}))
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .route("/v1/embeddings", post(embeddings));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn chat_sends_model_and_key() {
        let base = serve().await;
        let provider =
            OpenAiProvider::new(base, Some("sk-test".to_string()), Duration::from_secs(5)).unwrap();

        let answer = provider
            .chat(ChatRequest::new(vec![ChatMessage::user("hello")]), "gpt-test")
            .await
            .unwrap();

        assert_eq!(answer, "gpt-test says: hello");
    }

    #[tokio::test]
    async fn base_url_may_include_the_version_segment() {
        let base = serve().await;
        for base_url in [format!("{}v1", base), format!("{}v1/", base)] {
            let provider =
                OpenAiProvider::new(base_url, Some("sk-test".to_string()), Duration::from_secs(5))
                    .unwrap();

            let answer = provider
                .chat(ChatRequest::new(vec![ChatMessage::user("hello")]), "gpt-test")
                .await
                .unwrap();
            assert_eq!(answer, "gpt-test says: hello");

            let vectors = provider.embed(&["ab".to_string()], "embed-test").await.unwrap();
            assert_eq!(vectors, vec![vec![2.0, 1.0]]);
        }
    }

    #[tokio::test]
    async fn completion_without_content_is_an_error() {
        let base = serve().await;
        let provider =
            OpenAiProvider::new(base, Some("sk-test".to_string()), Duration::from_secs(5)).unwrap();

        let err = provider
            .chat(ChatRequest::new(vec![ChatMessage::user("busy")]), "gpt-test")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Internal(_)));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn chat_error_status_is_reported() {
        let base = serve().await;
        let provider = OpenAiProvider::new(base, None, Duration::from_secs(5)).unwrap();

        let err = provider
            .chat(ChatRequest::new(vec![ChatMessage::user("hello")]), "gpt-test")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn embeddings_come_back_in_input_order() {
        let base = serve().await;
        let provider = OpenAiProvider::new(base, None, Duration::from_secs(5)).unwrap();

        let inputs = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];
        let vectors = provider.embed(&inputs, "embed-test").await.unwrap();

        assert_eq!(vectors, vec![vec![1.0, 1.0], vec![3.0, 1.0], vec![2.0, 1.0]]);
    }
}
