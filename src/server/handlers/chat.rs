use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::llm::ChatMessage;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub role: Role,
    pub content: String,
}

impl From<IncomingMessage> for ChatMessage {
    fn from(message: IncomingMessage) -> Self {
        ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<IncomingMessage>,
}

/// Answers the last user message with the query engine. Earlier turns are
/// accepted but do not reach the engine.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<String, ApiError> {
    let mut messages = body.messages;
    let Some(last) = messages.pop() else {
        return Err(ApiError::BadRequest("No messages provided".to_string()));
    };
    if last.role != Role::User {
        return Err(ApiError::BadRequest(
            "Last message must be from user".to_string(),
        ));
    }

    let history: Vec<ChatMessage> = messages.into_iter().map(ChatMessage::from).collect();
    if !history.is_empty() {
        tracing::debug!("Ignoring {} earlier messages", history.len());
    }

    let answer = state
        .query_engine
        .query(&last.content)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    tracing::debug!(
        "Answered with {} source nodes",
        answer.source_nodes.len()
    );
    Ok(answer.response)
}
