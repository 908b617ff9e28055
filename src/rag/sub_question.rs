//! Sub-question decomposition: split a question into tool-routed
//! sub-questions, answer them concurrently, then synthesize.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures_util::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::engine::{ModelSettings, QueryEngine, QueryResponse, SourceNode};
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, LlmProvider};

/// Start of a JSON array of objects, the shape of a decomposition.
static ARRAY_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*\{").expect("static pattern"));

const DECOMPOSE_SYSTEM_PROMPT: &str = "Given a user question and a list of tools, output a list of \
relevant sub-questions that when composed can help answer the full user question.\n\
Answer with a JSON array only, each element shaped like \
{\"sub_question\": \"...\", \"tool_name\": \"...\"}.\n\
Use only the tool names listed.";

/// A named engine the decomposer may route sub-questions to.
#[derive(Clone)]
pub struct QueryEngineTool {
    pub name: String,
    pub description: String,
    pub engine: Arc<dyn QueryEngine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub sub_question: String,
    pub tool_name: String,
}

pub struct SubQuestionQueryEngine {
    provider: Arc<dyn LlmProvider>,
    tools: Vec<QueryEngineTool>,
    models: ModelSettings,
}

impl SubQuestionQueryEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Vec<QueryEngineTool>,
        models: ModelSettings,
    ) -> Result<Self, ApiError> {
        if tools.is_empty() {
            return Err(ApiError::Internal(
                "Sub-question engine needs at least one tool".to_string(),
            ));
        }
        Ok(Self {
            provider,
            tools,
            models,
        })
    }

    fn tool(&self, name: &str) -> &QueryEngineTool {
        match self.tools.iter().find(|tool| tool.name == name) {
            Some(tool) => tool,
            None => {
                tracing::warn!("Unknown tool '{}', routing to '{}'", name, self.tools[0].name);
                &self.tools[0]
            }
        }
    }

    async fn generate_sub_questions(&self, question: &str) -> Result<Vec<SubQuestion>, ApiError> {
        let tools: Map<String, Value> = self
            .tools
            .iter()
            .map(|tool| (tool.name.clone(), json!({ "description": tool.description })))
            .collect();

        let messages = vec![
            ChatMessage::system(DECOMPOSE_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Tools:\n{}\n\nUser question:\n{}",
                Value::Object(tools),
                question
            )),
        ];

        let raw = self
            .provider
            .chat(self.models.request(messages), &self.models.chat_model)
            .await?;

        let mut sub_questions = parse_sub_questions(&raw);
        if sub_questions.is_empty() {
            tracing::warn!("Could not decompose question, answering it directly");
            sub_questions.push(SubQuestion {
                sub_question: question.to_string(),
                tool_name: self.tools[0].name.clone(),
            });
        }
        Ok(sub_questions)
    }
}

/// Pulls the JSON array out of a model reply, tolerating prose, code fences
/// or bracketed citations around it. Each candidate array start is parsed as
/// a stream so trailing text is ignored. Returns nothing when no usable
/// array is found.
pub fn parse_sub_questions(raw: &str) -> Vec<SubQuestion> {
    for start in ARRAY_START_RE.find_iter(raw).map(|found| found.start()) {
        let mut stream =
            serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Vec<SubQuestion>>();
        match stream.next() {
            Some(Ok(parsed)) => {
                let parsed: Vec<SubQuestion> = parsed
                    .into_iter()
                    .filter(|sub| !sub.sub_question.trim().is_empty())
                    .collect();
                if !parsed.is_empty() {
                    return parsed;
                }
            }
            Some(Err(err)) => {
                tracing::debug!("Sub-question output is not valid JSON at {}: {}", start, err);
            }
            None => {}
        }
    }
    Vec::new()
}

#[async_trait]
impl QueryEngine for SubQuestionQueryEngine {
    async fn query(&self, question: &str) -> Result<QueryResponse, ApiError> {
        let sub_questions = self.generate_sub_questions(question).await?;
        tracing::info!("Generated {} sub questions", sub_questions.len());

        let answers = join_all(sub_questions.iter().map(|sub| async move {
            tracing::info!("[{}] Q: {}", sub.tool_name, sub.sub_question);
            let result = self.tool(&sub.tool_name).engine.query(&sub.sub_question).await;
            (sub, result)
        }))
        .await;

        let mut pairs = Vec::new();
        let mut source_nodes: Vec<SourceNode> = Vec::new();
        let mut first_error = None;
        for (sub, result) in answers {
            match result {
                Ok(answer) => {
                    tracing::info!("[{}] A: {}", sub.tool_name, answer.response);
                    pairs.push(format!(
                        "Sub question: {}\nResponse: {}",
                        sub.sub_question, answer.response
                    ));
                    source_nodes.extend(answer.source_nodes);
                }
                Err(err) => {
                    tracing::warn!("Sub question '{}' failed: {}", sub.sub_question, err);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        if pairs.is_empty() {
            return Err(first_error
                .unwrap_or_else(|| ApiError::Internal("No sub question was answered".to_string())));
        }

        let messages = vec![
            ChatMessage::system(
                "Answer the query using only the answered sub questions below, not prior knowledge.",
            ),
            ChatMessage::user(format!(
                "Context information is below.\n\
---------------------\n\
{}\n\
---------------------\n\
Query: {}\n\
Answer: ",
                pairs.join("\n\n"),
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
