use std::sync::Arc;

use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::nodes::DocumentTree;
use crate::rag::{
    open_index, ModelSettings, QueryEngine, QueryEngineTool, RagStore, SubQuestionQueryEngine,
    VectorQueryEngine,
};

pub mod error;

use error::InitializationError;

/// Shared state for the HTTP handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tree: Arc<DocumentTree>,
    pub query_engine: Arc<dyn QueryEngine>,
}

impl AppState {
    /// Loads configuration, reopens the generated index and wires the
    /// query engine selected by `index.use_sub_questions`.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone()).load_config()?;

        let provider: Arc<dyn LlmProvider> = Arc::new(
            OpenAiProvider::from_config(&config.llm)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let (tree, store) = open_index(&paths)
            .await
            .map_err(|e| InitializationError::Index(e.into()))?;

        match store.embedding_model().await {
            Ok(Some(model)) if model != config.llm.embedding_model => tracing::warn!(
                "Index was built with embedding model {} but {} is configured; regenerate the index",
                model,
                config.llm.embedding_model
            ),
            Ok(_) => {}
            Err(e) => return Err(InitializationError::Index(e.into())),
        }

        let query_engine = build_query_engine(&config, provider, Arc::new(store))
            .map_err(|e| InitializationError::Llm(e.into()))?;

        Ok(Arc::new(AppState {
            config: Arc::new(config),
            tree: Arc::new(tree),
            query_engine,
        }))
    }

    pub fn with_engine(config: AppConfig, query_engine: Arc<dyn QueryEngine>) -> Arc<Self> {
        Arc::new(AppState {
            config: Arc::new(config),
            tree: Arc::new(DocumentTree::default()),
            query_engine,
        })
    }
}

pub fn build_query_engine(
    config: &AppConfig,
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn RagStore>,
) -> Result<Arc<dyn QueryEngine>, crate::core::errors::ApiError> {
    let models = ModelSettings::from_config(&config.llm);
    let vector_engine: Arc<dyn QueryEngine> = Arc::new(VectorQueryEngine::new(
        provider.clone(),
        store,
        models.clone(),
        config.index.similarity_top_k,
    ));

    if !config.index.use_sub_questions {
        tracing::info!("Using vector query engine with {}", models.chat_model);
        return Ok(vector_engine);
    }

    let tool = QueryEngineTool {
        name: config.index.tool_name.clone(),
        description: config.index.tool_description.clone(),
        engine: vector_engine,
    };
    tracing::info!(
        "Using sub-question query engine with tool '{}' and {}",
        tool.name,
        models.chat_model
    );
    Ok(Arc::new(SubQuestionQueryEngine::new(
        provider,
        vec![tool],
        models,
    )?))
}
