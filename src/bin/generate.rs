//! Builds `nodes.json` and the vector index from the cached (or freshly
//! crawled) table of contents.

use std::sync::Arc;

use anyhow::Context;

use catechism_rag::core::config::{AppPaths, ConfigService};
use catechism_rag::core::logging::{self, LogTarget};
use catechism_rag::crawler;
use catechism_rag::llm::OpenAiProvider;
use catechism_rag::rag::{IndexBuilder, SqliteRagStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths, LogTarget::Generate);

    let config = ConfigService::new(paths.clone())
        .load_config()
        .context("Failed to load configuration")?;

    let cache = crawler::cached_items(&paths, &config.scraper)
        .await
        .context("Failed to load or scrape the table of contents")?;

    let provider = OpenAiProvider::from_config(&config.llm)
        .context("Failed to initialize LLM provider")?;
    let store = SqliteRagStore::new(&paths)
        .await
        .context("Failed to open index database")?;

    let report = IndexBuilder::new(
        &provider,
        &store,
        &config.llm.embedding_model,
        config.index.embed_batch_size,
    )
    .build(
        &cache.items,
        config.index.summarization_level,
        &paths.nodes_path(),
    )
    .await
    .context("Failed to build index")?;

    tracing::info!(
        "Stored {} nodes ({} embedded) in {}",
        report.nodes,
        report.embedded,
        paths.storage_dir.display()
    );
    Ok(())
}
