//! Crawls the archive (or reuses the cache) and prints the first top-level
//! item with its nested children.

use std::sync::Arc;

use anyhow::Context;

use catechism_rag::core::config::{AppPaths, ConfigService};
use catechism_rag::core::logging::{self, LogTarget};
use catechism_rag::crawler;
use catechism_rag::toc::item_to_keyed_json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths, LogTarget::Scrape);

    let config = ConfigService::new(paths.clone())
        .load_config()
        .context("Failed to load configuration")?;

    let cache = crawler::cached_items(&paths, &config.scraper)
        .await
        .context("Failed to load or scrape the table of contents")?;

    let Some(first) = cache.items.first() else {
        tracing::warn!("No items found at {}", cache.base_url);
        return Ok(());
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&item_to_keyed_json(first, 0))?
    );
    Ok(())
}
