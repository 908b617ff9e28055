//! Builds and reopens the persisted index: `nodes.json` plus the vector
//! store under the storage directory.

use std::fs;
use std::path::Path;

use super::sqlite::SqliteRagStore;
use super::store::{RagStore, StoredChunk};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;
use crate::nodes::{build_document_tree, DocumentNode, DocumentTree};
use crate::toc::{Level, TocItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub nodes: usize,
    pub embedded: usize,
}

pub struct IndexBuilder<'a> {
    provider: &'a dyn LlmProvider,
    store: &'a dyn RagStore,
    embedding_model: &'a str,
    batch_size: usize,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        provider: &'a dyn LlmProvider,
        store: &'a dyn RagStore,
        embedding_model: &'a str,
        batch_size: usize,
    ) -> Self {
        Self {
            provider,
            store,
            embedding_model,
            batch_size: batch_size.max(1),
        }
    }

    /// Builds the node tree, writes it to `nodes_path` and replaces the
    /// store's contents with embeddings of every non-empty node.
    pub async fn build(
        &self,
        items: &[TocItem],
        summarization_level: Level,
        nodes_path: &Path,
    ) -> Result<IndexReport, ApiError> {
        let tree = build_document_tree(items, summarization_level);
        save_tree(&tree, nodes_path)?;

        self.store.reindex_with_model(self.embedding_model).await?;

        let embeddable: Vec<&DocumentNode> = tree
            .nodes()
            .iter()
            .filter(|node| !node.text.trim().is_empty())
            .collect();
        let skipped = tree.len() - embeddable.len();
        if skipped > 0 {
            tracing::debug!("Skipping {} nodes without text", skipped);
        }

        let total_batches = embeddable.len().div_ceil(self.batch_size);
        for (batch_index, batch) in embeddable.chunks(self.batch_size).enumerate() {
            let inputs: Vec<String> = batch.iter().map(|node| node.text.clone()).collect();
            let embeddings = self.provider.embed(&inputs, self.embedding_model).await?;
            if embeddings.len() != batch.len() {
                return Err(ApiError::Internal(format!(
                    "Embedding provider returned {} vectors for {} inputs",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let rows = batch
                .iter()
                .map(|node| StoredChunk::from_node(node))
                .zip(embeddings)
                .collect();
            self.store.insert_batch(rows).await?;

            tracing::info!("Embedded batch {}/{}", batch_index + 1, total_batches);
        }

        self.store.mark_complete().await?;

        let report = IndexReport {
            nodes: tree.len(),
            embedded: embeddable.len(),
        };
        tracing::info!(
            "Index built: {} nodes, {} embedded with {}",
            report.nodes,
            report.embedded,
            self.embedding_model
        );
        Ok(report)
    }
}

pub fn save_tree(tree: &DocumentTree, path: &Path) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ApiError::internal)?;
    }
    let json = serde_json::to_string_pretty(tree).map_err(ApiError::internal)?;
    fs::write(path, json).map_err(ApiError::internal)
}

pub fn load_tree(path: &Path) -> Result<DocumentTree, ApiError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        ApiError::ServiceUnavailable(format!("Failed to read {}: {}", path.display(), err))
    })?;
    serde_json::from_str(&raw).map_err(|err| {
        ApiError::Internal(format!("Failed to parse {}: {}", path.display(), err))
    })
}

/// Reopens a previously generated index.
pub async fn open_index(paths: &AppPaths) -> Result<(DocumentTree, SqliteRagStore), ApiError> {
    if !paths.storage_dir.is_dir() || !paths.index_db_path().is_file() {
        return Err(ApiError::ServiceUnavailable(format!(
            "No index found in {}; run the `generate` binary first",
            paths.storage_dir.display()
        )));
    }

    let tree = load_tree(&paths.nodes_path())?;
    let store = SqliteRagStore::open_existing(paths.index_db_path()).await?;
    if !store.is_complete().await? {
        return Err(ApiError::ServiceUnavailable(format!(
            "Index in {} is incomplete (an earlier build did not finish); rerun the `generate` binary",
            paths.storage_dir.display()
        )));
    }
    tracing::info!(
        "Loaded index from {} ({} nodes, {} embedded)",
        paths.storage_dir.display(),
        tree.len(),
        store.count().await?
    );
    Ok((tree, store))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::llm::ChatRequest;

    /// Embeds each text as `[len, batch_number]` and records batch sizes.
    /// With `fail_at` set, that batch number (1-based) errors instead.
    #[derive(Default)]
    struct CountingEmbedder {
        batches: Mutex<Vec<usize>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl LlmProvider for CountingEmbedder {
        fn name(&self) -> &str {
            "counting"
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            Ok(String::new())
        }

        async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
            let mut batches = self.batches.lock().unwrap();
            batches.push(inputs.len());
            if self.fail_at == Some(batches.len()) {
                return Err(ApiError::ServiceUnavailable("embedding backend down".to_string()));
            }
            let batch = batches.len() as f32;
            Ok(inputs.iter().map(|text| vec![text.len() as f32, batch]).collect())
        }
    }

    fn items() -> Vec<TocItem> {
        vec![
            TocItem::new("Prologue").with_link("PROLOGUE.HTM", "Father"),
            TocItem::new("Part one").with_children(vec![
                TocItem::new("Section one").with_link("S1.HTM", "I believe"),
                TocItem::new("Section two").with_link("S2.HTM", "We believe"),
                TocItem::new("Section three").with_link("S3.HTM", "Creeds"),
            ]),
        ]
    }

    fn paths(dir: &TempDir) -> AppPaths {
        AppPaths::with_data_dir(dir.path().to_path_buf(), dir.path().join("data"))
    }

    #[tokio::test]
    async fn build_embeds_non_empty_nodes_in_batches() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        let store = SqliteRagStore::with_path(dir.path().join("index.db")).await.unwrap();
        let embedder = CountingEmbedder::default();

        let report = IndexBuilder::new(&embedder, &store, "embed-test", 2)
            .build(&items(), Level::Section, &paths.nodes_path())
            .await
            .unwrap();

        // "Part one" has no text of its own.
        assert_eq!(report, IndexReport { nodes: 5, embedded: 4 });
        assert_eq!(*embedder.batches.lock().unwrap(), vec![2, 2]);
        assert_eq!(store.count().await.unwrap(), 4);
        assert_eq!(store.embedding_model().await.unwrap().as_deref(), Some("embed-test"));

        let chunk = store.get_chunk("node-00002").await.unwrap().unwrap();
        assert_eq!(chunk.title, "Section one");
        assert_eq!(chunk.level, "section");
        assert_eq!(chunk.metadata.unwrap()["parent"], "node-00001");
        assert!(store.get_chunk("node-00001").await.unwrap().is_none());

        let tree = load_tree(&paths.nodes_path()).unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.summarization_level, Some(Level::Section));
    }

    #[tokio::test]
    async fn rebuilding_replaces_previous_chunks() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        let store = SqliteRagStore::with_path(dir.path().join("index.db")).await.unwrap();
        let embedder = CountingEmbedder::default();
        let builder = IndexBuilder::new(&embedder, &store, "embed-test", 32);

        builder.build(&items(), Level::Section, &paths.nodes_path()).await.unwrap();
        let report = builder
            .build(&items(), Level::Part, &paths.nodes_path())
            .await
            .unwrap();

        assert_eq!(report, IndexReport { nodes: 2, embedded: 2 });
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn open_index_requires_generated_storage() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);

        let err = open_index(&paths).await.err().unwrap();
        assert!(err.to_string().contains("run the `generate` binary first"));

        let store = SqliteRagStore::with_path(paths.index_db_path()).await.unwrap();
        IndexBuilder::new(&CountingEmbedder::default(), &store, "embed-test", 8)
            .build(&items(), Level::Chapter, &paths.nodes_path())
            .await
            .unwrap();

        let (tree, reopened) = open_index(&paths).await.unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(reopened.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn interrupted_build_leaves_an_index_that_will_not_open() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        let store = SqliteRagStore::with_path(paths.index_db_path()).await.unwrap();
        IndexBuilder::new(&CountingEmbedder::default(), &store, "embed-test", 2)
            .build(&items(), Level::Section, &paths.nodes_path())
            .await
            .unwrap();
        assert!(open_index(&paths).await.is_ok());

        let failing = CountingEmbedder {
            fail_at: Some(2),
            ..Default::default()
        };
        let err = IndexBuilder::new(&failing, &store, "embed-test", 2)
            .build(&items(), Level::Section, &paths.nodes_path())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));

        // The first batch landed before the failure.
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(!store.is_complete().await.unwrap());

        let err = open_index(&paths).await.err().unwrap();
        assert!(err.to_string().contains("incomplete"));
    }
}
