//! Retrieval over the generated index.
//!
//! - `store` / `sqlite`: the vector index and its SQLite backend
//! - `indexer`: builds `nodes.json` and the index from scraped items
//! - `engine` / `sub_question`: query engines answering over the index

pub mod engine;
pub mod indexer;
pub mod sqlite;
pub mod store;
pub mod sub_question;

pub use engine::{ModelSettings, QueryEngine, QueryResponse, SourceNode, VectorQueryEngine};
pub use indexer::{load_tree, open_index, save_tree, IndexBuilder, IndexReport};
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, RagStore, StoredChunk};
pub use sub_question::{QueryEngineTool, SubQuestion, SubQuestionQueryEngine};
