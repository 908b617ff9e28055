//! Indexable document nodes derived from the table of contents.

mod builder;
mod document;

pub use builder::{build_document_tree, concatenate_subtree};
pub use document::{DocumentNode, DocumentTree, NodeId, NodeMetadata, ReadingOrder, Relationships};
