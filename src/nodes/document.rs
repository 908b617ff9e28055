use std::fmt;

use serde::{Deserialize, Serialize};

use crate::toc::Level;

/// Stable index of a node inside its [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{:05}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub title: String,
    pub link: Option<String>,
    pub level: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationships {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub previous: Option<NodeId>,
    pub next: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: NodeId,
    pub text: String,
    pub metadata: NodeMetadata,
    pub relationships: Relationships,
}

/// Arena of emitted nodes in traversal order; `nodes[i].id == NodeId(i)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTree {
    pub summarization_level: Option<Level>,
    nodes: Vec<DocumentNode>,
}

impl DocumentTree {
    pub(crate) fn new(summarization_level: Level) -> Self {
        Self {
            summarization_level: Some(summarization_level),
            nodes: Vec::new(),
        }
    }

    pub(crate) fn push(
        &mut self,
        text: String,
        metadata: NodeMetadata,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DocumentNode {
            id,
            text,
            metadata,
            relationships: Relationships {
                parent,
                ..Relationships::default()
            },
        });
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent_id.0) {
                parent_node.relationships.children.push(id);
            }
        }
        id
    }

    /// Threads `previous`/`next` through every node in arena order.
    pub(crate) fn link_reading_order(&mut self) {
        let len = self.nodes.len();
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.relationships.previous = index.checked_sub(1).map(NodeId);
            node.relationships.next = (index + 1 < len).then_some(NodeId(index + 1));
        }
    }

    pub fn nodes(&self) -> &[DocumentNode] {
        &self.nodes
    }

    pub fn get(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<&DocumentNode> {
        self.nodes
            .iter()
            .find(|node| node.relationships.previous.is_none())
    }

    pub fn roots(&self) -> impl Iterator<Item = &DocumentNode> {
        self.nodes
            .iter()
            .filter(|node| node.relationships.parent.is_none())
    }

    /// Walks the `next` chain from [`first`](Self::first).
    pub fn iter_reading_order(&self) -> ReadingOrder<'_> {
        ReadingOrder {
            tree: self,
            current: self.first().map(|node| node.id),
            remaining: self.nodes.len(),
        }
    }
}

pub struct ReadingOrder<'a> {
    tree: &'a DocumentTree,
    current: Option<NodeId>,
    remaining: usize,
}

impl<'a> Iterator for ReadingOrder<'a> {
    type Item = &'a DocumentNode;

    fn next(&mut self) -> Option<Self::Item> {
        // The bound stops a malformed chain from cycling forever.
        if self.remaining == 0 {
            return None;
        }
        let node = self.tree.get(self.current?)?;
        self.current = node.relationships.next;
        self.remaining -= 1;
        Some(node)
    }
}
