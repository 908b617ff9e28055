use super::document::{DocumentTree, NodeId, NodeMetadata};
use crate::toc::{Level, TocItem};

const SEGMENT_SEPARATOR: &str = "\n\n";

/// Turns a TOC tree into indexable nodes.
///
/// Items shallower than `summarization_level` become one node each with
/// their own text. Items at `summarization_level` become one node whose text
/// is their own text followed by every descendant's, depth-first; nothing
/// below that level gets a node of its own.
pub fn build_document_tree(items: &[TocItem], summarization_level: Level) -> DocumentTree {
    let mut tree = DocumentTree::new(summarization_level);
    for item in items {
        visit(&mut tree, item, 0, summarization_level, None);
    }
    tree.link_reading_order();

    tracing::info!(
        "Built {} nodes from {} top-level items at the {} level",
        tree.len(),
        items.len(),
        summarization_level
    );
    tree
}

fn visit(
    tree: &mut DocumentTree,
    item: &TocItem,
    depth: usize,
    summarization_level: Level,
    parent: Option<NodeId>,
) {
    let Some(level) = Level::from_depth(depth) else {
        return;
    };
    let metadata = NodeMetadata {
        title: item.name.clone(),
        link: item.link.clone(),
        level,
    };

    if depth < summarization_level.depth() {
        let text = item.text.clone().unwrap_or_default();
        let id = tree.push(text, metadata, parent);
        for child in &item.children {
            visit(tree, child, depth + 1, summarization_level, Some(id));
        }
    } else {
        tree.push(concatenate_subtree(item), metadata, parent);
    }
}

/// Own text plus all descendant texts in depth-first order, empty segments
/// skipped.
pub fn concatenate_subtree(item: &TocItem) -> String {
    let mut segments = Vec::new();
    collect_segments(item, &mut segments);
    segments.join(SEGMENT_SEPARATOR)
}

fn collect_segments<'a>(item: &'a TocItem, segments: &mut Vec<&'a str>) {
    if let Some(text) = item.text.as_deref().filter(|text| !text.is_empty()) {
        segments.push(text);
    }
    for child in &item.children {
        collect_segments(child, segments);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::nodes::DocumentNode;

    fn leaf(name: &str, text: &str) -> TocItem {
        TocItem::new(name).with_link(format!("{}.HTM", name), text)
    }

    /// part > section > chapter > article > paragraph, with gaps.
    fn fixture() -> Vec<TocItem> {
        vec![
            leaf("prologue", "Father, this is eternal life"),
            leaf("part1", "The profession of faith").with_children(vec![
                leaf("s1", "I believe").with_children(vec![
                    leaf("c1", "Man's capacity for God").with_children(vec![
                        leaf("a1", "The desire for God").with_children(vec![
                            leaf("p1", "written in the human heart"),
                            TocItem::new("p2-no-link"),
                            leaf("p3", ""),
                        ]),
                        leaf("a2", "Ways of coming to know God"),
                    ]),
                    TocItem::new("c2-no-link").with_children(vec![leaf("a3", "God comes to meet man")]),
                ]),
                leaf("s2", "The Christian creeds"),
            ]),
        ]
    }

    fn titles(nodes: &[DocumentNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.metadata.title.as_str()).collect()
    }

    fn count_at_or_above(items: &[TocItem], depth: usize, level: Level) -> usize {
        if depth > level.depth() {
            return 0;
        }
        items
            .iter()
            .map(|item| 1 + count_at_or_above(&item.children, depth + 1, level))
            .sum()
    }

    #[test]
    fn emits_one_node_per_item_at_or_above_level() {
        let items = fixture();
        for level in [Level::Part, Level::Section, Level::Chapter, Level::Article] {
            let tree = build_document_tree(&items, level);
            assert_eq!(tree.len(), count_at_or_above(&items, 0, level), "{level}");
            assert!(tree.nodes().iter().all(|n| n.metadata.level <= level));
        }
    }

    #[test]
    fn chapter_level_folds_descendants() {
        let tree = build_document_tree(&fixture(), Level::Chapter);

        assert_eq!(
            titles(tree.nodes()),
            vec!["prologue", "part1", "s1", "c1", "c2-no-link", "s2"]
        );
        let chapter = &tree.nodes()[3];
        assert_eq!(chapter.metadata.level, Level::Chapter);
        assert_eq!(
            chapter.text,
            "Man's capacity for God\n\nThe desire for God\n\nwritten in the human heart\n\nWays of coming to know God"
        );
        assert_eq!(tree.nodes()[4].text, "God comes to meet man");
        assert_eq!(tree.nodes()[1].text, "The profession of faith");
    }

    #[test]
    fn concatenation_matches_recursive_definition() {
        fn expected(item: &TocItem) -> String {
            let mut parts: Vec<String> = Vec::new();
            if let Some(text) = item.text.as_ref().filter(|t| !t.is_empty()) {
                parts.push(text.clone());
            }
            for child in &item.children {
                let sub = expected(child);
                if !sub.is_empty() {
                    parts.push(sub);
                }
            }
            parts.join("\n\n")
        }

        let items = fixture();
        for item in [&items[1], &items[1].children[0], &items[1].children[0].children[0]] {
            assert_eq!(concatenate_subtree(item), expected(item));
        }
    }

    #[test]
    fn reading_order_is_a_single_chain() {
        let tree = build_document_tree(&fixture(), Level::Article);

        let heads: Vec<_> = tree
            .nodes()
            .iter()
            .filter(|n| n.relationships.previous.is_none())
            .collect();
        let tails: Vec<_> = tree
            .nodes()
            .iter()
            .filter(|n| n.relationships.next.is_none())
            .collect();
        assert_eq!(heads.len(), 1);
        assert_eq!(tails.len(), 1);

        let walked: Vec<NodeId> = tree.iter_reading_order().map(|n| n.id).collect();
        assert_eq!(walked.len(), tree.len());
        assert_eq!(walked.iter().collect::<HashSet<_>>().len(), tree.len());
        assert_eq!(walked.first(), Some(&heads[0].id));
        assert_eq!(walked.last(), Some(&tails[0].id));
    }

    #[test]
    fn parent_and_child_links_agree() {
        let tree = build_document_tree(&fixture(), Level::Article);

        for node in tree.nodes() {
            if let Some(parent_id) = node.relationships.parent {
                let parent = tree.get(parent_id).unwrap();
                let occurrences = parent
                    .relationships
                    .children
                    .iter()
                    .filter(|child| **child == node.id)
                    .count();
                assert_eq!(occurrences, 1);
            }
            for child in &node.relationships.children {
                assert_eq!(tree.get(*child).unwrap().relationships.parent, Some(node.id));
            }
        }
        assert_eq!(
            titles(&tree.roots().cloned().collect::<Vec<_>>()),
            vec!["prologue", "part1"]
        );
    }

    #[test]
    fn part_level_folds_everything_into_top_level_nodes() {
        let items = fixture();
        let tree = build_document_tree(&items, Level::Part);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.nodes()[1].text, concatenate_subtree(&items[1]));
        assert!(tree.nodes().iter().all(|n| n.relationships.children.is_empty()));
    }

    #[test]
    fn empty_input_builds_empty_tree() {
        let tree = build_document_tree(&[], Level::Chapter);
        assert!(tree.is_empty());
        assert!(tree.first().is_none());
        assert_eq!(tree.iter_reading_order().count(), 0);
    }

    #[test]
    fn single_node_has_no_neighbours() {
        let tree = build_document_tree(&[leaf("only", "text")], Level::Chapter);
        let node = &tree.nodes()[0];
        assert_eq!(node.relationships.previous, None);
        assert_eq!(node.relationships.next, None);
    }
}
