use scraper::node::Node;
use scraper::{ElementRef, Html};

use super::ScrapeError;

/// A TOC entry before its detail page has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    pub link: Option<String>,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn link_count(&self) -> usize {
        usize::from(self.link.is_some())
            + self.children.iter().map(TocEntry::link_count).sum::<usize>()
    }
}

/// Parses the first `<ul>` of a TOC page into an outline. Entries at
/// `depth >= max_depth` are dropped along with everything below them.
pub fn parse_toc(html: &str, max_depth: usize) -> Result<Vec<TocEntry>, ScrapeError> {
    let document = Html::parse_document(html);
    let top_level = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "ul")
        .ok_or_else(|| ScrapeError::MissingToc("document has no <ul>".to_string()))?;

    Ok(extract_items(top_level, 0, max_depth))
}

fn extract_items(list: ElementRef<'_>, depth: usize, max_depth: usize) -> Vec<TocEntry> {
    let mut list_items: Vec<ElementRef<'_>> = child_elements(list, "li").collect();

    // Some lists wrap their entries in a second, anonymous <ul>.
    if list_items.is_empty() {
        if let Some(inner) = child_elements(list, "ul").next() {
            list_items = child_elements(inner, "li").collect();
        }
    }

    list_items
        .into_iter()
        .filter_map(|li| process_list_item(li, depth, max_depth))
        .collect()
}

fn process_list_item(li: ElementRef<'_>, depth: usize, max_depth: usize) -> Option<TocEntry> {
    if depth >= max_depth {
        return None;
    }

    let (name, link) = read_header(li);
    let children = child_elements(li, "ul")
        .next()
        .map(|nested| extract_items(nested, depth + 1, max_depth))
        .unwrap_or_default();

    Some(TocEntry {
        name,
        link,
        children,
    })
}

/// The header is the first meaningful child node of the `<li>`: its text is
/// the title, and its own or first nested `<a href>` is the link.
fn read_header(li: ElementRef<'_>) -> (String, Option<String>) {
    for child in li.children() {
        match child.value() {
            Node::Text(text) if !text.trim().is_empty() => {
                return (collapse_whitespace(text), None);
            }
            Node::Element(_) => {
                let Some(header) = ElementRef::wrap(child) else {
                    continue;
                };
                if header.value().name() == "ul" {
                    break;
                }
                let title = collapse_whitespace(&header.text().collect::<String>());
                return (title, find_link(header));
            }
            _ => {}
        }
    }
    (String::new(), None)
}

fn find_link(header: ElementRef<'_>) -> Option<String> {
    header
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .find_map(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
}

/// Plain text of every `<p>` on a detail page, one paragraph per line, with
/// footnote markers (`<sup>`) removed.
pub fn extract_paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let paragraphs: Vec<String> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "p")
        .map(cleanup_paragraph)
        .collect();

    paragraphs.join("\n")
}

fn cleanup_paragraph(paragraph: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(paragraph, &mut raw);
    collapse_whitespace(&raw)
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "sup" => {}
            Node::Element(el) if el.name() == "br" => out.push(' '),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}
