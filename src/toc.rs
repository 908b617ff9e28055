//! Table-of-contents data model shared by the scraper and the node builder.
//!
//! Depth is never stored on an item; it is the nesting level, and [`Level`]
//! names it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Named nesting levels of the archive, indexed by depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Part,
    Section,
    Chapter,
    Article,
    Paragraph,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Part,
        Level::Section,
        Level::Chapter,
        Level::Article,
        Level::Paragraph,
    ];

    pub fn from_depth(depth: usize) -> Option<Level> {
        Self::ALL.get(depth).copied()
    }

    pub fn depth(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Part => "part",
            Level::Section => "section",
            Level::Chapter => "chapter",
            Level::Article => "article",
            Level::Paragraph => "paragraph",
        }
    }

    pub fn child(self) -> Option<Level> {
        Self::from_depth(self.depth() + 1)
    }

    /// Key under which this level's children are listed, e.g. `chapters`
    /// for a section. The deepest level has none.
    pub fn child_key(self) -> Option<&'static str> {
        match self.child()? {
            Level::Part => None,
            Level::Section => Some("sections"),
            Level::Chapter => Some("chapters"),
            Level::Article => Some("articles"),
            Level::Paragraph => Some("paragraphs"),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|l| l.name()).collect();
                format!("unknown level '{}', expected one of {}", s, names.join(", "))
            })
    }
}

/// One entry of the nested table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocItem {
    pub name: String,
    pub link: Option<String>,
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocItem>,
}

impl TocItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: None,
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>, text: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self.text = Some(text.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TocItem>) -> Self {
        self.children = children;
        self
    }

}

/// Renders items at `depth` with their children under the depth's plural
/// key (`sections`, `chapters`, ...), the way the archive names them.
pub fn to_keyed_json(items: &[TocItem], depth: usize) -> Value {
    Value::Array(items.iter().map(|item| item_to_keyed_json(item, depth)).collect())
}

/// Single-item form of [`to_keyed_json`].
pub fn item_to_keyed_json(item: &TocItem, depth: usize) -> Value {
    let mut map = Map::new();
    map.insert("name".to_string(), json!(item.name));
    map.insert("link".to_string(), json!(item.link));
    map.insert("text".to_string(), json!(item.text));

    if !item.children.is_empty() {
        let key = Level::from_depth(depth)
            .and_then(Level::child_key)
            .unwrap_or("children");
        map.insert(key.to_string(), to_keyed_json(&item.children, depth + 1));
    }

    Value::Object(map)
}
