//! Live tree collaborator
//!
//! The host document is owned and mutated by someone else. The core only ever
//! sees it through [`LiveTree`], holds [`NodeId`] handles for the duration of a
//! single pass and expects any call to fail once the host has dropped a node.

mod document;

pub use document::{Document, NodeSnapshot, Snapshot};

use std::fmt;
use thiserror::Error;

use crate::constants::tree::{BLOCK_DISPLAYS, BLOCK_TAGS, TEXT_TAG};

/// Non-owning handle to a node of the live tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} is detached from the tree")]
    Detached(NodeId),

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("tree is inconsistent: {0}")]
    Inconsistent(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Resolved presentation properties the heuristics care about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    pub display: Option<String>,
    pub position: Option<String>,
    pub pointer_events: Option<String>,
    pub z_index: Option<i64>,
    pub animation_name: Option<String>,
    pub transform: Option<String>,
}

impl ComputedStyle {
    /// Build from `(property, value)` pairs; later pairs win
    pub fn from_properties<'a>(props: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut style = Self::default();
        for (name, value) in props {
            let value = value.trim().to_ascii_lowercase();
            match name.trim().to_ascii_lowercase().as_str() {
                "display" => style.display = Some(value),
                "position" => style.position = Some(value),
                "pointer-events" => style.pointer_events = Some(value),
                "z-index" => style.z_index = value.parse().ok(),
                "animation-name" | "animation" => style.animation_name = Some(value),
                "transform" => style.transform = Some(value),
                _ => {}
            }
        }
        style
    }

    /// `None` when the display is unknown or suppressed
    pub fn is_block(&self) -> Option<bool> {
        self.display
            .as_deref()
            .filter(|display| *display != "none")
            .map(|display| BLOCK_DISPLAYS.contains(&display))
    }

    pub fn is_animated(&self) -> bool {
        let active = |value: &Option<String>| {
            value
                .as_deref()
                .is_some_and(|v| !v.is_empty() && v != "none")
        };
        active(&self.animation_name) || active(&self.transform)
    }
}

/// One observed host change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
    CharacterData {
        target: NodeId,
    },
}

/// Read/write access to the host document
///
/// Reads are side-effect free. Writes are limited to presentation: the class
/// list, inline style declarations and scoped stylesheet slots.
pub trait LiveTree {
    fn root(&self) -> NodeId;

    /// Current document location (URL)
    fn location(&self) -> String;

    fn children(&self, node: NodeId) -> TreeResult<Vec<NodeId>>;

    fn parent(&self, node: NodeId) -> TreeResult<Option<NodeId>>;

    /// Lowercase tag name, `#text` for text nodes
    fn tag(&self, node: NodeId) -> TreeResult<String>;

    fn attribute(&self, node: NodeId, name: &str) -> TreeResult<Option<String>>;

    /// Text content of a text node, `None` for elements
    fn text(&self, node: NodeId) -> TreeResult<Option<String>>;

    fn computed_style(&self, node: NodeId) -> TreeResult<ComputedStyle>;

    fn has_class(&self, node: NodeId, class: &str) -> TreeResult<bool>;

    fn add_class(&mut self, node: NodeId, class: &str) -> TreeResult<()>;

    fn remove_class(&mut self, node: NodeId, class: &str) -> TreeResult<()>;

    fn style_property(&self, node: NodeId, name: &str) -> TreeResult<Option<String>>;

    fn set_style_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
        important: bool,
    ) -> TreeResult<()>;

    fn remove_style_property(&mut self, node: NodeId, name: &str) -> TreeResult<()>;

    /// Replace (or create) the stylesheet identified by `marker`
    fn install_stylesheet(&mut self, marker: &str, css: &str) -> TreeResult<()>;
}

/// Pre-order walk of `from` and everything below it
pub fn descendants<T: LiveTree + ?Sized>(tree: &T, from: NodeId) -> TreeResult<Vec<NodeId>> {
    let mut out = Vec::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        out.push(node);
        let children = tree.children(node)?;
        stack.extend(children.into_iter().rev());
    }
    Ok(out)
}

/// `node` followed by its ancestors up to the root
pub fn ancestors_inclusive<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> TreeResult<Vec<NodeId>> {
    let mut chain = vec![node];
    let mut current = node;
    while let Some(parent) = tree.parent(current)? {
        if chain.contains(&parent) {
            return Err(TreeError::Inconsistent(format!("parent cycle at {parent}")));
        }
        chain.push(parent);
        current = parent;
    }
    Ok(chain)
}

pub fn is_element<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> TreeResult<bool> {
    Ok(tree.tag(node)? != TEXT_TAG)
}

/// Block-level test: computed display first, tag name as fallback
pub fn is_block<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> TreeResult<bool> {
    if !is_element(tree, node)? {
        return Ok(false);
    }
    if let Some(block) = tree.computed_style(node)?.is_block() {
        return Ok(block);
    }
    let tag = tree.tag(node)?;
    Ok(BLOCK_TAGS.contains(&tag.as_str()))
}

/// Space-separated class tokens
pub fn class_string<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> TreeResult<String> {
    Ok(tree.attribute(node, "class")?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_style_from_properties() {
        let style = ComputedStyle::from_properties([
            ("Position", "Absolute"),
            ("z-index", "999"),
            ("pointer-events", "none"),
            ("transform", "translateX(-40px)"),
        ]);
        assert_eq!(style.position.as_deref(), Some("absolute"));
        assert_eq!(style.z_index, Some(999));
        assert!(style.is_animated());
        assert_eq!(style.is_block(), None);
    }

    #[test]
    fn test_computed_style_none_is_not_animated() {
        let style = ComputedStyle::from_properties([("animation-name", "none"), ("transform", "none")]);
        assert!(!style.is_animated());
    }

    #[test]
    fn test_z_index_auto_is_unknown() {
        let style = ComputedStyle::from_properties([("z-index", "auto")]);
        assert_eq!(style.z_index, None);
    }

    #[test]
    fn test_descendants_preorder() {
        let mut doc = Document::new("https://www.douyin.com/", "body");
        let root = doc.root();
        let a = doc.append_element(root, "div", &[]).unwrap();
        let a1 = doc.append_element(a, "span", &[]).unwrap();
        let b = doc.append_element(root, "div", &[]).unwrap();

        assert_eq!(descendants(&doc, root).unwrap(), vec![root, a, a1, b]);
        assert_eq!(ancestors_inclusive(&doc, a1).unwrap(), vec![a1, a, root]);
    }

    #[test]
    fn test_is_block_prefers_computed_display() {
        let mut doc = Document::new("https://www.douyin.com/", "body");
        let root = doc.root();
        let span = doc.append_element(root, "span", &[]).unwrap();
        let div = doc.append_element(root, "div", &[]).unwrap();
        assert!(!is_block(&doc, span).unwrap());
        assert!(is_block(&doc, div).unwrap());

        doc.set_computed(span, "display", "flex").unwrap();
        doc.set_computed(div, "display", "inline").unwrap();
        assert!(is_block(&doc, span).unwrap());
        assert!(!is_block(&doc, div).unwrap());

        doc.set_computed(div, "display", "none").unwrap();
        assert!(is_block(&doc, div).unwrap());
    }
}
