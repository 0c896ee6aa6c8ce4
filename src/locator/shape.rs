//! Structural shape descriptors
//!
//! A shape is a tag constraint, attribute constraints and an optional required
//! descendant shape. One generic matcher interprets every shape, so adding a
//! target means describing it, not writing a traversal.

use regex::Regex;

use crate::tree::{self, LiveTree, NodeId, TreeResult};

#[derive(Debug, Clone)]
pub enum AttrMatch {
    Present,
    Exact(String),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
pub struct AttrConstraint {
    pub name: String,
    pub matcher: AttrMatch,
}

impl AttrConstraint {
    fn accepts(&self, value: Option<&str>) -> bool {
        match (&self.matcher, value) {
            (_, None) => false,
            (AttrMatch::Present, Some(_)) => true,
            (AttrMatch::Exact(expected), Some(v)) => v == expected,
            (AttrMatch::Pattern(re), Some(v)) => re.is_match(v),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Shape {
    tag: Option<String>,
    attrs: Vec<AttrConstraint>,
    descendant: Option<Box<Shape>>,
}

impl Shape {
    /// Matches any element
    pub fn any() -> Self {
        Self::default()
    }

    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn attr_present(mut self, name: &str) -> Self {
        self.attrs.push(AttrConstraint {
            name: name.to_string(),
            matcher: AttrMatch::Present,
        });
        self
    }

    pub fn attr_exact(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrConstraint {
            name: name.to_string(),
            matcher: AttrMatch::Exact(value.to_string()),
        });
        self
    }

    /// Case-insensitive pattern constraint
    pub fn attr_pattern(mut self, name: &str, pattern: &str) -> Result<Self, regex::Error> {
        let re = regex::RegexBuilder::new(pattern).case_insensitive(true).build()?;
        self.attrs.push(AttrConstraint {
            name: name.to_string(),
            matcher: AttrMatch::Pattern(re),
        });
        Ok(self)
    }

    /// Require a strict descendant matching `inner`
    pub fn containing(mut self, inner: Shape) -> Self {
        self.descendant = Some(Box::new(inner));
        self
    }

    /// Does `node` satisfy the full shape (including the descendant part)?
    pub fn matches<T: LiveTree + ?Sized>(&self, tree: &T, node: NodeId) -> TreeResult<bool> {
        if !tree::is_element(tree, node)? {
            return Ok(false);
        }
        if let Some(tag) = &self.tag {
            if tree.tag(node)? != *tag {
                return Ok(false);
            }
        }
        for constraint in &self.attrs {
            let value = tree.attribute(node, &constraint.name)?;
            if !constraint.accepts(value.as_deref()) {
                return Ok(false);
            }
        }
        match &self.descendant {
            None => Ok(true),
            Some(inner) => {
                for child in tree.children(node)? {
                    for candidate in tree::descendants(tree, child)? {
                        if inner.matches(tree, candidate)? {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
        }
    }

    /// Every node under `root` (inclusive) matching the shape
    pub fn find_all<T: LiveTree + ?Sized>(&self, tree: &T, root: NodeId) -> TreeResult<Vec<NodeId>> {
        let mut found = Vec::new();
        for node in tree::descendants(tree, root)? {
            if self.matches(tree, node)? {
                found.push(node);
            }
        }
        Ok(found)
    }
}
