//! Node locator
//!
//! Independent read-only strategies that search the live tree for candidates
//! of one semantic target. Strategies run in priority order; a failing
//! strategy is logged and contributes nothing.

pub mod catalog;
pub mod shape;

pub use catalog::Catalog;
pub use shape::Shape;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::constants::markers::HIDDEN_CLASS;
use crate::constants::tree::TEXT_TAG;
use crate::tree::{self, ComputedStyle, LiveTree, NodeId, TreeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    Shape,
    ClassPattern,
    Text,
    Style,
}

/// How a strategy's results join the ones found before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Combine {
    Union,
    /// Only runs when nothing was found so far
    Fallback,
    /// A non-empty result replaces everything and stops the search
    Exclusive,
}

/// Resolved-style signature of a target's typical rendering
#[derive(Debug, Clone, Default)]
pub struct StyleProfile {
    /// Accepted `position` values; empty accepts any
    pub positions: Vec<&'static str>,
    pub pointer_events_none: bool,
    pub min_z_index: Option<i64>,
    pub animated: bool,
}

impl StyleProfile {
    /// `marked` nodes carry the hide bundle, so their pointer-events and
    /// stacking order are ours rather than the host's and are not checked.
    pub fn matches(&self, style: &ComputedStyle, marked: bool) -> bool {
        if !self.positions.is_empty() {
            let Some(position) = style.position.as_deref() else {
                return false;
            };
            if !self.positions.iter().any(|p| *p == position) {
                return false;
            }
        }
        if marked {
            return !self.animated || style.is_animated();
        }
        if self.pointer_events_none && style.pointer_events.as_deref() != Some("none") {
            return false;
        }
        if let Some(min) = self.min_z_index {
            if style.z_index.is_none_or(|z| z < min) {
                return false;
            }
        }
        !self.animated || style.is_animated()
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Shape(Shape),
    ClassPattern { pattern: Regex, tags: Vec<String> },
    Text { pattern: Regex },
    Style(StyleProfile),
}

#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: &'static str,
    pub priority: u8,
    combine: Combine,
    matcher: Matcher,
}

impl Strategy {
    pub fn shape(name: &'static str, priority: u8, shape: Shape) -> Self {
        Self {
            name,
            priority,
            combine: Combine::Union,
            matcher: Matcher::Shape(shape),
        }
    }

    /// Class-token match against a curated synonym list
    ///
    /// Synonyms are regex fragments joined into one case-insensitive
    /// alternation. `tags` restricts the scan; empty scans every element.
    pub fn class_pattern(
        name: &'static str,
        priority: u8,
        synonyms: &[&str],
        tags: &[&str],
    ) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(&format!("(?:{})", synonyms.join("|")))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            name,
            priority,
            combine: Combine::Union,
            matcher: Matcher::ClassPattern {
                pattern,
                tags: tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
            },
        })
    }

    /// Rendered-text match; yields the containing block
    pub fn text(name: &'static str, priority: u8, pattern: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            name,
            priority,
            combine: Combine::Union,
            matcher: Matcher::Text { pattern },
        })
    }

    /// Computed-style heuristic; always unioned
    pub fn style(name: &'static str, priority: u8, profile: StyleProfile) -> Self {
        Self {
            name,
            priority,
            combine: Combine::Union,
            matcher: Matcher::Style(profile),
        }
    }

    pub fn fallback(mut self) -> Self {
        self.set_combine(Combine::Fallback);
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.set_combine(Combine::Exclusive);
        self
    }

    fn set_combine(&mut self, combine: Combine) {
        if self.kind() == StrategyKind::Style {
            warn!(strategy = self.name, "Style heuristics are always unioned");
            return;
        }
        self.combine = combine;
    }

    pub fn combine(&self) -> Combine {
        self.combine
    }

    pub fn kind(&self) -> StrategyKind {
        match self.matcher {
            Matcher::Shape(_) => StrategyKind::Shape,
            Matcher::ClassPattern { .. } => StrategyKind::ClassPattern,
            Matcher::Text { .. } => StrategyKind::Text,
            Matcher::Style(_) => StrategyKind::Style,
        }
    }

    /// Run against the current tree snapshot
    pub fn locate<T: LiveTree + ?Sized>(&self, tree: &T) -> TreeResult<Vec<NodeId>> {
        let root = tree.root();
        match &self.matcher {
            Matcher::Shape(shape) => shape.find_all(tree, root),
            Matcher::ClassPattern { pattern, tags } => {
                let mut found = Vec::new();
                for node in tree::descendants(tree, root)? {
                    let tag = tree.tag(node)?;
                    if tag == TEXT_TAG || (!tags.is_empty() && !tags.contains(&tag)) {
                        continue;
                    }
                    if pattern.is_match(&tree::class_string(tree, node)?) {
                        found.push(node);
                    }
                }
                Ok(found)
            }
            Matcher::Text { pattern } => {
                let mut found = Vec::new();
                for node in tree::descendants(tree, root)? {
                    let Some(text) = tree.text(node)? else {
                        continue;
                    };
                    if !pattern.is_match(text.trim()) {
                        continue;
                    }
                    if let Some(block) = containing_block(tree, node)? {
                        found.push(block);
                    }
                }
                Ok(found)
            }
            Matcher::Style(profile) => {
                let mut found = Vec::new();
                for node in tree::descendants(tree, root)? {
                    if node == root || !tree::is_element(tree, node)? {
                        continue;
                    }
                    let marked = tree.has_class(node, HIDDEN_CLASS)?;
                    if profile.matches(&tree.computed_style(node)?, marked) {
                        found.push(node);
                    }
                }
                Ok(found)
            }
        }
    }
}

/// Nearest block-level ancestor of `node`, never the root
///
/// A marked ancestor is taken as-is: its computed display is our own
/// `display: none`, not the host's.
fn containing_block<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> TreeResult<Option<NodeId>> {
    let root = tree.root();
    let mut current = tree.parent(node)?;
    while let Some(candidate) = current {
        if candidate == root {
            return Ok(None);
        }
        if tree.has_class(candidate, HIDDEN_CLASS)? || tree::is_block(tree, candidate)? {
            return Ok(Some(candidate));
        }
        current = tree.parent(candidate)?;
    }
    Ok(None)
}

/// Candidates for one target plus the strategies that failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Located {
    pub nodes: Vec<NodeId>,
    pub failed: Vec<&'static str>,
}

/// Run `strategies` (already in priority order) and combine their results
pub fn locate_target<T: LiveTree + ?Sized>(tree: &T, target: &str, strategies: &[Strategy]) -> Located {
    let mut located = Located::default();
    for strategy in strategies {
        if strategy.combine == Combine::Fallback && !located.nodes.is_empty() {
            continue;
        }
        let nodes = match strategy.locate(tree) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(semantic_target = %target, strategy = strategy.name, error = %e, "Locator strategy failed, ignoring it");
                located.failed.push(strategy.name);
                continue;
            }
        };
        debug!(semantic_target = %target, strategy = strategy.name, found = nodes.len(), "Strategy ran");
        if strategy.combine == Combine::Exclusive && !nodes.is_empty() {
            located.nodes = nodes;
            return located;
        }
        located.nodes.extend(nodes);
    }
    located
}
