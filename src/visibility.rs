//! Visibility engine
//!
//! Hides nodes with an inline `!important` bundle plus the marker class, and
//! shows them by clearing both. Already-hidden nodes are recognized by the
//! marker alone, so re-applying a state is a no-op. A node that fails (usually
//! detached mid-pass) is counted and skipped; the rest of the set proceeds.

use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use crate::constants::hide::BUNDLE;
use crate::constants::markers::HIDDEN_CLASS;
use crate::tree::{LiveTree, NodeId, TreeResult};

const IMPORTANT_SUFFIX: &str = "!important";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Applied {
    Hidden,
    Shown,
}

/// State of one node before the pass first touched it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Inline value of each bundle property, `None` when it was unset
    pub previous: Vec<(&'static str, Option<String>)>,
    pub was_marked: bool,
    pub applied: Applied,
}

/// Everything one pass changed, enough to reverse it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityRecord {
    entries: BTreeMap<NodeId, RecordEntry>,
}

impl VisibilityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, node: NodeId) -> Option<&RecordEntry> {
        self.entries.get(&node)
    }

    /// Keep the earliest snapshot; later applications only update the state
    fn note(&mut self, node: NodeId, previous: Vec<(&'static str, Option<String>)>, was_marked: bool, applied: Applied) {
        self.entries
            .entry(node)
            .and_modify(|entry| entry.applied = applied)
            .or_insert(RecordEntry {
                previous,
                was_marked,
                applied,
            });
    }

    /// Put every touched node back the way the pass found it
    ///
    /// Returns the number of nodes restored; nodes that vanished since are
    /// skipped.
    pub fn undo<T: LiveTree + ?Sized>(self, tree: &mut T) -> usize {
        let mut restored = 0;
        for (node, entry) in self.entries {
            match restore(tree, node, &entry) {
                Ok(()) => restored += 1,
                Err(e) => warn!(node = %node, error = %e, "Failed to undo visibility change"),
            }
        }
        debug!(restored, "Visibility record undone");
        restored
    }
}

fn restore<T: LiveTree + ?Sized>(tree: &mut T, node: NodeId, entry: &RecordEntry) -> TreeResult<()> {
    for (name, value) in &entry.previous {
        match value {
            Some(value) => {
                let (value, important) = match value.strip_suffix(IMPORTANT_SUFFIX) {
                    Some(stripped) => (stripped.trim_end(), true),
                    None => (value.as_str(), false),
                };
                tree.set_style_property(node, name, value, important)?;
            }
            None => tree.remove_style_property(node, name)?,
        }
    }
    if entry.was_marked {
        tree.add_class(node, HIDDEN_CLASS)
    } else {
        tree.remove_class(node, HIDDEN_CLASS)
    }
}

/// Outcome counts of one [`apply`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ApplyReport {
    pub changed: usize,
    /// Already in the requested state
    pub unchanged: usize,
    pub failed: usize,
}

impl ApplyReport {
    pub fn merge(&mut self, other: ApplyReport) {
        self.changed += other.changed;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// Show or hide every node in `nodes`
pub fn apply<T: LiveTree + ?Sized>(
    tree: &mut T,
    nodes: &[NodeId],
    show: bool,
    record: &mut VisibilityRecord,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    for &node in nodes {
        let result = if show {
            show_node(tree, node, record)
        } else {
            hide_node(tree, node, record)
        };
        match result {
            Ok(true) => report.changed += 1,
            Ok(false) => report.unchanged += 1,
            Err(e) => {
                debug!(node = %node, show, error = %e, "Skipping node");
                report.failed += 1;
            }
        }
    }
    if report.failed > 0 {
        warn!(failed = report.failed, total = nodes.len(), show, "Some nodes could not be updated");
    }
    trace!(?report, show, "Visibility applied");
    report
}

fn snapshot<T: LiveTree + ?Sized>(tree: &T, node: NodeId) -> TreeResult<Vec<(&'static str, Option<String>)>> {
    BUNDLE
        .iter()
        .map(|(name, _)| Ok((*name, tree.style_property(node, name)?)))
        .collect()
}

fn hide_node<T: LiveTree + ?Sized>(tree: &mut T, node: NodeId, record: &mut VisibilityRecord) -> TreeResult<bool> {
    if tree.has_class(node, HIDDEN_CLASS)? {
        return Ok(false);
    }
    let previous = snapshot(tree, node)?;
    record.note(node, previous, false, Applied::Hidden);
    for (name, value) in BUNDLE {
        tree.set_style_property(node, name, value, true)?;
    }
    tree.add_class(node, HIDDEN_CLASS)?;
    Ok(true)
}

fn show_node<T: LiveTree + ?Sized>(tree: &mut T, node: NodeId, record: &mut VisibilityRecord) -> TreeResult<bool> {
    if !tree.has_class(node, HIDDEN_CLASS)? {
        return Ok(false);
    }
    let previous = snapshot(tree, node)?;
    record.note(node, previous, true, Applied::Shown);
    for (name, _) in BUNDLE {
        tree.remove_style_property(node, name)?;
    }
    tree.remove_class(node, HIDDEN_CLASS)?;
    Ok(true)
}
