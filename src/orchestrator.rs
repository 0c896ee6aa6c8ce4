//! Policy orchestrator
//!
//! The composition root. Owns the settings store and the strategy catalog,
//! exposes the settings-panel operations and runs one full pass:
//!
//! 1. resolve settings and the page context from the location
//! 2. locate and classify every target relevant to that context
//! 3. release stale marks, show the shown targets, hide the hidden ones
//!    (a node claimed by both stays hidden)
//! 4. regenerate and install the style fragment

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use crate::classifier;
use crate::config::{ConfigError, ConfigStore, LoadOutcome, Settings, Storage};
use crate::constants::markers::{HIDDEN_CLASS, STYLE_SLOT};
use crate::context::PageContext;
use crate::locator::{self, Catalog};
use crate::stylesheet;
use crate::targets::SemanticTarget;
use crate::tree::{self, LiveTree, NodeId, TreeResult};
use crate::visibility::{self, ApplyReport, VisibilityRecord};
use crate::watcher::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient, non-blocking message for the settings panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// What one target contributed to a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOutcome {
    pub target: SemanticTarget,
    pub show: bool,
    pub located: usize,
    pub kept: usize,
    /// Removed by the protection filter
    pub protected: usize,
    pub failed_strategies: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub trigger: Trigger,
    pub context: PageContext,
    pub enabled: bool,
    pub targets: Vec<TargetOutcome>,
    /// Marked nodes no hidden target claims any more
    pub released: ApplyReport,
    pub shown: ApplyReport,
    pub hidden: ApplyReport,
    pub stylesheet_installed: bool,
    #[serde(skip)]
    pub record: VisibilityRecord,
}

pub struct Orchestrator<S: Storage> {
    store: ConfigStore<S>,
    catalog: Catalog,
    notices: Vec<Notice>,
}

impl<S: Storage> Orchestrator<S> {
    pub fn new(storage: S) -> Result<Self> {
        Ok(Self::with_catalog(storage, Catalog::builtin()?))
    }

    pub fn with_catalog(storage: S, catalog: Catalog) -> Self {
        let (store, outcome) = ConfigStore::load(storage);
        let mut orchestrator = Self {
            store,
            catalog,
            notices: Vec::new(),
        };
        match outcome {
            LoadOutcome::Stored | LoadOutcome::FirstRun => {}
            LoadOutcome::Corrupt(reason) => orchestrator.notify(
                NoticeLevel::Warning,
                format!("Saved settings were unreadable and have been reset to defaults ({reason})"),
            ),
            LoadOutcome::Unavailable(reason) => orchestrator.notify(
                NoticeLevel::Warning,
                format!("Settings storage is unavailable, using defaults ({reason})"),
            ),
        }
        orchestrator
    }

    // === Settings panel operations ===

    pub fn get_config(&self) -> &Value {
        self.store.tree()
    }

    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    /// Commit one leaf and persist; a failed save keeps the change in memory
    pub fn set_leaf(&mut self, path: &str, value: Value) -> Result<(), ConfigError> {
        if let Err(e) = self.store.set_leaf(path, value) {
            warn!(path = %path, error = %e, "Rejected settings change");
            self.notify(NoticeLevel::Error, e.to_string());
            return Err(e);
        }
        self.commit();
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.store.reset_to_defaults();
        self.commit();
    }

    pub fn export_as_text(&mut self) -> Result<String> {
        self.store.export_as_text().inspect_err(|e| {
            error!(error = ?e, "Export failed");
            self.notices.push(Notice {
                level: NoticeLevel::Error,
                message: format!("Export failed: {e}"),
            });
        })
    }

    pub fn import_from_text(&mut self, text: &str) -> Result<(), ConfigError> {
        if let Err(e) = self.store.import_from_text(text) {
            warn!(error = %e, "Import rejected");
            self.notify(NoticeLevel::Error, format!("Import failed: {e}"));
            return Err(e);
        }
        self.notify(NoticeLevel::Info, "Settings imported".to_string());
        self.commit();
        Ok(())
    }

    /// Explicit save; retries anything a previous save failed to write
    pub fn save(&mut self) -> Result<()> {
        self.store.persist().inspect_err(|e| {
            self.notices.push(Notice {
                level: NoticeLevel::Error,
                message: format!("{e:#}"),
            });
        })
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn commit(&mut self) {
        if self.store.persist().is_err() {
            self.notify(
                NoticeLevel::Error,
                "Settings could not be saved; they stay active and will be saved again on the next change"
                    .to_string(),
            );
        }
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice { level, message });
    }

    // === Pass ===

    pub fn run_pass<T: LiveTree + ?Sized>(&self, tree: &mut T, trigger: Trigger) -> PassReport {
        let settings = self.store.settings();
        let enabled = settings.general.enabled;
        let context = PageContext::classify(&tree.location());
        debug!(?trigger, ?context, enabled, "Starting pass");

        let protected = match classifier::protected_nodes(&*tree) {
            Ok(protected) => Some(protected),
            Err(e) => {
                warn!(error = %e, "Could not compute protected nodes, hiding nothing this pass");
                None
            }
        };

        let mut targets = Vec::new();
        let mut hide_set = Vec::new();
        let mut show_set = Vec::new();
        let mut complete = protected.is_some();

        for target in SemanticTarget::ALL {
            if !context.includes(target.surface()) {
                continue;
            }
            let show = !enabled || target.is_shown(settings);
            let located = locator::locate_target(&*tree, target.name(), self.catalog.strategies(target));
            let classified = match &protected {
                Some(protected) => classifier::classify(&located.nodes, protected),
                None => classifier::Classified::default(),
            };
            if !show && !located.failed.is_empty() {
                complete = false;
            }
            targets.push(TargetOutcome {
                target,
                show,
                located: located.nodes.len(),
                kept: classified.nodes.len(),
                protected: classified.dropped.len(),
                failed_strategies: located.failed,
            });
            if show {
                show_set.extend(classified.nodes);
            } else {
                hide_set.extend(classified.nodes);
            }
        }

        let hide_set = dedup(hide_set);
        let hide_lookup: BTreeSet<NodeId> = hide_set.iter().copied().collect();
        let show_set: Vec<NodeId> = dedup(show_set)
            .into_iter()
            .filter(|node| !hide_lookup.contains(node))
            .collect();

        let mut record = VisibilityRecord::new();
        let released = if complete {
            match marked_nodes(&*tree) {
                Ok(marked) => {
                    let stale: Vec<NodeId> = marked
                        .into_iter()
                        .filter(|node| !hide_lookup.contains(node))
                        .collect();
                    visibility::apply(tree, &stale, true, &mut record)
                }
                Err(e) => {
                    warn!(error = %e, "Could not scan for stale marks");
                    ApplyReport::default()
                }
            }
        } else {
            debug!("Incomplete classification, keeping existing marks");
            ApplyReport::default()
        };
        let shown = visibility::apply(tree, &show_set, true, &mut record);
        let hidden = visibility::apply(tree, &hide_set, false, &mut record);

        let css = stylesheet::render(settings);
        let stylesheet_installed = match tree.install_stylesheet(STYLE_SLOT, &css) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to install style fragment");
                false
            }
        };

        info!(
            ?trigger,
            ?context,
            hidden = hidden.changed,
            shown = shown.changed,
            released = released.changed,
            "Pass complete"
        );

        PassReport {
            trigger,
            context,
            enabled,
            targets,
            released,
            shown,
            hidden,
            stylesheet_installed,
            record,
        }
    }
}

fn dedup(nodes: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = BTreeSet::new();
    nodes.into_iter().filter(|node| seen.insert(*node)).collect()
}

/// Every node currently carrying the marker class
fn marked_nodes<T: LiveTree + ?Sized>(tree: &T) -> TreeResult<Vec<NodeId>> {
    let mut marked = Vec::new();
    for node in tree::descendants(tree, tree.root())? {
        if tree::is_element(tree, node)? && tree.has_class(node, HIDDEN_CLASS)? {
            marked.push(node);
        }
    }
    Ok(marked)
}
