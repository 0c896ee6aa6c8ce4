//! Settings store
//!
//! Holds the authoritative in-memory settings tree for the session. Loading
//! never fails: absent or corrupt blobs fall back to defaults. A failed save
//! leaves the tree dirty so the next save retries it.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::merge::{deep_merge, get_path, kind_name, same_kind, set_path};
use super::storage::Storage;
use super::{ConfigError, Settings};
use crate::constants::config::{SCHEMA_VERSION, STORAGE_KEY};

/// How the initial load went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Stored,
    /// Nothing stored yet
    FirstRun,
    /// Stored blob could not be parsed; defaults in use
    Corrupt(String),
    /// Storage read failed; defaults in use
    Unavailable(String),
}

pub struct ConfigStore<S: Storage> {
    storage: S,
    tree: Value,
    settings: Settings,
    dirty: bool,
}

impl<S: Storage> ConfigStore<S> {
    pub fn load(storage: S) -> (Self, LoadOutcome) {
        let defaults = Settings::default_tree();
        let (stored, outcome) = match storage.get(STORAGE_KEY) {
            Ok(None) => {
                info!("No stored settings, using defaults");
                (None, LoadOutcome::FirstRun)
            }
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(value) if value.is_object() => (Some(value), LoadOutcome::Stored),
                Ok(value) => {
                    error!(found = kind_name(&value), "Stored settings are not an object, using defaults");
                    (None, LoadOutcome::Corrupt("stored settings are not an object".to_string()))
                }
                Err(e) => {
                    error!(error = %e, "Stored settings are corrupt, using defaults");
                    (None, LoadOutcome::Corrupt(e.to_string()))
                }
            },
            Err(e) => {
                error!(error = ?e, "Failed to read stored settings, using defaults");
                (None, LoadOutcome::Unavailable(format!("{e:#}")))
            }
        };

        let mut tree = match &stored {
            Some(value) => deep_merge(value, &defaults),
            None => defaults,
        };
        let upgraded = Self::stamp_version(&mut tree);
        let settings = Settings::resolve(&tree);
        debug!(settings = ?settings, "Resolved settings");

        let store = Self {
            storage,
            tree,
            settings,
            dirty: stored.is_some() && upgraded,
        };
        (store, outcome)
    }

    /// Bring the schema version up to date; true if it changed
    fn stamp_version(tree: &mut Value) -> bool {
        let stored = tree.get("version").and_then(Value::as_u64);
        if stored == Some(SCHEMA_VERSION) {
            return false;
        }
        info!(from = ?stored, to = SCHEMA_VERSION, "Upgrading settings schema version");
        set_path(tree, "version", Value::from(SCHEMA_VERSION));
        true
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The merged tree, including any unknown or mistyped stored values
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Type-check and write one leaf in memory
    pub fn set_leaf(&mut self, path: &str, value: Value) -> Result<(), ConfigError> {
        let mut candidate = Settings::default_tree();
        let default_leaf = get_path(&candidate, path)
            .ok_or_else(|| ConfigError::UnknownPath(path.to_string()))?;
        if default_leaf.is_object() || path == "version" {
            return Err(ConfigError::UnknownPath(path.to_string()));
        }
        if !same_kind(default_leaf, &value) {
            return Err(ConfigError::TypeMismatch {
                path: path.to_string(),
                expected: kind_name(default_leaf),
                found: kind_name(&value),
            });
        }
        set_path(&mut candidate, path, value.clone());
        if let Err(e) = serde_json::from_value::<Settings>(candidate) {
            return Err(ConfigError::InvalidValue {
                path: path.to_string(),
                reason: e.to_string(),
            });
        }

        set_path(&mut self.tree, path, value);
        self.settings = Settings::resolve(&self.tree);
        self.dirty = true;
        info!(path = %path, "Settings leaf updated");
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.tree = Settings::default_tree();
        self.settings = Settings::default();
        self.dirty = true;
        info!("Settings reset to defaults");
    }

    pub fn export_as_text(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.tree).context("Failed to serialize settings")
    }

    /// Replace the tree with an imported blob, merged over the defaults
    pub fn import_from_text(&mut self, text: &str) -> Result<(), ConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if !value.is_object() {
            return Err(ConfigError::InvalidValue {
                path: String::new(),
                reason: format!("expected an object, found {}", kind_name(&value)),
            });
        }
        let mut tree = deep_merge(&value, &Settings::default_tree());
        Self::stamp_version(&mut tree);
        self.settings = Settings::resolve(&tree);
        self.tree = tree;
        self.dirty = true;
        info!("Settings imported");
        Ok(())
    }

    /// Write the tree if it changed since the last successful save
    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let text = serde_json::to_string(&self.tree).context("Failed to serialize settings")?;
        match self.storage.set(STORAGE_KEY, &text) {
            Ok(()) => {
                self.dirty = false;
                debug!(bytes = text.len(), "Settings saved");
                Ok(())
            }
            Err(e) => {
                warn!(error = ?e, "Failed to save settings, keeping them in memory");
                Err(e).context("Failed to save settings")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_first_run_uses_full_defaults() {
        let (store, outcome) = ConfigStore::load(MemoryStorage::new());
        assert_eq!(outcome, LoadOutcome::FirstRun);
        assert_eq!(store.tree(), &Settings::default_tree());
        assert_eq!(store.settings(), &Settings::default());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_corrupt_blob_treated_as_absent() {
        let (store, outcome) = ConfigStore::load(MemoryStorage::with_entry(STORAGE_KEY, "{not json"));
        assert!(matches!(outcome, LoadOutcome::Corrupt(_)));
        assert_eq!(store.settings(), &Settings::default());

        let (_, outcome) = ConfigStore::load(MemoryStorage::with_entry(STORAGE_KEY, "[1,2]"));
        assert!(matches!(outcome, LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_unreadable_storage_uses_defaults() {
        let mut storage = MemoryStorage::new();
        storage.fail_reads = true;
        let (store, outcome) = ConfigStore::load(storage);
        assert!(matches!(outcome, LoadOutcome::Unavailable(_)));
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn test_partial_blob_is_upgraded() {
        let stored = r#"{"version":1,"videoUI":{"showLikeButton":false},"legacy":"x"}"#;
        let (store, outcome) = ConfigStore::load(MemoryStorage::with_entry(STORAGE_KEY, stored));
        assert_eq!(outcome, LoadOutcome::Stored);
        assert!(!store.settings().video.show_like_button);
        assert!(store.settings().video.show_comment_button);
        assert_eq!(store.tree()["legacy"], json!("x"));
        assert_eq!(store.tree()["version"], json!(SCHEMA_VERSION));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_set_leaf_type_checks() {
        let (mut store, _) = ConfigStore::load(MemoryStorage::new());

        store.set_leaf("videoUI.showLikeButton", json!(false)).unwrap();
        assert!(!store.settings().video.show_like_button);

        assert!(matches!(
            store.set_leaf("videoUI.showLikeButton", json!("no")),
            Err(ConfigError::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.set_leaf("videoUI.nothing", json!(true)),
            Err(ConfigError::UnknownPath(_))
        ));
        assert!(matches!(store.set_leaf("videoUI", json!({})), Err(ConfigError::UnknownPath(_))));
        assert!(matches!(
            store.set_leaf("general.theme", json!("purple")),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            store.set_leaf("liveUI.danmakuOpacity", json!(-4)),
            Err(ConfigError::InvalidValue { .. })
        ));
        store.set_leaf("general.theme", json!("dark")).unwrap();
    }

    #[test]
    fn test_failed_save_stays_dirty_and_retries() {
        let (mut store, _) = ConfigStore::load(MemoryStorage::new());
        store.storage_mut().fail_writes = true;
        store.set_leaf("liveUI.showGifts", json!(false)).unwrap();

        assert!(store.persist().is_err());
        assert!(store.is_dirty());
        assert!(!store.settings().live.show_gifts);

        store.storage_mut().fail_writes = false;
        store.persist().unwrap();
        assert!(!store.is_dirty());
        let saved: Value = serde_json::from_str(store.storage().entry(STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(saved["liveUI"]["showGifts"], json!(false));
    }

    #[test]
    fn test_persist_skips_clean_tree() {
        let (mut store, _) = ConfigStore::load(MemoryStorage::new());
        store.persist().unwrap();
        assert_eq!(store.storage().writes, 0);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let (mut store, _) = ConfigStore::load(MemoryStorage::new());
        store.set_leaf("liveUI.danmakuColor", json!("#00ff00")).unwrap();
        store.set_leaf("general.fontScale", json!(120)).unwrap();
        let text = store.export_as_text().unwrap();

        let (mut other, _) = ConfigStore::load(MemoryStorage::new());
        other.import_from_text(&text).unwrap();
        assert_eq!(other.tree(), store.tree());
        assert_eq!(other.settings(), store.settings());
    }

    #[test]
    fn test_import_rejects_garbage() {
        let (mut store, _) = ConfigStore::load(MemoryStorage::new());
        assert!(matches!(store.import_from_text("nope"), Err(ConfigError::Parse(_))));
        assert!(matches!(store.import_from_text("42"), Err(ConfigError::InvalidValue { .. })));
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn test_reset_to_defaults() {
        let (mut store, _) = ConfigStore::load(MemoryStorage::new());
        store.set_leaf("videoUI.showDescription", json!(false)).unwrap();
        store.reset_to_defaults();
        assert_eq!(store.tree(), &Settings::default_tree());
        assert!(store.is_dirty());
    }
}
