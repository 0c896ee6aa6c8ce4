//! Configuration management
//!
//! - **schema**: typed settings with defaults and range clamping
//! - **merge**: JSON tree helpers (deep merge upgrade path, dot paths)
//! - **storage**: key/value storage collaborator
//! - **store**: the session's authoritative settings tree

pub mod merge;
pub mod schema;
pub mod storage;
pub mod store;

use thiserror::Error;

// Re-export commonly used types
pub use schema::{GeneralSettings, LiveSettings, Settings, Theme, VideoSettings};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{ConfigStore, LoadOutcome};

/// Rejected settings edits
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown settings path '{0}'")]
    UnknownPath(String),

    #[error("'{path}' expects a {expected}, got a {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("could not parse settings: {0}")]
    Parse(String),
}
