#![forbid(unsafe_code)]
//! Declutter
//!
//! Hides and restyles regions of a third-party web UI whose markup carries no
//! stable identifiers. Semantic targets are located by independent heuristic
//! strategies, filtered so the primary media surface is never hidden, and
//! toggled through an idempotent visibility engine driven by a debounced
//! change watcher.

pub mod classifier;
pub mod config;
pub mod constants;
pub mod context;
pub mod locator;
pub mod orchestrator;
pub mod scheduler;
pub mod session;
pub mod stylesheet;
pub mod targets;
pub mod tree;
pub mod version;
pub mod visibility;
pub mod watcher;

pub use config::{ConfigError, Settings};
pub use orchestrator::{Notice, NoticeLevel, Orchestrator, PassReport};
pub use session::Session;
pub use targets::SemanticTarget;
pub use tree::{Document, LiveTree, NodeId, TreeError};
