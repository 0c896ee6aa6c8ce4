//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Config storage constants
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "declutter";

    /// Storage key holding the whole settings blob
    pub const STORAGE_KEY: &str = "settings";

    /// Current settings schema version
    pub const SCHEMA_VERSION: u64 = 2;
}

/// Markers shared between the visibility engine and the style fragment
pub mod markers {
    /// Class added to every node the engine hides
    pub const HIDDEN_CLASS: &str = "declutter-hidden";

    /// Identifier of the scoped stylesheet slot
    pub const STYLE_SLOT: &str = "declutter-style";
}

/// Change watcher timing (milliseconds)
pub mod timing {
    /// Debounce window for significant mutation batches
    pub const DEBOUNCE_MS: u64 = 300;

    /// Forced re-application schedule after startup
    pub const BOOTSTRAP_DELAYS_MS: [u64; 3] = [500, 2000, 5000];

    /// Location poll interval
    pub const LOCATION_POLL_MS: u64 = 1000;
}

/// Tree inspection constants
pub mod tree {
    /// Tag reported for text nodes
    pub const TEXT_TAG: &str = "#text";

    /// Tags of the primary media-playback surface
    pub const PRIMARY_MEDIA_TAGS: &[&str] = &["video"];

    /// Tags treated as block-level when no computed display is known
    pub const BLOCK_TAGS: &[&str] = &[
        "article", "aside", "body", "div", "footer", "header", "li", "main", "nav", "ol", "p",
        "section", "ul",
    ];

    /// Computed display values treated as block-level
    pub const BLOCK_DISPLAYS: &[&str] = &["block", "flex", "grid", "list-item", "table", "flow-root"];

    /// Tokens that make a mutated element significant
    pub const SIGNIFICANT_TOKENS: &[&str] = &["video", "content", "main", "player", "feed", "live"];
}

/// Inline properties written by the hide bundle
pub mod hide {
    /// (property, value) pairs, all applied with `!important`
    pub const BUNDLE: &[(&str, &str)] = &[
        ("display", "none"),
        ("visibility", "hidden"),
        ("width", "0"),
        ("height", "0"),
        ("pointer-events", "none"),
        ("z-index", "-1"),
    ];
}

/// Config value ranges
pub mod validation {
    pub const MAX_PERCENT: u8 = 100;

    pub const MIN_SCALE_PERCENT: u16 = 50;
    pub const MAX_SCALE_PERCENT: u16 = 200;

    pub const MIN_SPEED_PERCENT: u16 = 25;
    pub const MAX_SPEED_PERCENT: u16 = 400;

    pub const MIN_FONT_SIZE: u16 = 8;
    pub const MAX_FONT_SIZE: u16 = 64;
}
