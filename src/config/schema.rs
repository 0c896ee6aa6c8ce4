//! Typed settings schema
//!
//! The serde structs below define every leaf and its default. The persisted
//! tree is kept as JSON (see [`crate::config::store`]); [`Settings::resolve`]
//! turns that tree into the typed view the pipeline reads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, warn};

use super::merge::coerce_types;
use crate::constants::config::SCHEMA_VERSION;
use crate::constants::validation::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Leave the host theme alone
    Auto,
    Dark,
    Light,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(rename = "videoUI", default)]
    pub video: VideoSettings,
    #[serde(rename = "liveUI", default)]
    pub live: LiveSettings,
}

/// Applies on every page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettings {
    /// Master switch; when off every target is shown
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_theme")]
    pub theme: Theme,
    /// Text scale in percent
    #[serde(default = "default_percent_u16")]
    pub font_scale: u16,
    #[serde(default = "default_accent_color")]
    pub accent_color: String,
    /// Animation speed in percent (200 = twice as fast)
    #[serde(default = "default_percent_u16")]
    pub animation_speed: u16,
    #[serde(default = "default_true")]
    pub show_ads: bool,
}

/// Short-form content pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    #[serde(default = "default_true")]
    pub show_like_button: bool,
    #[serde(default = "default_true")]
    pub show_comment_button: bool,
    #[serde(default = "default_true")]
    pub show_author_info: bool,
    #[serde(default = "default_true")]
    pub show_music_info: bool,
    #[serde(default = "default_true")]
    pub show_description: bool,
    #[serde(default = "default_true")]
    pub show_recommendations: bool,
    #[serde(default = "default_percent_u8")]
    pub overlay_opacity: u8,
}

/// Live content pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSettings {
    #[serde(default = "default_true")]
    pub show_gifts: bool,
    #[serde(default = "default_true")]
    pub show_danmaku: bool,
    #[serde(default = "default_true")]
    pub show_stats: bool,
    #[serde(default = "default_percent_u8")]
    pub danmaku_opacity: u8,
    #[serde(default = "default_danmaku_font_size")]
    pub danmaku_font_size: u16,
    #[serde(default = "default_danmaku_color")]
    pub danmaku_color: String,
    #[serde(default = "default_percent_u16")]
    pub danmaku_speed: u16,
}

// Default value functions
fn default_version() -> u64 {
    SCHEMA_VERSION
}

fn default_true() -> bool {
    true
}

fn default_theme() -> Theme {
    Theme::Auto
}

fn default_percent_u8() -> u8 {
    100
}

fn default_percent_u16() -> u16 {
    100
}

fn default_accent_color() -> String {
    "#fe2c55".to_string()
}

fn default_danmaku_font_size() -> u16 {
    20
}

fn default_danmaku_color() -> String {
    "#ffffff".to_string()
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            theme: default_theme(),
            font_scale: default_percent_u16(),
            accent_color: default_accent_color(),
            animation_speed: default_percent_u16(),
            show_ads: true,
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            show_like_button: true,
            show_comment_button: true,
            show_author_info: true,
            show_music_info: true,
            show_description: true,
            show_recommendations: true,
            overlay_opacity: default_percent_u8(),
        }
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            show_gifts: true,
            show_danmaku: true,
            show_stats: true,
            danmaku_opacity: default_percent_u8(),
            danmaku_font_size: default_danmaku_font_size(),
            danmaku_color: default_danmaku_color(),
            danmaku_speed: default_percent_u16(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            general: GeneralSettings::default(),
            video: VideoSettings::default(),
            live: LiveSettings::default(),
        }
    }
}

/// Deserialize one section, falling back to its defaults
fn section<T: DeserializeOwned + Default>(tree: &Value, key: &str) -> T {
    match tree.get(key) {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(section = key, error = %e, "Invalid settings section, using defaults");
            T::default()
        }),
        None => T::default(),
    }
}

impl Settings {
    /// The default tree, as persisted
    pub fn default_tree() -> Value {
        Self::default().to_tree()
    }

    pub fn to_tree(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            error!(error = %e, "Failed to serialize settings");
            Value::Object(Map::new())
        })
    }

    /// Typed view of a (merged) settings tree
    ///
    /// Leaves with an unexpected JSON type are read as their default, sections
    /// that still fail to deserialize fall back wholesale, ranges are clamped.
    pub fn resolve(tree: &Value) -> Self {
        let defaults = Self::default_tree();
        let coerced = coerce_types(tree, &defaults);
        let mut settings = Self {
            version: coerced
                .get("version")
                .and_then(Value::as_u64)
                .unwrap_or(SCHEMA_VERSION),
            general: section(&coerced, "general"),
            video: section(&coerced, "videoUI"),
            live: section(&coerced, "liveUI"),
        };
        settings.validate_and_clamp();
        settings
    }

    /// Clamp numeric leaves to their documented ranges
    pub fn validate_and_clamp(&mut self) {
        fn clamp_u16(name: &str, value: &mut u16, min: u16, max: u16) {
            if *value < min {
                warn!(leaf = name, value = *value, min = min, "value below minimum, clamping");
                *value = min;
            } else if *value > max {
                warn!(leaf = name, value = *value, max = max, "value exceeds maximum, clamping");
                *value = max;
            }
        }

        fn clamp_percent(name: &str, value: &mut u8) {
            if *value > MAX_PERCENT {
                warn!(leaf = name, value = *value, "percent exceeds 100, clamping to 100");
                *value = MAX_PERCENT;
            }
        }

        clamp_u16("general.fontScale", &mut self.general.font_scale, MIN_SCALE_PERCENT, MAX_SCALE_PERCENT);
        clamp_u16("general.animationSpeed", &mut self.general.animation_speed, MIN_SPEED_PERCENT, MAX_SPEED_PERCENT);
        clamp_percent("videoUI.overlayOpacity", &mut self.video.overlay_opacity);
        clamp_percent("liveUI.danmakuOpacity", &mut self.live.danmaku_opacity);
        clamp_u16("liveUI.danmakuFontSize", &mut self.live.danmaku_font_size, MIN_FONT_SIZE, MAX_FONT_SIZE);
        clamp_u16("liveUI.danmakuSpeed", &mut self.live.danmaku_speed, MIN_SPEED_PERCENT, MAX_SPEED_PERCENT);
    }
}
