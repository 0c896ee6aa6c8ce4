//! Style fragment synthesis
//!
//! Renders the settings into one stylesheet, regenerated wholesale and
//! installed under [`STYLE_SLOT`](crate::constants::markers::STYLE_SLOT).
//! Output is a pure function of the settings. Color and numeric leaves are
//! interpolated verbatim; the config boundary only type-checks them.

use std::fmt::Write;

use crate::config::{LiveSettings, Settings, Theme};
use crate::constants::hide::BUNDLE;
use crate::constants::markers::HIDDEN_CLASS;

/// Danmaku scroll duration at 100% speed
const DANMAKU_BASE_SECONDS: f64 = 8.0;

const DANMAKU_SELECTOR: &str = r#"[class*="danmaku"], [class*="danmu"], [class*="barrage"]"#;
const OVERLAY_SELECTOR: &str = r#"[class*="overlay"], [class*="mask"]"#;

/// Build the full fragment for `settings`
pub fn render(settings: &Settings) -> String {
    let mut css = String::new();
    hidden_rule(&mut css);

    let general = &settings.general;
    if !general.enabled {
        return css;
    }
    root_vars(&mut css, settings);

    if general.font_scale != 100 {
        let _ = writeln!(css, "html {{ font-size: {}% !important; }}", general.font_scale);
    }
    if general.animation_speed != 100 {
        let factor = 100.0 / f64::from(general.animation_speed);
        let _ = writeln!(
            css,
            "*, *::before, *::after {{ animation-duration: calc(var(--declutter-animation-base, 1s) * {}) !important; transition-duration: calc(var(--declutter-transition-base, 0.3s) * {}) !important; }}",
            format_number(factor),
            format_number(factor),
        );
    }

    let video = &settings.video;
    if video.overlay_opacity != 100 {
        let _ = writeln!(
            css,
            "{OVERLAY_SELECTOR} {{ opacity: {} !important; }}",
            format_number(f64::from(video.overlay_opacity) / 100.0)
        );
    }

    danmaku_rule(&mut css, &settings.live);

    css
}

/// Only the danmaku leaves that differ from their defaults; nothing when none do
fn danmaku_rule(css: &mut String, live: &LiveSettings) {
    let defaults = LiveSettings::default();
    let mut declarations = Vec::new();
    if live.danmaku_opacity != defaults.danmaku_opacity {
        declarations.push(format!(
            "opacity: {} !important;",
            format_number(f64::from(live.danmaku_opacity) / 100.0)
        ));
    }
    if live.danmaku_font_size != defaults.danmaku_font_size {
        declarations.push(format!("font-size: {}px !important;", live.danmaku_font_size));
    }
    if live.danmaku_color != defaults.danmaku_color {
        declarations.push(format!("color: {} !important;", live.danmaku_color));
    }
    if live.danmaku_speed != defaults.danmaku_speed {
        let seconds = DANMAKU_BASE_SECONDS * 100.0 / f64::from(live.danmaku_speed.max(1));
        declarations.push(format!("animation-duration: {}s !important;", format_number(seconds)));
    }
    if declarations.is_empty() {
        return;
    }
    let _ = writeln!(css, "{DANMAKU_SELECTOR} {{ {} }}", declarations.join(" "));
}

/// Marker-class rule mirroring the inline hide bundle
fn hidden_rule(css: &mut String) {
    let declarations = BUNDLE
        .iter()
        .map(|(name, value)| format!("{name}: {value} !important;"))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(css, ".{HIDDEN_CLASS} {{ {declarations} }}");
}

fn root_vars(css: &mut String, settings: &Settings) {
    let general = &settings.general;
    let _ = write!(css, ":root {{ --declutter-accent: {};", general.accent_color);
    match general.theme {
        Theme::Auto => {}
        Theme::Dark => css.push_str(" --declutter-bg: #161823; --declutter-fg: #ffffff; color-scheme: dark;"),
        Theme::Light => css.push_str(" --declutter-bg: #ffffff; --declutter-fg: #161823; color-scheme: light;"),
    }
    css.push_str(" }\n");
    if general.theme != Theme::Auto {
        css.push_str(
            "body { background-color: var(--declutter-bg) !important; color: var(--declutter-fg) !important; }\n",
        );
    }
}

/// Shortest decimal form: `0.5`, `2`, `1.333`
fn format_number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    let text = format!("{rounded:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
