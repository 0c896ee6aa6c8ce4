//! Page context classification from the active location

use tracing::debug;
use url::Url;

use crate::targets::Surface;

/// Path prefixes of short-form content pages
const SHORT_FORM_PREFIXES: &[&str] = &["/video", "/discover", "/jingxuan", "/recommend", "/follow"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageContext {
    ShortForm,
    Live,
    Neither,
}

impl PageContext {
    pub fn classify(location: &str) -> Self {
        let Ok(url) = Url::parse(location) else {
            debug!(location = %location, "Unparseable location");
            return Self::Neither;
        };
        let host = url.host_str().unwrap_or_default();
        let path = url.path();

        if host.starts_with("live.") || path.starts_with("/live") {
            return Self::Live;
        }
        if path == "/"
            || SHORT_FORM_PREFIXES.iter().any(|p| path.starts_with(p))
            || url.query_pairs().any(|(k, _)| k == "modal_id")
        {
            return Self::ShortForm;
        }
        Self::Neither
    }

    /// Whether targets of `surface` are handled on this page
    pub fn includes(self, surface: Surface) -> bool {
        match surface {
            Surface::General => true,
            Surface::Video => self == Self::ShortForm,
            Surface::Live => self == Self::Live,
        }
    }
}
