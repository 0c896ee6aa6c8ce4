//! Semantic targets
//!
//! Each target is one UI role the user can toggle. It maps to exactly one
//! boolean settings leaf and to the surface whose pages it appears on.

use serde::Serialize;
use std::fmt;

use crate::config::Settings;

/// Which settings branch (and which pages) a target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Surface {
    /// Every page
    General,
    /// Short-form content pages (`videoUI`)
    Video,
    /// Live content pages (`liveUI`)
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SemanticTarget {
    LikeControl,
    CommentControl,
    AuthorBadge,
    MusicBadge,
    DescriptionText,
    RecommendationRail,
    GiftOverlay,
    DanmakuLayer,
    AdBanner,
    StatsBadge,
}

impl SemanticTarget {
    pub const ALL: [SemanticTarget; 10] = [
        SemanticTarget::LikeControl,
        SemanticTarget::CommentControl,
        SemanticTarget::AuthorBadge,
        SemanticTarget::MusicBadge,
        SemanticTarget::DescriptionText,
        SemanticTarget::RecommendationRail,
        SemanticTarget::GiftOverlay,
        SemanticTarget::DanmakuLayer,
        SemanticTarget::AdBanner,
        SemanticTarget::StatsBadge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LikeControl => "likeControl",
            Self::CommentControl => "commentControl",
            Self::AuthorBadge => "authorBadge",
            Self::MusicBadge => "musicBadge",
            Self::DescriptionText => "descriptionText",
            Self::RecommendationRail => "recommendationRail",
            Self::GiftOverlay => "giftOverlay",
            Self::DanmakuLayer => "danmakuLayer",
            Self::AdBanner => "adBanner",
            Self::StatsBadge => "statsBadge",
        }
    }

    /// Dot path of the toggle that drives this target
    pub fn config_path(self) -> &'static str {
        match self {
            Self::LikeControl => "videoUI.showLikeButton",
            Self::CommentControl => "videoUI.showCommentButton",
            Self::AuthorBadge => "videoUI.showAuthorInfo",
            Self::MusicBadge => "videoUI.showMusicInfo",
            Self::DescriptionText => "videoUI.showDescription",
            Self::RecommendationRail => "videoUI.showRecommendations",
            Self::GiftOverlay => "liveUI.showGifts",
            Self::DanmakuLayer => "liveUI.showDanmaku",
            Self::StatsBadge => "liveUI.showStats",
            Self::AdBanner => "general.showAds",
        }
    }

    pub fn surface(self) -> Surface {
        match self {
            Self::LikeControl
            | Self::CommentControl
            | Self::AuthorBadge
            | Self::MusicBadge
            | Self::DescriptionText
            | Self::RecommendationRail => Surface::Video,
            Self::GiftOverlay | Self::DanmakuLayer | Self::StatsBadge => Surface::Live,
            Self::AdBanner => Surface::General,
        }
    }

    /// Desired state from the typed settings
    pub fn is_shown(self, settings: &Settings) -> bool {
        let video = &settings.video;
        let live = &settings.live;
        match self {
            Self::LikeControl => video.show_like_button,
            Self::CommentControl => video.show_comment_button,
            Self::AuthorBadge => video.show_author_info,
            Self::MusicBadge => video.show_music_info,
            Self::DescriptionText => video.show_description,
            Self::RecommendationRail => video.show_recommendations,
            Self::GiftOverlay => live.show_gifts,
            Self::DanmakuLayer => live.show_danmaku,
            Self::StatsBadge => live.show_stats,
            Self::AdBanner => settings.general.show_ads,
        }
    }
}

impl fmt::Display for SemanticTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
