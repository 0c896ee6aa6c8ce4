//! Built-in strategy catalog
//!
//! Per-target strategy lists, sorted by descending priority. Structural
//! matches key on the host's test hooks (`data-e2e`), class patterns on curated
//! synonym lists in Chinese and English.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use super::shape::Shape;
use super::{Strategy, StyleProfile};
use crate::targets::SemanticTarget;

const SHAPE: u8 = 40;
const CLASS: u8 = 30;
const TEXT: u8 = 20;
const STYLE: u8 = 10;

const LIKE_SYNONYMS: &[&str] = &["like", "digg", "favou?rite", "点赞"];
const COMMENT_SYNONYMS: &[&str] = &["comment", "reply", "评论"];
const AUTHOR_SYNONYMS: &[&str] = &["author", "avatar", "nickname", "作者"];
const MUSIC_SYNONYMS: &[&str] = &["music", "audio", "sound", "原声", "音乐"];
const DESCRIPTION_SYNONYMS: &[&str] = &["desc", "caption", "title-text", "描述"];
const RECOMMENDATION_SYNONYMS: &[&str] = &["related", "recommend", "suggest", "推荐"];
const GIFT_SYNONYMS: &[&str] = &["gift", "present", "reward", "donate", "打赏", "礼物"];
const DANMAKU_SYNONYMS: &[&str] = &["danmaku", "danmu", "barrage", "bullet", "弹幕"];
const AD_SYNONYMS: &[&str] = &[r"\bads?\b", "advert", "sponsor", "promot", "广告", "推广"];
const STATS_SYNONYMS: &[&str] = &["online", "viewer", "audience", "popularity", "人气", "在线"];

/// Gift vocabulary: sent, tipped, coins, diamonds, "x 3" combos
const GIFT_TEXT: &str = r"送出|打赏|抖币|钻石|[x×]\s*\d+$";
const AD_TEXT: &str = r"^(广告|推广|赞助|sponsored|ad)$";
const STATS_TEXT: &str = r"^\d+(\.\d+)?[万wk]?\s*(人在线|在线|人气|viewers?|watching)$";
const MUSIC_TEXT: &str = "原声";

#[derive(Debug, Clone)]
pub struct Catalog {
    strategies: BTreeMap<SemanticTarget, Vec<Strategy>>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self {
            strategies: BTreeMap::new(),
        };

        catalog.insert(
            SemanticTarget::LikeControl,
            vec![
                Strategy::shape("like-e2e", SHAPE, Shape::any().attr_exact("data-e2e", "video-player-digg")),
                Strategy::shape(
                    "like-aria",
                    SHAPE,
                    Shape::any().attr_pattern("aria-label", "^(点赞|like)").context("like aria pattern")?,
                ),
                Strategy::class_pattern("like-class", CLASS, LIKE_SYNONYMS, &[])
                    .context("like class pattern")?
                    .fallback(),
            ],
        );

        catalog.insert(
            SemanticTarget::CommentControl,
            vec![
                Strategy::shape("comment-e2e", SHAPE, Shape::any().attr_exact("data-e2e", "feed-comment-icon")),
                Strategy::shape(
                    "comment-aria",
                    SHAPE,
                    Shape::any().attr_pattern("aria-label", "^(评论|comment)").context("comment aria pattern")?,
                ),
                Strategy::class_pattern("comment-class", CLASS, COMMENT_SYNONYMS, &[])
                    .context("comment class pattern")?
                    .fallback(),
            ],
        );

        catalog.insert(
            SemanticTarget::AuthorBadge,
            vec![
                Strategy::shape("author-avatar", SHAPE, Shape::any().attr_exact("data-e2e", "video-avatar")),
                Strategy::shape("author-nickname", SHAPE, Shape::any().attr_exact("data-e2e", "feed-video-nickname")),
                Strategy::class_pattern("author-class", CLASS, AUTHOR_SYNONYMS, &[])
                    .context("author class pattern")?
                    .fallback(),
            ],
        );

        catalog.insert(
            SemanticTarget::MusicBadge,
            vec![
                Strategy::shape("music-e2e", SHAPE, Shape::any().attr_exact("data-e2e", "video-music")),
                Strategy::class_pattern("music-class", CLASS, MUSIC_SYNONYMS, &[])
                    .context("music class pattern")?
                    .fallback(),
                Strategy::text("music-text", TEXT, MUSIC_TEXT)
                    .context("music text pattern")?
                    .fallback(),
            ],
        );

        catalog.insert(
            SemanticTarget::DescriptionText,
            vec![
                Strategy::shape("description-e2e", SHAPE, Shape::any().attr_exact("data-e2e", "video-desc"))
                    .exclusive(),
                Strategy::class_pattern("description-class", CLASS, DESCRIPTION_SYNONYMS, &[])
                    .context("description class pattern")?
                    .fallback(),
            ],
        );

        catalog.insert(
            SemanticTarget::RecommendationRail,
            vec![
                Strategy::shape("recommendation-e2e", SHAPE, Shape::any().attr_exact("data-e2e", "related-video")),
                Strategy::class_pattern("recommendation-class", CLASS, RECOMMENDATION_SYNONYMS, &[])
                    .context("recommendation class pattern")?
                    .fallback(),
            ],
        );

        catalog.insert(
            SemanticTarget::GiftOverlay,
            vec![
                Strategy::class_pattern("gift-class", CLASS, GIFT_SYNONYMS, &[]).context("gift class pattern")?,
                Strategy::text("gift-text", TEXT, GIFT_TEXT).context("gift text pattern")?,
                Strategy::style(
                    "gift-style",
                    STYLE,
                    StyleProfile {
                        positions: vec!["absolute", "fixed"],
                        pointer_events_none: false,
                        min_z_index: Some(100),
                        animated: true,
                    },
                ),
            ],
        );

        catalog.insert(
            SemanticTarget::DanmakuLayer,
            vec![
                Strategy::class_pattern("danmaku-class", CLASS, DANMAKU_SYNONYMS, &[])
                    .context("danmaku class pattern")?,
                Strategy::style(
                    "danmaku-style",
                    STYLE,
                    StyleProfile {
                        positions: vec!["absolute"],
                        pointer_events_none: true,
                        min_z_index: None,
                        animated: true,
                    },
                ),
            ],
        );

        catalog.insert(
            SemanticTarget::AdBanner,
            vec![
                Strategy::class_pattern("ad-class", CLASS, AD_SYNONYMS, &[]).context("ad class pattern")?,
                Strategy::text("ad-text", TEXT, AD_TEXT).context("ad text pattern")?,
            ],
        );

        catalog.insert(
            SemanticTarget::StatsBadge,
            vec![
                Strategy::class_pattern("stats-class", CLASS, STATS_SYNONYMS, &[]).context("stats class pattern")?,
                Strategy::text("stats-text", TEXT, STATS_TEXT).context("stats text pattern")?,
            ],
        );

        Ok(catalog)
    }

    /// Empty catalog, for callers that register their own strategies
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Register strategies for a target, replacing any previous list
    pub fn insert(&mut self, target: SemanticTarget, mut strategies: Vec<Strategy>) {
        strategies.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.strategies.insert(target, strategies);
    }

    pub fn strategies(&self, target: SemanticTarget) -> &[Strategy] {
        self.strategies.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }
}
