//! Candidate disambiguation
//!
//! Dedupes a target's candidates and applies the protection filter: the root
//! and every primary media surface, together with all of their ancestors, can
//! never be hidden no matter which strategy produced them.

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::constants::tree::PRIMARY_MEDIA_TAGS;
use crate::tree::{self, LiveTree, NodeId, TreeResult};

/// Nodes the visibility engine must never hide in this pass
pub fn protected_nodes<T: LiveTree + ?Sized>(tree: &T) -> TreeResult<BTreeSet<NodeId>> {
    let root = tree.root();
    let mut protected = BTreeSet::from([root]);
    for node in tree::descendants(tree, root)? {
        if !PRIMARY_MEDIA_TAGS.contains(&tree.tag(node)?.as_str()) {
            continue;
        }
        protected.extend(tree::ancestors_inclusive(tree, node)?);
    }
    debug!(count = protected.len(), "Computed protected nodes");
    Ok(protected)
}

/// Final action set for one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub nodes: Vec<NodeId>,
    /// Candidates removed by the protection filter
    pub dropped: Vec<NodeId>,
}

/// Dedupe `candidates` (keeping first-seen order) and drop protected nodes
pub fn classify(candidates: &[NodeId], protected: &BTreeSet<NodeId>) -> Classified {
    let mut seen = BTreeSet::new();
    let mut classified = Classified::default();
    for &node in candidates {
        if !seen.insert(node) {
            continue;
        }
        if protected.contains(&node) {
            classified.dropped.push(node);
        } else {
            classified.nodes.push(node);
        }
    }
    if !classified.dropped.is_empty() {
        warn!(dropped = classified.dropped.len(), "Protection filter removed candidates");
    }
    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Document;

    /// body > main > div.player > video, plus body > aside > div
    fn player_page() -> (Document, Vec<NodeId>) {
        let mut doc = Document::new("https://www.douyin.com/video/1", "body");
        let body = doc.root();
        let main = doc.append_element(body, "main", &[]).unwrap();
        let player = doc.append_element(main, "div", &[("class", "player")]).unwrap();
        let video = doc.append_element(player, "video", &[]).unwrap();
        let overlay = doc.append_element(player, "div", &[("class", "gift")]).unwrap();
        let aside = doc.append_element(body, "aside", &[]).unwrap();
        let rail = doc.append_element(aside, "div", &[]).unwrap();
        (doc, vec![body, main, player, video, overlay, aside, rail])
    }

    #[test]
    fn test_protected_set_is_media_and_ancestors() {
        let (doc, n) = player_page();
        let protected = protected_nodes(&doc).unwrap();
        assert_eq!(protected, BTreeSet::from([n[0], n[1], n[2], n[3]]));
    }

    #[test]
    fn test_root_is_protected_without_media() {
        let doc = Document::new("https://www.douyin.com/", "body");
        assert_eq!(protected_nodes(&doc).unwrap(), BTreeSet::from([doc.root()]));
    }

    #[test]
    fn test_classify_dedupes_in_order() {
        let (doc, n) = player_page();
        let protected = protected_nodes(&doc).unwrap();
        let out = classify(&[n[6], n[4], n[6], n[4]], &protected);
        assert_eq!(out.nodes, vec![n[6], n[4]]);
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn test_protection_holds_for_every_candidate_subset() {
        let (doc, n) = player_page();
        let protected = protected_nodes(&doc).unwrap();
        for mask in 0u32..(1 << n.len()) {
            let candidates: Vec<_> = n
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, id)| *id)
                .collect();
            let out = classify(&candidates, &protected);
            for node in &out.nodes {
                assert!(!protected.contains(node), "mask {mask:b} kept {node}");
            }
            assert_eq!(out.nodes.len() + out.dropped.len(), candidates.len());
        }
    }
}
