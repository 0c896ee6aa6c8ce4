//! JSON tree helpers for the settings blob
//!
//! `deep_merge` is the upgrade path: an older or partial blob is merged over
//! the current defaults so every default leaf exists afterwards, while every
//! value the user stored is kept as-is.

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Merge `user` over `defaults`
///
/// Objects present on both sides are merged recursively. Any other value the
/// user stored wins verbatim, even when its shape differs from the default.
/// Keys only the user has are kept.
pub fn deep_merge(user: &Value, defaults: &Value) -> Value {
    match (user, defaults) {
        (Value::Object(user_map), Value::Object(default_map)) => {
            let mut merged = Map::new();
            for (key, default_value) in default_map {
                let value = match user_map.get(key) {
                    Some(user_value) => {
                        if default_value.is_object() && !user_value.is_object() {
                            debug!(key = %key, "Stored value replaces a settings section, keeping it verbatim");
                        }
                        deep_merge(user_value, default_value)
                    }
                    None => default_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            for (key, user_value) in user_map {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), user_value.clone());
                }
            }
            Value::Object(merged)
        }
        (user, _) => user.clone(),
    }
}

/// Coarse JSON type used for boundary type-checks
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn same_kind(a: &Value, b: &Value) -> bool {
    kind(a) == kind(b)
}

pub fn kind_name(value: &Value) -> &'static str {
    kind(value)
}

/// Shape `tree` after `defaults`, replacing mistyped leaves with defaults
///
/// Keys unknown to `defaults` are dropped. Only used to build the typed view;
/// the stored tree is never rewritten by this.
pub fn coerce_types(tree: &Value, defaults: &Value) -> Value {
    match (tree, defaults) {
        (Value::Object(tree_map), Value::Object(default_map)) => {
            let mut out = Map::new();
            for (key, default_value) in default_map {
                let value = match tree_map.get(key) {
                    Some(v) => coerce_types(v, default_value),
                    None => default_value.clone(),
                };
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        (value, default_value) if same_kind(value, default_value) => value.clone(),
        (value, default_value) => {
            warn!(
                expected = kind(default_value),
                found = kind(value),
                "Settings leaf has unexpected type, using default"
            );
            default_value.clone()
        }
    }
}

/// Look up a dot-separated path
pub fn get_path<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(tree, |node, key| node.get(key))
}

/// Write a dot-separated path, turning non-object containers into objects
pub fn set_path(tree: &mut Value, path: &str, value: Value) {
    let mut node = tree;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if keys.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Dot-separated paths of every non-object leaf
pub fn leaf_paths(tree: &Value) -> Vec<String> {
    fn walk(node: &Value, prefix: &str, out: &mut Vec<String>) {
        match node {
            Value::Object(map) => {
                for (key, value) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(value, &path, out);
                }
            }
            _ => out.push(prefix.to_string()),
        }
    }

    let mut out = Vec::new();
    if tree.is_object() {
        walk(tree, "", &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use serde_json::json;

    #[test]
    fn test_merge_fills_missing_keys() {
        let defaults = json!({ "a": { "x": 1, "y": 2 }, "b": true });
        let user = json!({ "a": { "x": 5 } });
        assert_eq!(deep_merge(&user, &defaults), json!({ "a": { "x": 5, "y": 2 }, "b": true }));
    }

    #[test]
    fn test_merge_keeps_unexpected_shapes_verbatim() {
        let defaults = json!({ "a": { "x": 1 }, "b": true });
        let user = json!({ "a": "broken", "b": [1, 2] });
        assert_eq!(deep_merge(&user, &defaults), json!({ "a": "broken", "b": [1, 2] }));
    }

    #[test]
    fn test_merge_keeps_unknown_user_keys() {
        let defaults = json!({ "a": 1 });
        let user = json!({ "legacy": { "k": 1 } });
        assert_eq!(deep_merge(&user, &defaults), json!({ "a": 1, "legacy": { "k": 1 } }));
    }

    #[test]
    fn test_merge_invariant_over_partial_settings() {
        let defaults = Settings::default_tree();
        let partials = [
            json!({}),
            json!({ "videoUI": { "showLikeButton": false } }),
            json!({ "liveUI": { "danmakuColor": "#000", "showGifts": 3 }, "general": {} }),
            json!({ "general": { "theme": "dark", "extra": null }, "version": 1 }),
        ];

        for partial in &partials {
            let merged = deep_merge(partial, &defaults);
            for path in leaf_paths(&defaults) {
                assert!(get_path(&merged, &path).is_some(), "missing {path} for {partial}");
            }
            for path in leaf_paths(partial) {
                assert_eq!(get_path(&merged, &path), get_path(partial, &path), "changed {path}");
            }
        }
    }

    #[test]
    fn test_coerce_replaces_mistyped_leaves() {
        let defaults = json!({ "a": { "x": 1, "y": "s" } });
        let tree = json!({ "a": { "x": "one", "y": "t", "z": 3 } });
        assert_eq!(coerce_types(&tree, &defaults), json!({ "a": { "x": 1, "y": "t" } }));
    }

    #[test]
    fn test_get_and_set_path() {
        let mut tree = json!({ "videoUI": { "showLikeButton": true } });
        assert_eq!(get_path(&tree, "videoUI.showLikeButton"), Some(&json!(true)));
        assert_eq!(get_path(&tree, "videoUI.missing"), None);

        set_path(&mut tree, "videoUI.showLikeButton", json!(false));
        set_path(&mut tree, "liveUI.showGifts", json!(false));
        assert_eq!(tree["videoUI"]["showLikeButton"], json!(false));
        assert_eq!(tree["liveUI"]["showGifts"], json!(false));
    }

    #[test]
    fn test_set_path_replaces_scalar_container() {
        let mut tree = json!({ "videoUI": 7 });
        set_path(&mut tree, "videoUI.showLikeButton", json!(false));
        assert_eq!(tree, json!({ "videoUI": { "showLikeButton": false } }));
    }
}
