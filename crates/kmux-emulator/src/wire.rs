//! Raw JSON shapes returned by the emulator's `ls` remote-control query, and
//! the polymorphic split-tree decoder (spec §4.3, §9: "peek the JSON token
//! type, do not dispatch on field presence").

use std::collections::BTreeMap;

use kmux_model::SplitNode;
use serde::Deserialize;

use crate::errors::EmulatorError;

#[derive(Debug, Deserialize)]
pub(crate) struct RawOsWindow {
    pub id: u64,
    pub is_focused: bool,
    pub tabs: Vec<RawTab>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTab {
    pub id: u64,
    pub title: String,
    pub is_active: bool,
    pub is_focused: bool,
    pub windows: Vec<RawWindow>,
    /// window-group id (as a JSON object key, hence `String`) -> window ids
    /// in that group; the first entry is canonical (spec §4.3).
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<u64>>,
    #[serde(default)]
    pub split_root: Option<RawSplitNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWindow {
    pub id: u64,
    #[allow(dead_code)]
    pub title: String,
    pub cwd: String,
    pub is_focused: bool,
    #[serde(default)]
    pub user_vars: BTreeMap<String, String>,
}

fn default_horizontal() -> bool {
    true
}

fn default_bias() -> f64 {
    0.5
}

/// A leaf is a bare JSON integer (a window-*group* id, not a window id); an
/// internal node is a JSON object. `serde`'s untagged deserializer peeks the
/// token type to choose between the two, which is exactly the tag-not-field
/// discriminator the split-tree parse requires.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawSplitNode {
    Leaf(u64),
    Internal {
        #[serde(default = "default_horizontal")]
        horizontal: bool,
        #[serde(default = "default_bias")]
        bias: f64,
        one: Box<RawSplitNode>,
        two: Box<RawSplitNode>,
    },
}

/// Build `group id -> first window id` from a tab's `groups` map.
fn group_to_window(tab: &RawTab) -> Result<BTreeMap<u64, u64>, EmulatorError> {
    let mut out = BTreeMap::new();
    for (group_id, window_ids) in &tab.groups {
        let group_id: u64 = group_id
            .parse()
            .map_err(|_| EmulatorError::MalformedWindowId(group_id.clone()))?;
        let first = window_ids
            .first()
            .copied()
            .ok_or(EmulatorError::UnknownGroupId(group_id))?;
        out.insert(group_id, first);
    }
    Ok(out)
}

fn window_index(tab: &RawTab) -> BTreeMap<u64, usize> {
    tab.windows
        .iter()
        .enumerate()
        .map(|(idx, w)| (w.id, idx))
        .collect()
}

fn resolve(
    raw: &RawSplitNode,
    groups: &BTreeMap<u64, u64>,
    indices: &BTreeMap<u64, usize>,
) -> Result<SplitNode, EmulatorError> {
    match raw {
        RawSplitNode::Leaf(group_id) => {
            let window_id = groups
                .get(group_id)
                .copied()
                .ok_or(EmulatorError::UnknownGroupId(*group_id))?;
            let idx = indices
                .get(&window_id)
                .copied()
                .ok_or(EmulatorError::UnknownWindowId(window_id))?;
            Ok(SplitNode::leaf(idx))
        }
        RawSplitNode::Internal {
            horizontal,
            bias,
            one,
            two,
        } => {
            let left = resolve(one, groups, indices)?;
            let right = resolve(two, groups, indices)?;
            Ok(SplitNode::internal(*horizontal, *bias, left, right))
        }
    }
}

/// Decode a tab's `split_root`, if present, into a model [`SplitNode`] tree
/// whose leaves index into `tab.windows`.
pub(crate) fn parse_split_root(tab: &RawTab) -> Result<Option<SplitNode>, EmulatorError> {
    let Some(raw) = &tab.split_root else {
        return Ok(None);
    };
    let groups = group_to_window(tab)?;
    let indices = window_index(tab);
    Ok(Some(resolve(raw, &groups, &indices)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tab() -> RawTab {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "demo",
            "is_active": true,
            "is_focused": true,
            "windows": [
                {"id": 10, "title": "a", "cwd": "/tmp", "is_focused": true},
                {"id": 11, "title": "b", "cwd": "/tmp", "is_focused": false},
            ],
            "groups": {"100": [10], "101": [11]},
            "split_root": {
                "horizontal": false,
                "bias": 0.7,
                "one": 100,
                "two": 101,
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_leaf_is_bare_integer() {
        let raw: RawSplitNode = serde_json::from_value(serde_json::json!(42)).unwrap();
        assert!(matches!(raw, RawSplitNode::Leaf(42)));
    }

    #[test]
    fn test_internal_defaults_horizontal_true_bias_half() {
        let raw: RawSplitNode = serde_json::from_value(serde_json::json!({"one": 1, "two": 2}))
            .unwrap();
        match raw {
            RawSplitNode::Internal {
                horizontal, bias, ..
            } => {
                assert!(horizontal);
                assert_eq!(bias, 0.5);
            }
            RawSplitNode::Leaf(_) => panic!("expected internal node"),
        }
    }

    #[test]
    fn test_parse_split_root_resolves_group_and_window_indices() {
        let tab = sample_tab();
        let node = parse_split_root(&tab).unwrap().unwrap();
        match node {
            SplitNode::Internal {
                horizontal,
                bias,
                children,
            } => {
                assert!(!horizontal);
                assert_eq!(bias, 0.7);
                assert_eq!(children[0], SplitNode::leaf(0));
                assert_eq!(children[1], SplitNode::leaf(1));
            }
            SplitNode::Leaf { .. } => panic!("expected internal node"),
        }
    }

    #[test]
    fn test_parse_split_root_none_when_absent() {
        let mut tab = sample_tab();
        tab.split_root = None;
        assert!(parse_split_root(&tab).unwrap().is_none());
    }

    #[test]
    fn test_unknown_group_id_fails_parse() {
        let mut tab = sample_tab();
        tab.groups.remove("101");
        let err = parse_split_root(&tab).unwrap_err();
        assert_eq!(err.error_code(), "unknown_group_id");
    }

    #[test]
    fn test_unknown_window_id_fails_parse() {
        let mut tab = sample_tab();
        tab.groups.insert("101".to_string(), vec![999]);
        let err = parse_split_root(&tab).unwrap_err();
        assert_eq!(err.error_code(), "unknown_window_id");
    }
}
