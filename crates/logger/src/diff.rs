use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Default bound on diff recursion depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Old and new value at a changed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

/// Structural delta between two values, keyed by path.
///
/// Paths join object keys and array indices with `.`; the root is the empty
/// path. Inputs are owned trees, so the walk cannot meet a node twice; the
/// depth bound is the only thing that stops it early.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    /// Paths present only in the new value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub added: BTreeMap<String, Value>,
    /// Paths present only in the old value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub removed: BTreeMap<String, Value>,
    /// Paths present in both with unequal values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changed: BTreeMap<String, Change>,
    /// Paths that differ but were not descended into (depth bound).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub truncated: BTreeSet<String>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.truncated.is_empty()
    }

    /// Number of reported paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len() + self.truncated.len()
    }

    /// Every reported path, sorted.
    pub fn paths(&self) -> BTreeSet<&str> {
        self.added
            .keys()
            .chain(self.removed.keys())
            .chain(self.changed.keys())
            .chain(self.truncated.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Errors from projecting state values for diffing.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("failed to project {side} state for diffing: {source}")]
    Projection {
        side: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Compute the structural delta from `old` to `new`.
pub fn diff_values(old: &Value, new: &Value, max_depth: usize) -> StateDiff {
    let mut walker = Walker {
        diff: StateDiff::default(),
        max_depth,
    };
    walker.walk(String::new(), old, new, 0);
    walker.diff
}

struct Walker {
    diff: StateDiff,
    max_depth: usize,
}

impl Walker {
    fn walk(&mut self, path: String, old: &Value, new: &Value, depth: usize) {
        if old == new {
            return;
        }

        match (old, new) {
            (Value::Object(before), Value::Object(after)) => {
                if depth >= self.max_depth {
                    self.diff.truncated.insert(path);
                    return;
                }
                for (key, old_child) in before {
                    let child = join(&path, key);
                    match after.get(key) {
                        Some(new_child) => self.walk(child, old_child, new_child, depth + 1),
                        None => {
                            self.diff.removed.insert(child, old_child.clone());
                        }
                    }
                }
                for (key, new_child) in after {
                    if !before.contains_key(key) {
                        self.diff.added.insert(join(&path, key), new_child.clone());
                    }
                }
            }
            (Value::Array(before), Value::Array(after)) => {
                if depth >= self.max_depth {
                    self.diff.truncated.insert(path);
                    return;
                }
                for (i, (old_child, new_child)) in before.iter().zip(after).enumerate() {
                    self.walk(join(&path, &i.to_string()), old_child, new_child, depth + 1);
                }
                for (i, old_child) in before.iter().enumerate().skip(after.len()) {
                    self.diff
                        .removed
                        .insert(join(&path, &i.to_string()), old_child.clone());
                }
                for (i, new_child) in after.iter().enumerate().skip(before.len()) {
                    self.diff
                        .added
                        .insert(join(&path, &i.to_string()), new_child.clone());
                }
            }
            _ => {
                self.diff.changed.insert(
                    path,
                    Change {
                        old: old.clone(),
                        new: new.clone(),
                    },
                );
            }
        }
    }
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_values_have_empty_diff() {
        let a = json!({"a": 1, "nested": {"list": [1, 2, 3], "flag": true}});
        let diff = diff_values(&a, &a.clone(), DEFAULT_MAX_DEPTH);
        assert!(diff.is_empty());
        assert_eq!(diff.len(), 0);
    }

    #[test]
    fn single_field_change() {
        let diff = diff_values(
            &json!({"a": 1, "b": 2}),
            &json!({"a": 2, "b": 2}),
            DEFAULT_MAX_DEPTH,
        );
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(
            diff.changed["a"],
            Change {
                old: json!(1),
                new: json!(2)
            }
        );
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(
            serde_json::to_value(&diff).unwrap(),
            json!({"changed": {"a": {"old": 1, "new": 2}}})
        );
    }

    #[test]
    fn added_and_removed_keys() {
        let diff = diff_values(
            &json!({"keep": 1, "gone": "x"}),
            &json!({"keep": 1, "fresh": [1]}),
            DEFAULT_MAX_DEPTH,
        );
        assert_eq!(diff.removed["gone"], json!("x"));
        assert_eq!(diff.added["fresh"], json!([1]));
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn nested_paths_are_dot_joined() {
        let old = json!({"combatants": {"1": {"hp": 30, "effects": ["poison"]}}});
        let new = json!({"combatants": {"1": {"hp": 22, "effects": ["poison", "stun"]}}});
        let diff = diff_values(&old, &new, DEFAULT_MAX_DEPTH);

        assert_eq!(diff.changed["combatants.1.hp"].new, json!(22));
        assert_eq!(diff.added["combatants.1.effects.1"], json!("stun"));
        let paths: Vec<&str> = diff.paths().into_iter().collect();
        assert_eq!(paths, vec!["combatants.1.effects.1", "combatants.1.hp"]);
    }

    #[test]
    fn shorter_array_reports_removed_tail() {
        let diff = diff_values(&json!([1, 2, 3]), &json!([1]), DEFAULT_MAX_DEPTH);
        assert_eq!(diff.removed.len(), 2);
        assert_eq!(diff.removed["1"], json!(2));
        assert_eq!(diff.removed["2"], json!(3));
    }

    #[test]
    fn type_change_is_reported_as_changed() {
        let diff = diff_values(
            &json!({"target": {"id": 3}}),
            &json!({"target": null}),
            DEFAULT_MAX_DEPTH,
        );
        assert_eq!(diff.changed["target"].old, json!({"id": 3}));
        assert_eq!(diff.changed["target"].new, Value::Null);
    }

    #[test]
    fn scalar_root_change_uses_empty_path() {
        let diff = diff_values(&json!(0), &json!(5), DEFAULT_MAX_DEPTH);
        assert_eq!(diff.changed[""].new, json!(5));
    }

    #[test]
    fn depth_bound_truncates_instead_of_descending() {
        let old = json!({"a": {"b": {"c": 1}}});
        let new = json!({"a": {"b": {"c": 2}}});

        let diff = diff_values(&old, &new, 1);
        assert!(diff.changed.is_empty());
        assert!(diff.truncated.contains("a"));
        assert!(!diff.is_empty());

        let diff = diff_values(&old, &new, 0);
        assert!(diff.truncated.contains(""));

        let diff = diff_values(&old, &new, DEFAULT_MAX_DEPTH);
        assert_eq!(diff.changed["a.b.c"].new, json!(2));
    }

    #[test]
    fn deep_chain_stops_at_default_depth() {
        fn chain(depth: usize, leaf: i64) -> Value {
            (0..depth).fold(json!(leaf), |inner, _| json!({ "next": inner }))
        }

        let diff = diff_values(&chain(1000, 1), &chain(1000, 2), DEFAULT_MAX_DEPTH);
        assert_eq!(diff.len(), 1);
        let path = diff.truncated.iter().next().unwrap();
        assert_eq!(path.split('.').count(), DEFAULT_MAX_DEPTH);
        assert!(diff.changed.is_empty());
    }

    mod flat_maps {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        fn flat() -> impl Strategy<Value = BTreeMap<String, i64>> {
            prop::collection::btree_map("[a-f]", 0i64..4, 0..6)
        }

        proptest! {
            #[test]
            fn buckets_match_key_sets(old in flat(), new in flat()) {
                let diff = diff_values(&json!(old), &json!(new), DEFAULT_MAX_DEPTH);

                let added = new.keys().filter(|k| !old.contains_key(*k)).count();
                let removed = old.keys().filter(|k| !new.contains_key(*k)).count();
                let changed = old
                    .iter()
                    .filter(|(k, v)| new.get(*k).is_some_and(|n| n != *v))
                    .count();
                prop_assert_eq!(diff.added.len(), added);
                prop_assert_eq!(diff.removed.len(), removed);
                prop_assert_eq!(diff.changed.len(), changed);
                prop_assert_eq!(diff.is_empty(), old == new);
            }

            #[test]
            fn reversing_swaps_added_and_removed(old in flat(), new in flat()) {
                let forward = diff_values(&json!(old), &json!(new), DEFAULT_MAX_DEPTH);
                let backward = diff_values(&json!(new), &json!(old), DEFAULT_MAX_DEPTH);

                prop_assert_eq!(&forward.added, &backward.removed);
                prop_assert_eq!(&forward.removed, &backward.added);
                prop_assert_eq!(forward.paths(), backward.paths());
            }
        }
    }
}
