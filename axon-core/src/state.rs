//! Agent state paths and the pure state-modification interpreter.

use crate::effect::{Effect, ModifyOp};
use crate::error::{StateError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Reserved top-level field for decision-engine scratch data.
pub const RUNNER_FIELD: &str = "__runner";

/// Version stamped into the scratch field. Bumped when the layout of
/// engine scratch data changes incompatibly.
pub const RUNNER_SCRATCH_VERSION: u64 = 1;

/// A path into an agent's state, one segment per object key.
///
/// The empty path addresses the whole state. Parses from and displays
/// as a dotted string (`order.items`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatePath(Vec<String>);

impl StatePath {
    /// The path addressing the whole state.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(dotted: &str) -> Result<Self, StateError> {
        if dotted.is_empty() {
            return Ok(Self::root());
        }
        let segments: Vec<String> = dotted.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(StateError::InvalidPath(dotted.to_owned()));
        }
        Ok(Self(segments))
    }

    /// A path under the reserved runner scratch field.
    pub fn scratch(key: &str) -> Self {
        Self(vec![RUNNER_FIELD.to_owned(), key.to_owned()])
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Look up the value at this path.
    pub fn get<'a>(&self, state: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(state, |node, segment| node.as_object()?.get(segment))
    }

    /// Write `value` at this path, creating intermediate objects.
    pub fn set(&self, state: &mut Value, value: Value) -> Result<(), StateError> {
        let Some((last, parents)) = self.0.split_last() else {
            *state = value;
            return Ok(());
        };
        let parent = self.walk_mut(state, parents, true)?;
        if let Some(parent) = parent {
            parent.insert(last.clone(), value);
        }
        Ok(())
    }

    /// Remove the value at this path. Missing paths are a no-op.
    /// Removing the root leaves an empty object.
    pub fn remove(&self, state: &mut Value) -> Result<Option<Value>, StateError> {
        let Some((last, parents)) = self.0.split_last() else {
            let old = std::mem::replace(state, Value::Object(Map::new()));
            return Ok(Some(old));
        };
        match self.walk_mut(state, parents, false)? {
            Some(parent) => Ok(parent.remove(last)),
            None => Ok(None),
        }
    }

    fn walk_mut<'a>(
        &self,
        state: &'a mut Value,
        parents: &[String],
        create: bool,
    ) -> Result<Option<&'a mut Map<String, Value>>, StateError> {
        let mut node = state;
        for (depth, segment) in parents.iter().enumerate() {
            let map = node.as_object_mut().ok_or_else(|| StateError::NotAnObject {
                path: self.prefix(depth),
            })?;
            if !map.contains_key(segment) {
                if !create {
                    return Ok(None);
                }
                map.insert(segment.clone(), Value::Object(Map::new()));
            }
            node = map
                .get_mut(segment)
                .ok_or_else(|| StateError::InvalidPath(self.to_string()))?;
        }
        node.as_object_mut()
            .map(Some)
            .ok_or_else(|| StateError::NotAnObject {
                path: self.prefix(parents.len()),
            })
    }

    fn prefix(&self, len: usize) -> String {
        self.0[..len].join(".")
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for StatePath {
    /// Split on dots. Empty segments are dropped; use [`StatePath::parse`]
    /// to reject them instead.
    fn from(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

/// Recursively merge `patch` into `target`. Objects merge key by key;
/// anything else replaces.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Apply one state modification in place.
pub fn apply(
    state: &mut Value,
    op: ModifyOp,
    path: &StatePath,
    value: Value,
) -> Result<(), StateError> {
    match op {
        ModifyOp::Set => path.set(state, value),
        ModifyOp::Update => {
            let merged = match path.get(state).cloned() {
                Some(mut current) => {
                    deep_merge(&mut current, value);
                    current
                }
                None => value,
            };
            path.set(state, merged)
        }
        ModifyOp::Delete => path.remove(state).map(|_| ()),
        ModifyOp::Replace => {
            *state = value;
            Ok(())
        }
    }?;
    ensure_object(state)
}

/// Fold every `StateModification` in `effects`, left to right, into `state`.
/// Other effects are ignored. Stops at the first failure.
pub fn fold(mut state: Value, effects: &[Effect]) -> Result<Value, StateError> {
    for effect in effects {
        if let Effect::StateModification { op, path, value } = effect {
            apply(&mut state, *op, path, value.clone())?;
        }
    }
    Ok(state)
}

/// Reject states that are not JSON objects.
pub fn ensure_object(state: &Value) -> Result<(), StateError> {
    if state.is_object() {
        Ok(())
    } else {
        Err(ValidationError::StateNotObject(type_name(state).to_owned()).into())
    }
}

/// Make sure the runner scratch field exists and carries its version.
pub fn ensure_scratch(state: &mut Value) -> Result<(), StateError> {
    let version = StatePath::scratch("version");
    if version.get(state).is_none() {
        version.set(state, Value::from(RUNNER_SCRATCH_VERSION))?;
    }
    Ok(())
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn modify(op: ModifyOp, path: &str, value: Value) -> Effect {
        Effect::StateModification {
            op,
            path: StatePath::from(path),
            value,
        }
    }

    #[test]
    fn parse_and_display() {
        let p = StatePath::parse("order.items").unwrap();
        assert_eq!(p.segments(), ["order", "items"]);
        assert_eq!(p.to_string(), "order.items");
        assert!(StatePath::parse("a..b").is_err());
        assert!(StatePath::parse("").unwrap().is_root());
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut s = json!({});
        StatePath::from("a.b.c").set(&mut s, json!(1)).unwrap();
        assert_eq!(s, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut s = json!({"a": 5});
        let err = StatePath::from("a.b").set(&mut s, json!(1)).unwrap_err();
        assert_eq!(err, StateError::NotAnObject { path: "a".into() });
    }

    #[test]
    fn update_merges_objects_and_replaces_scalars() {
        let mut s = json!({"cfg": {"a": 1, "nested": {"x": 1}}, "n": 1});
        apply(&mut s, ModifyOp::Update, &"cfg".into(), json!({"b": 2, "nested": {"y": 2}}))
            .unwrap();
        apply(&mut s, ModifyOp::Update, &"n".into(), json!(2)).unwrap();
        assert_eq!(
            s,
            json!({"cfg": {"a": 1, "b": 2, "nested": {"x": 1, "y": 2}}, "n": 2})
        );
    }

    #[test]
    fn delete_missing_is_noop() {
        let mut s = json!({"a": 1});
        apply(&mut s, ModifyOp::Delete, &"b.c".into(), Value::Null).unwrap();
        apply(&mut s, ModifyOp::Delete, &"a".into(), Value::Null).unwrap();
        assert_eq!(s, json!({}));
    }

    #[test]
    fn replace_must_stay_an_object() {
        let mut s = json!({"a": 1});
        apply(&mut s, ModifyOp::Replace, &StatePath::root(), json!({"b": 2})).unwrap();
        assert_eq!(s, json!({"b": 2}));
        let err = apply(&mut s, ModifyOp::Replace, &StatePath::root(), json!([1])).unwrap_err();
        assert!(matches!(err, StateError::Validation(ValidationError::StateNotObject(_))));
    }

    #[test]
    fn fold_is_left_to_right() {
        let effects = vec![
            modify(ModifyOp::Set, "count", json!(1)),
            modify(ModifyOp::Set, "count", json!(2)),
            modify(ModifyOp::Update, "meta", json!({"seen": true})),
            modify(ModifyOp::Delete, "tmp", Value::Null),
        ];
        let s = fold(json!({"tmp": 1}), &effects).unwrap();
        assert_eq!(s, json!({"count": 2, "meta": {"seen": true}}));
    }

    #[test]
    fn scratch_is_versioned() {
        let mut s = json!({"domain": 1});
        ensure_scratch(&mut s).unwrap();
        assert_eq!(s[RUNNER_FIELD]["version"], json!(RUNNER_SCRATCH_VERSION));
        assert_eq!(s["domain"], json!(1));
    }
}
