//! Helpers over the untyped manifest tree shared by both dialects.
//!
//! Both parsers produce a `serde_yaml::Value`, whose mappings keep insertion
//! order. Merging, normalization and core-first reordering all operate on that
//! tree before it is converted into a typed [`crate::Manifest`].

use serde_yaml::{Mapping, Value};

/// Name of the platform core project.
pub const PLATFORM_CORE_PROJECT: &str = "drupal";

/// Recursively merge `over` on top of `base`.
///
/// Mappings merge key by key; any other value in `over` replaces the value in
/// `base`. Keys keep their position from `base`, and keys that only exist in
/// `over` are appended in `over`'s order. A null in `over` leaves the base
/// value untouched.
pub fn deep_merge(base: Value, over: Value) -> Value {
    match (base, over) {
        (Value::Mapping(mut base), Value::Mapping(over)) => {
            for (key, value) in over {
                match base.get_mut(&key) {
                    Some(existing) => {
                        let current = std::mem::replace(existing, Value::Null);
                        *existing = deep_merge(current, value);
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Mapping(base)
        }
        (base, Value::Null) => base,
        (_, over) => over,
    }
}

/// Render a scalar as the string a manifest author would have written.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Render a mapping key; non-scalar keys fall back to their YAML form.
pub fn key_to_string(key: &Value) -> String {
    scalar_to_string(key).unwrap_or_else(|| {
        serde_yaml::to_string(key)
            .map(|s| s.trim().to_owned())
            .unwrap_or_default()
    })
}

/// Whether a key is a list index (`projects[] = foo` or a YAML sequence).
pub fn is_numeric_key(key: &Value) -> bool {
    match key {
        Value::Number(n) => n.is_u64() || n.is_i64(),
        Value::String(s) => !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()),
        _ => false,
    }
}

/// Turn a sequence into a mapping keyed by index; mappings pass through.
pub fn sequence_to_mapping(value: Value) -> Value {
    match value {
        Value::Sequence(items) => Value::Mapping(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (Value::Number((index as u64).into()), item))
                .collect(),
        ),
        other => other,
    }
}

fn is_core_entry(key: &Value, value: &Value) -> bool {
    if key.as_str() == Some(PLATFORM_CORE_PROJECT) {
        return true;
    }
    value
        .as_mapping()
        .and_then(|m| m.get("type"))
        .and_then(Value::as_str)
        == Some("core")
}

/// Move the platform core project to the front of `projects`.
pub fn move_core_first(root: &mut Mapping) {
    let Some(Value::Mapping(projects)) = root.get_mut("projects") else {
        return;
    };
    let Some(position) = projects.iter().position(|(k, v)| is_core_entry(k, v)) else {
        return;
    };
    if position == 0 {
        return;
    }

    let mut entries: Vec<(Value, Value)> = std::mem::take(projects).into_iter().collect();
    let core = entries.remove(position);
    let mut reordered = Mapping::with_capacity(entries.len() + 1);
    reordered.insert(core.0, core.1);
    for (key, value) in entries {
        reordered.insert(key, value);
    }
    *projects = reordered;
}
