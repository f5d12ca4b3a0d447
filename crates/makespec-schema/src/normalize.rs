use crate::tree::{
    deep_merge, is_numeric_key, key_to_string, scalar_to_string, sequence_to_mapping,
};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;

/// Sections holding named entries.
pub const ENTRY_SECTIONS: [&str; 2] = ["projects", "libraries"];

/// Rewrite shorthand entries into the canonical `{name: {attributes}}` shape.
///
/// For `projects` and `libraries`:
/// - `name: "1.x"` becomes `name: {version: "1.x"}`;
/// - `0: name` (a list element) becomes `name: {}`, unless `name` is already
///   declared, in which case the element is left alone so validation can
///   report the duplicate;
/// - `download: "url"` becomes `download: {url: "url"}`;
/// - `patch` is folded into `patches`.
///
/// Applying it twice yields the same tree.
pub fn normalize(mut tree: Value) -> Value {
    if let Value::Mapping(root) = &mut tree {
        for section in ENTRY_SECTIONS {
            if let Some(value) = root.get_mut(section) {
                let current = std::mem::replace(value, Value::Null);
                *value = normalize_section(current);
            }
        }
    }
    tree
}

fn normalize_section(section: Value) -> Value {
    let entries = match sequence_to_mapping(section) {
        Value::Mapping(entries) => entries,
        other => return other,
    };

    let declared: HashSet<String> = entries
        .keys()
        .filter(|k| !is_numeric_key(k))
        .map(key_to_string)
        .collect();
    let mut emitted: HashSet<String> = HashSet::new();

    let mut out = Mapping::with_capacity(entries.len());
    for (key, value) in entries {
        if is_numeric_key(&key) {
            if let Some(name) = value.as_str().map(str::to_owned) {
                if !declared.contains(&name) && emitted.insert(name.clone()) {
                    out.insert(Value::String(name), Value::Mapping(Mapping::new()));
                    continue;
                }
            }
            out.insert(key, value);
            continue;
        }

        let entry = match value {
            Value::Mapping(attributes) => Value::Mapping(normalize_attributes(attributes)),
            Value::Null => Value::Mapping(Mapping::new()),
            other => match scalar_to_string(&other) {
                Some(version) => {
                    let mut attributes = Mapping::new();
                    attributes.insert("version".into(), Value::String(version));
                    Value::Mapping(attributes)
                }
                None => other,
            },
        };
        emitted.insert(key_to_string(&key));
        out.insert(key, entry);
    }
    Value::Mapping(out)
}

fn normalize_attributes(mut attributes: Mapping) -> Mapping {
    if let Some(patch) = attributes.remove("patch") {
        let merged = match attributes.remove("patches") {
            Some(patches) => deep_merge(sequence_to_mapping(patch), sequence_to_mapping(patches)),
            None => patch,
        };
        attributes.insert("patches".into(), merged);
    }
    if let Some(download) = attributes.get_mut("download") {
        if let Value::String(url) = download {
            let mut spec = Mapping::new();
            spec.insert("url".into(), Value::String(std::mem::take(url)));
            *download = Value::Mapping(spec);
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(input: &str) -> Value {
        serde_yaml::from_str(input).unwrap()
    }

    #[test]
    fn version_shorthand_expands() {
        let tree = normalize(yaml("projects:\n  views: '3.x'\n  token: 1"));
        assert_eq!(
            tree,
            yaml("projects:\n  views:\n    version: '3.x'\n  token:\n    version: '1'")
        );
    }

    #[test]
    fn list_entries_become_names() {
        let tree = normalize(yaml("libraries:\n  - jquery\n  - colorbox"));
        assert_eq!(tree, yaml("libraries:\n  jquery: {}\n  colorbox: {}"));
    }

    #[test]
    fn download_string_becomes_url() {
        let tree = normalize(yaml("projects:\n  foo:\n    download: https://example.com/foo.tgz"));
        assert_eq!(
            tree,
            yaml("projects:\n  foo:\n    download:\n      url: https://example.com/foo.tgz")
        );
    }

    #[test]
    fn colliding_list_entry_is_left_for_validation() {
        let tree = normalize(yaml("projects:\n  foo: '1.x'\n  1: foo"));
        let projects = tree["projects"].as_mapping().unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[&Value::Number(1.into())], Value::String("foo".into()));
    }

    #[test]
    fn repeated_list_entry_is_left_for_validation() {
        let tree = normalize(yaml("projects:\n  - foo\n  - foo"));
        let projects = tree["projects"].as_mapping().unwrap();
        assert_eq!(projects.len(), 2);
        assert!(projects.contains_key("foo"));
    }

    #[test]
    fn patch_key_is_folded_into_patches() {
        let tree = normalize(yaml(
            "projects:\n  foo:\n    patch:\n      - a.patch\n    patches:\n      fix: b.patch",
        ));
        assert_eq!(
            tree["projects"]["foo"],
            yaml("patches:\n  0: a.patch\n  fix: b.patch")
        );
    }

    #[test]
    fn null_entry_becomes_empty_mapping() {
        let tree = normalize(yaml("projects:\n  drupal:"));
        assert_eq!(tree, yaml("projects:\n  drupal: {}"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = yaml(
            "projects:\n  foo: '1.x'\n  1: foo\n  2: bar\n  baz:\n    download: git://x\nlibraries:\n  - jquery",
        );
        let once = normalize(input);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn other_sections_are_untouched() {
        let input = yaml("core: 8.x\nincludes:\n  - base.make.yml");
        assert_eq!(normalize(input.clone()), input);
    }
}
