//! Manifest dialect detection and parsing into the untyped tree.

use crate::ini;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use thiserror::Error;

/// On-disk manifest encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Structured `key: value` form.
    Yaml,
    /// Flat `key[sub] = value` form.
    Ini,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Yaml => f.write_str("yaml"),
            Dialect::Ini => f.write_str("ini"),
        }
    }
}

/// Malformed manifest text in one dialect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{dialect} syntax error{}: {message}",
    .line.map(|l| format!(" at line {l}")).unwrap_or_default()
)]
pub struct ParseError {
    pub dialect: Dialect,
    pub line: Option<usize>,
    pub message: String,
}

fn has_yaml_core(raw: &str) -> bool {
    raw.lines().any(|line| line.trim_start().starts_with("core:"))
}

fn has_ini_core(raw: &str) -> bool {
    raw.lines().any(|line| {
        line.trim_start()
            .strip_prefix("core")
            .is_some_and(|rest| rest.trim_start().starts_with('='))
    })
}

fn parse_yaml(raw: &str) -> Result<Value, ParseError> {
    if raw.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    let tree: Value = serde_yaml::from_str(raw).map_err(|e| ParseError {
        dialect: Dialect::Yaml,
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    })?;
    match tree {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        Value::Mapping(_) => Ok(tree),
        _ => Err(ParseError {
            dialect: Dialect::Yaml,
            line: None,
            message: "top-level value must be a mapping".to_owned(),
        }),
    }
}

/// Parse `raw` in a known dialect.
pub fn parse(raw: &str, dialect: Dialect) -> Result<Value, ParseError> {
    match dialect {
        Dialect::Yaml => parse_yaml(raw),
        Dialect::Ini => ini::parse(raw),
    }
}

/// Detect the dialect of `raw` and parse it.
///
/// A top-level `core:` line selects YAML and a `core =` line selects INI.
/// Fragments without a `core` key are tried as YAML first, then as INI; when
/// both fail the YAML error is returned.
pub fn parse_detected(raw: &str) -> Result<(Value, Dialect), ParseError> {
    if has_yaml_core(raw) {
        return parse_yaml(raw).map(|tree| (tree, Dialect::Yaml));
    }
    if has_ini_core(raw) {
        return ini::parse(raw).map(|tree| (tree, Dialect::Ini));
    }
    match parse_yaml(raw) {
        Ok(tree) => Ok((tree, Dialect::Yaml)),
        Err(yaml_err) => ini::parse(raw)
            .map(|tree| (tree, Dialect::Ini))
            .map_err(|_| yaml_err),
    }
}

/// Decide which dialect `raw` is written in.
///
/// Input that parses in neither dialect is reported as YAML, so that parsing
/// it surfaces the YAML syntax error.
pub fn detect(raw: &str) -> Dialect {
    parse_detected(raw).map_or(Dialect::Yaml, |(_, dialect)| dialect)
}
