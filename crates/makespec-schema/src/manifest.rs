use crate::dialect::{parse_detected, Dialect, ParseError};
use crate::normalize::normalize;
use crate::tree::{
    deep_merge, is_numeric_key, key_to_string, scalar_to_string, sequence_to_mapping,
    PLATFORM_CORE_PROJECT,
};
use crate::types::EntryName;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] ParseError),
    #[error("invalid value for '{key}': {message}")]
    InvalidField { key: String, message: String },
    #[error("invalid {section} entry '{name}': {message}")]
    InvalidEntry {
        section: SectionKind,
        name: String,
        message: String,
    },
    #[error("invalid include reference: {0}")]
    InvalidInclude(String),
}

fn invalid_field(key: &str, message: impl Into<String>) -> ManifestError {
    ManifestError::InvalidField {
        key: key.to_owned(),
        message: message.into(),
    }
}

/// The two sections holding named entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Projects,
    Libraries,
}

impl SectionKind {
    pub const ALL: [SectionKind; 2] = [SectionKind::Projects, SectionKind::Libraries];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Projects => "projects",
            SectionKind::Libraries => "libraries",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            SectionKind::Projects => "project",
            SectionKind::Libraries => "library",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "projects" => Ok(SectionKind::Projects),
            "libraries" => Ok(SectionKind::Libraries),
            other => Err(format!("unknown section '{other}'")),
        }
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a string or number")),
    }
}

fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::Number(n)) => Ok(Some(n.as_f64() != Some(0.0))),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "" | "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("expected a boolean, found '{other}'"))),
        },
        Some(_) => Err(D::Error::custom("expected a boolean")),
    }
}

fn patch_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, PatchSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    match sequence_to_mapping(value) {
        Value::Null => Ok(BTreeMap::new()),
        Value::Mapping(entries) => entries
            .into_iter()
            .map(|(key, patch)| {
                let patch = serde_yaml::from_value::<PatchSpec>(patch).map_err(D::Error::custom)?;
                Ok((key_to_string(&key), patch))
            })
            .collect(),
        single @ Value::String(_) => {
            let patch = serde_yaml::from_value::<PatchSpec>(single).map_err(D::Error::custom)?;
            Ok(BTreeMap::from([("0".to_owned(), patch)]))
        }
        _ => Err(D::Error::custom("expected a list or mapping of patches")),
    }
}

/// How an entry's source is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DownloadKind {
    /// Plain file download.
    Url,
    /// Version-control checkout (`git`, `svn`, ...).
    Vcs { system: String },
}

impl From<String> for DownloadKind {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "file" | "get" | "url" => DownloadKind::Url,
            system => DownloadKind::Vcs {
                system: system.to_owned(),
            },
        }
    }
}

impl From<DownloadKind> for String {
    fn from(kind: DownloadKind) -> Self {
        match kind {
            DownloadKind::Url => "file".to_owned(),
            DownloadKind::Vcs { system } => system,
        }
    }
}

/// Where an entry is downloaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DownloadRepr")]
pub struct DownloadSpec {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<DownloadKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DownloadRepr {
    Url(String),
    Fields(DownloadFields),
}

#[derive(Deserialize)]
struct DownloadFields {
    #[serde(rename = "type", default)]
    kind: Option<DownloadKind>,
    #[serde(default, deserialize_with = "scalar_string")]
    url: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    branch: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    tag: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    revision: Option<String>,
}

impl From<DownloadRepr> for DownloadSpec {
    fn from(repr: DownloadRepr) -> Self {
        match repr {
            DownloadRepr::Url(url) => DownloadSpec::from_url(url),
            DownloadRepr::Fields(f) => DownloadSpec {
                kind: f.kind,
                url: f.url,
                branch: f.branch,
                tag: f.tag,
                revision: f.revision,
            },
        }
    }
}

impl DownloadSpec {
    /// The canonical form of a bare `download: <url>` shorthand.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Effective kind; an unspecified type is a plain URL download.
    pub fn kind(&self) -> DownloadKind {
        self.kind.clone().unwrap_or(DownloadKind::Url)
    }

    /// VCS system name when this is a checkout.
    pub fn vcs_system(&self) -> Option<&str> {
        match &self.kind {
            Some(DownloadKind::Vcs { system }) => Some(system),
            _ => None,
        }
    }

    pub fn fill_from(&mut self, defaults: &DownloadSpec) {
        fill(&mut self.kind, &defaults.kind);
        fill(&mut self.url, &defaults.url);
        fill(&mut self.branch, &defaults.branch);
        fill(&mut self.tag, &defaults.tag);
        fill(&mut self.revision, &defaults.revision);
    }
}

/// A patch applied to an entry: a bare URL or `{url, md5}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchSpec {
    Url(String),
    Detailed {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        md5: Option<String>,
    },
}

impl PatchSpec {
    pub fn url(&self) -> &str {
        match self {
            PatchSpec::Url(url) | PatchSpec::Detailed { url, .. } => url,
        }
    }
}

/// Attributes of a project or library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrySpec {
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadSpec>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub subdir: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub directory_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub contrib_destination: Option<String>,
    /// Library install location.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub destination: Option<String>,
    #[serde(
        default,
        alias = "patch",
        deserialize_with = "patch_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub patches: BTreeMap<String, PatchSpec>,
    #[serde(
        default,
        deserialize_with = "loose_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub working_copy: Option<bool>,
    /// Attributes this resolver does not interpret, kept for output.
    #[serde(flatten)]
    pub extra: Mapping,
}

fn fill<T: Clone>(slot: &mut Option<T>, default: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(default);
    }
}

impl EntrySpec {
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Whether the entry named `name` is the platform core.
    pub fn is_core(&self, name: &str) -> bool {
        name == PLATFORM_CORE_PROJECT || self.kind.as_deref() == Some("core")
    }

    /// Fill every attribute this entry leaves unset from `defaults`.
    pub fn fill_from(&mut self, defaults: &EntrySpec) {
        fill(&mut self.version, &defaults.version);
        fill(&mut self.kind, &defaults.kind);
        fill(&mut self.subdir, &defaults.subdir);
        fill(&mut self.directory_name, &defaults.directory_name);
        fill(&mut self.contrib_destination, &defaults.contrib_destination);
        fill(&mut self.destination, &defaults.destination);
        fill(&mut self.working_copy, &defaults.working_copy);

        if let Some(download) = &defaults.download {
            self.download
                .get_or_insert_with(DownloadSpec::default)
                .fill_from(download);
        }
        for (label, patch) in &defaults.patches {
            self.patches
                .entry(label.clone())
                .or_insert_with(|| patch.clone());
        }
        if !defaults.extra.is_empty() {
            let own = std::mem::take(&mut self.extra);
            if let Value::Mapping(merged) =
                deep_merge(Value::Mapping(defaults.extra.clone()), Value::Mapping(own))
            {
                self.extra = merged;
            }
        }
    }

    /// Path-like attributes present on this entry, by attribute name.
    pub fn path_attributes(&self) -> Vec<(&'static str, &str)> {
        [
            ("subdir", &self.subdir),
            ("directory_name", &self.directory_name),
            ("contrib_destination", &self.contrib_destination),
            ("destination", &self.destination),
        ]
        .into_iter()
        .filter_map(|(attribute, value)| value.as_deref().map(|v| (attribute, v)))
        .collect()
    }
}

/// Ordered entries of one section.
///
/// Unlike a map this keeps repeated names, so that duplicates produced by
/// shorthand forms survive until validation reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntrySection {
    entries: Vec<(EntryName, EntrySpec)>,
}

impl EntrySection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, even if the name is already present.
    pub fn push(&mut self, name: impl Into<EntryName>, spec: EntrySpec) {
        self.entries.push((name.into(), spec));
    }

    /// Replace the first entry named `name`, or append it.
    pub fn insert(&mut self, name: impl Into<EntryName>, spec: EntrySpec) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.entries.push((name, spec)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EntrySpec> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, spec)| spec)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EntrySpec> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, spec)| spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntryName, &EntrySpec)> + '_ {
        self.entries.iter().map(|(n, s)| (n, s))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntryName, &mut EntrySpec)> + '_ {
        self.entries.iter_mut().map(|(n, s)| (&*n, s))
    }

    pub fn names(&self) -> impl Iterator<Item = &EntryName> + '_ {
        self.entries.iter().map(|(n, _)| n)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&EntryName, &EntrySpec) -> bool) {
        self.entries.retain(|(n, s)| keep(n, s));
    }
}

impl FromIterator<(EntryName, EntrySpec)> for EntrySection {
    fn from_iter<I: IntoIterator<Item = (EntryName, EntrySpec)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for EntrySection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, spec) in &self.entries {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

/// Reference to another manifest from `includes` or `overrides`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IncludeRef {
    /// URL, or path relative to the including manifest or the working directory.
    Path(String),
    /// Manifest file inside a version-control checkout.
    VcsFetch {
        #[serde(rename = "makefile")]
        repo_manifest_path: String,
        #[serde(rename = "download")]
        vcs: DownloadSpec,
    },
}

impl IncludeRef {
    pub fn from_value(value: &Value) -> Result<Self, ManifestError> {
        match value {
            Value::String(path) => Ok(IncludeRef::Path(path.clone())),
            Value::Mapping(fields) => {
                let repo_manifest_path = fields
                    .get("makefile")
                    .and_then(scalar_to_string)
                    .ok_or_else(|| {
                        ManifestError::InvalidInclude(
                            "VCS include requires a 'makefile' attribute".to_owned(),
                        )
                    })?;
                let vcs: DownloadSpec = match fields.get("download") {
                    Some(download) => serde_yaml::from_value(download.clone())
                        .map_err(|e| ManifestError::InvalidInclude(e.to_string()))?,
                    None => {
                        return Err(ManifestError::InvalidInclude(format!(
                            "VCS include '{repo_manifest_path}' requires a 'download' attribute"
                        )))
                    }
                };
                if vcs.url.is_none() {
                    return Err(ManifestError::InvalidInclude(format!(
                        "VCS include '{repo_manifest_path}' has no download url"
                    )));
                }
                Ok(IncludeRef::VcsFetch {
                    repo_manifest_path,
                    vcs,
                })
            }
            other => Err(ManifestError::InvalidInclude(format!(
                "expected a path or a VCS mapping, found '{}'",
                key_to_string(other)
            ))),
        }
    }

    /// Parse an `includes`/`overrides` list (sequence, indexed map or single path).
    pub fn list_from_value(value: Option<&Value>) -> Result<Vec<Self>, ManifestError> {
        match value {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(path)) => Ok(vec![IncludeRef::Path(path.clone())]),
            Some(value) => match sequence_to_mapping(value.clone()) {
                Value::Mapping(refs) => refs.values().map(IncludeRef::from_value).collect(),
                other => Err(ManifestError::InvalidInclude(format!(
                    "expected a list of references, found '{}'",
                    key_to_string(&other)
                ))),
            },
        }
    }
}

impl fmt::Display for IncludeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncludeRef::Path(path) => f.write_str(path),
            IncludeRef::VcsFetch {
                repo_manifest_path,
                vcs,
            } => write!(
                f,
                "{repo_manifest_path} from {}",
                vcs.url.as_deref().unwrap_or("<no url>")
            ),
        }
    }
}

/// Typed build manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    #[serde(rename = "core", skip_serializing_if = "Option::is_none")]
    pub core_version: Option<String>,
    /// Exact point release pinned by the author, kept after `core_version`
    /// is normalized to `MAJOR.x`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_release: Option<String>,
    #[serde(rename = "api", skip_serializing_if = "Option::is_none")]
    pub api_version: Option<u32>,
    #[serde(skip_serializing_if = "EntrySection::is_empty")]
    pub projects: EntrySection,
    #[serde(skip_serializing_if = "EntrySection::is_empty")]
    pub libraries: EntrySection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<IncludeRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<IncludeRef>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, EntrySpec>,
    #[serde(skip)]
    pub detected_format: Option<Dialect>,
}

impl Manifest {
    pub fn section(&self, kind: SectionKind) -> &EntrySection {
        match kind {
            SectionKind::Projects => &self.projects,
            SectionKind::Libraries => &self.libraries,
        }
    }

    pub fn section_mut(&mut self, kind: SectionKind) -> &mut EntrySection {
        match kind {
            SectionKind::Projects => &mut self.projects,
            SectionKind::Libraries => &mut self.libraries,
        }
    }

    /// Platform major version from `core_version` (`8` for `8.x`).
    pub fn core_major(&self) -> Option<u32> {
        let core = self.core_version.as_deref()?;
        core.split('.').next()?.parse().ok()
    }

    /// Convert a normalized tree into the typed model.
    pub fn from_tree(tree: &Value, detected_format: Option<Dialect>) -> Result<Self, ManifestError> {
        let root = match tree {
            Value::Mapping(root) => root,
            Value::Null => {
                return Ok(Self {
                    detected_format,
                    ..Self::default()
                })
            }
            _ => return Err(invalid_field("<root>", "manifest must be a mapping")),
        };

        let core_version = match root.get("core") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                scalar_to_string(value)
                    .ok_or_else(|| invalid_field("core", "expected a version string"))?,
            ),
        };
        let api_version = match root.get("api") {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_api(value)?),
        };

        Ok(Self {
            core_version,
            core_release: None,
            api_version,
            projects: parse_section(SectionKind::Projects, root.get("projects"))?,
            libraries: parse_section(SectionKind::Libraries, root.get("libraries"))?,
            includes: IncludeRef::list_from_value(root.get("includes"))?,
            overrides: IncludeRef::list_from_value(root.get("overrides"))?,
            defaults: parse_defaults(root.get("defaults"))?,
            detected_format,
        })
    }
}

fn parse_api(value: &Value) -> Result<u32, ManifestError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        invalid_field(
            "api",
            format!("expected an integer, found '{}'", key_to_string(value)),
        )
    })
}

fn parse_section(kind: SectionKind, value: Option<&Value>) -> Result<EntrySection, ManifestError> {
    let Some(value) = value else {
        return Ok(EntrySection::new());
    };
    let entries = match sequence_to_mapping(value.clone()) {
        Value::Mapping(entries) => entries,
        Value::Null => return Ok(EntrySection::new()),
        _ => {
            return Err(invalid_field(
                kind.as_str(),
                "expected a mapping or list of entries",
            ))
        }
    };

    let mut section = EntrySection::new();
    for (key, value) in entries {
        let key_name = key_to_string(&key);
        match value {
            Value::Mapping(_) => {
                let spec = serde_yaml::from_value::<EntrySpec>(value).map_err(|e| {
                    ManifestError::InvalidEntry {
                        section: kind,
                        name: key_name.clone(),
                        message: e.to_string(),
                    }
                })?;
                section.push(key_name, spec);
            }
            Value::Null => section.push(key_name, EntrySpec::default()),
            other => match scalar_to_string(&other) {
                Some(name) if is_numeric_key(&key) => section.push(name, EntrySpec::default()),
                Some(version) => section.push(key_name, EntrySpec::with_version(version)),
                None => {
                    return Err(ManifestError::InvalidEntry {
                        section: kind,
                        name: key_name,
                        message: "expected attributes or a version string".to_owned(),
                    })
                }
            },
        }
    }
    Ok(section)
}

fn parse_defaults(value: Option<&Value>) -> Result<BTreeMap<String, EntrySpec>, ManifestError> {
    let Some(Value::Mapping(sections)) = value else {
        return match value {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(_) => Err(invalid_field("defaults", "expected a mapping of sections")),
        };
    };
    sections
        .iter()
        .map(|(section, attributes)| {
            let name = key_to_string(section);
            let spec = match attributes {
                Value::Null => EntrySpec::default(),
                _ => serde_yaml::from_value::<EntrySpec>(attributes.clone()).map_err(|e| {
                    invalid_field(&format!("defaults.{name}"), e.to_string())
                })?,
            };
            Ok((name, spec))
        })
        .collect()
}

/// Parse and normalize a single manifest without resolving its includes.
pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    let (tree, dialect) = parse_detected(input)?;
    Manifest::from_tree(&normalize(tree), Some(dialect))
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
