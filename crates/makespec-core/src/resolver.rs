//! Top-level manifest resolution.
//!
//! A resolve call reads the source manifest, recursively merges its
//! `includes` (the including manifest wins) and `overrides` (the override
//! wins, subject to [`OverridePolicy`]), optionally prunes the result, and
//! validates it. Version-control includes are checked out into a temporary
//! directory that lives for exactly one resolve call.

use crate::source::{read_input, Location, ManifestSource};
use crate::staging::{Staging, SystemTempDir, TempDirProvider};
use crate::CoreError;
use makespec_remote::{parse_remote, FetchError, ManifestFetcher};
use makespec_schema::tree::key_to_string;
use makespec_schema::{
    deep_merge, is_safe_path, move_core_first, normalize, parse_detected, prune, AttributeName,
    ExternalValidationHook, IncludeRef, Manifest, PruneSet, ValidationOptions, Validator,
    SUPPORTED_API_VERSION,
};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Which top-level keys an override manifest may replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OverridePolicy {
    #[default]
    All,
    None,
    Allow(BTreeSet<AttributeName>),
}

impl OverridePolicy {
    pub fn allows(&self, key: &str) -> bool {
        match self {
            OverridePolicy::All => true,
            OverridePolicy::None => false,
            OverridePolicy::Allow(keys) => keys.iter().any(|k| k == key),
        }
    }
}

impl FromStr for OverridePolicy {
    type Err = String;

    /// `all`, `none`, or a comma-separated list of top-level keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(OverridePolicy::All),
            "none" | "" => Ok(OverridePolicy::None),
            list => {
                let keys: BTreeSet<AttributeName> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(AttributeName::from)
                    .collect();
                if keys.is_empty() {
                    return Err(format!("invalid override policy '{s}'"));
                }
                Ok(OverridePolicy::Allow(keys))
            }
        }
    }
}

impl fmt::Display for OverridePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverridePolicy::All => f.write_str("all"),
            OverridePolicy::None => f.write_str("none"),
            OverridePolicy::Allow(keys) => {
                let keys: Vec<&str> = keys.iter().map(AttributeName::as_str).collect();
                f.write_str(&keys.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub api_version: u32,
    pub force: bool,
    /// Keep the staging directory after the call and report its path.
    pub keep_temp: bool,
    pub override_policy: OverridePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_version: SUPPORTED_API_VERSION,
            force: false,
            keep_temp: false,
            override_policy: OverridePolicy::All,
        }
    }
}

impl ResolverConfig {
    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            api_version: self.api_version,
            force: self.force,
        }
    }
}

/// A resolved and validated manifest.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub manifest: Manifest,
    /// Display form of the top-level source.
    pub origin: String,
    /// Staging directory left in place because `keep_temp` was set.
    pub kept_temp_dir: Option<PathBuf>,
}

#[derive(Clone, Copy)]
enum RefKind {
    Includes,
    Overrides,
}

impl RefKind {
    fn key(self) -> &'static str {
        match self {
            RefKind::Includes => "includes",
            RefKind::Overrides => "overrides",
        }
    }
}

pub struct Resolver {
    config: ResolverConfig,
    fetcher: Box<dyn ManifestFetcher>,
    temp: Box<dyn TempDirProvider>,
    validator: Validator,
}

impl Resolver {
    pub fn new(config: ResolverConfig, fetcher: impl ManifestFetcher + 'static) -> Self {
        let validator = Validator::new(config.validation_options());
        Self {
            config,
            fetcher: Box::new(fetcher),
            temp: Box::new(SystemTempDir),
            validator,
        }
    }

    #[must_use]
    pub fn with_temp_provider(mut self, provider: impl TempDirProvider + 'static) -> Self {
        self.temp = Box::new(provider);
        self
    }

    /// Register a validation hook; hooks run in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: impl ExternalValidationHook + 'static) -> Self {
        self.validator = self.validator.with_hook(hook);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `source` into a validated manifest, keeping only the entries in
    /// `include_only` when given.
    pub fn resolve(
        &self,
        source: &ManifestSource,
        include_only: Option<&PruneSet>,
    ) -> Result<Resolution, CoreError> {
        let mut staging = Staging::new(self.temp.as_ref());
        let result = self.resolve_with(source, include_only, &mut staging);
        let kept_temp_dir = staging.finish(self.config.keep_temp);
        let manifest = result?;
        info!("resolved {source}");
        Ok(Resolution {
            manifest,
            origin: source.to_string(),
            kept_temp_dir,
        })
    }

    /// Resolve includes and overrides without pruning or validating.
    pub fn load(&self, source: &ManifestSource) -> Result<Manifest, CoreError> {
        let mut staging = Staging::new(self.temp.as_ref());
        let result = self.load_with(source, &mut staging);
        staging.finish(self.config.keep_temp);
        result
    }

    fn load_with(
        &self,
        source: &ManifestSource,
        staging: &mut Staging<'_>,
    ) -> Result<Manifest, CoreError> {
        let (text, location) = self.read_source(source)?;
        let mut session = Session {
            resolver: self,
            staging,
            stack: Vec::new(),
        };
        let (tree, dialect) = session.load(&text, &location)?;
        Manifest::from_tree(&tree, Some(dialect)).map_err(|e| CoreError::Manifest {
            origin: location.to_string(),
            source: e,
        })
    }

    fn resolve_with(
        &self,
        source: &ManifestSource,
        include_only: Option<&PruneSet>,
        staging: &mut Staging<'_>,
    ) -> Result<Manifest, CoreError> {
        let mut manifest = self.load_with(source, staging)?;
        let context = describe(source, &manifest);

        if let Some(keep) = include_only {
            manifest =
                prune(&manifest, keep, self.config.force).map_err(|e| CoreError::Invalid {
                    context: context.clone(),
                    errors: vec![e],
                })?;
        }

        self.validator
            .validate(&manifest)
            .map_err(|errors| CoreError::Invalid { context, errors })
    }

    fn read_source(&self, source: &ManifestSource) -> Result<(String, Location), CoreError> {
        match source {
            ManifestSource::Path(path) => {
                let text = self
                    .fetcher
                    .read_local(path)
                    .map_err(|e| fetch_failed(&path.display().to_string(), e))?;
                Ok((text, Location::file(path)))
            }
            ManifestSource::Stdin => {
                let text = read_input(std::io::stdin().lock())?;
                Ok((text, Location::Stdin))
            }
            ManifestSource::Remote { url, payload } => {
                let text = match payload {
                    Some(text) => text.clone(),
                    None => self
                        .fetcher
                        .read_remote(url)
                        .map_err(|e| fetch_failed(url.as_str(), e))?,
                };
                Ok((text, Location::Remote(url.clone())))
            }
        }
    }
}

fn describe(source: &ManifestSource, manifest: &Manifest) -> String {
    match &manifest.core_version {
        Some(core) => format!("{source} (core {core})"),
        None => source.to_string(),
    }
}

fn fetch_failed(reference: &str, source: FetchError) -> CoreError {
    CoreError::FetchFailed {
        reference: reference.to_owned(),
        source,
    }
}

/// Core project first, then shorthand re-expanded.
fn settle(mut tree: Value) -> Value {
    if let Value::Mapping(root) = &mut tree {
        move_core_first(root);
    }
    normalize(tree)
}

/// State for one recursive load: the staging area and the import stack.
struct Session<'r, 's, 'p> {
    resolver: &'r Resolver,
    staging: &'s mut Staging<'p>,
    stack: Vec<Location>,
}

impl Session<'_, '_, '_> {
    fn load(
        &mut self,
        text: &str,
        location: &Location,
    ) -> Result<(Value, makespec_schema::Dialect), CoreError> {
        if self.stack.contains(location) {
            let mut chain: Vec<String> = self.stack.iter().map(ToString::to_string).collect();
            chain.push(location.to_string());
            return Err(CoreError::CyclicInclude(chain.join(" -> ")));
        }
        debug!("loading {location}");
        self.stack.push(location.clone());

        let (tree, dialect) = parse_detected(text).map_err(|e| CoreError::Manifest {
            origin: location.to_string(),
            source: e.into(),
        })?;
        let tree = normalize(tree);
        let tree = self.merge_refs(tree, location, RefKind::Includes)?;
        let tree = self.merge_refs(tree, location, RefKind::Overrides)?;

        self.stack.pop();
        Ok((tree, dialect))
    }

    fn merge_refs(
        &mut self,
        tree: Value,
        location: &Location,
        kind: RefKind,
    ) -> Result<Value, CoreError> {
        let Value::Mapping(mut root) = tree else {
            return Ok(tree);
        };
        let Some(refs) = root.remove(kind.key()) else {
            return Ok(Value::Mapping(root));
        };
        let refs = IncludeRef::list_from_value(Some(&refs)).map_err(|e| CoreError::Manifest {
            origin: location.to_string(),
            source: e,
        })?;

        let parent = Value::Mapping(root);
        match kind {
            RefKind::Includes => {
                // Later includes layer over earlier ones; the includer wins over all.
                let mut layer = Value::Mapping(Mapping::new());
                for reference in refs {
                    let (child, child_location) = self.load_ref(&reference, location)?;
                    debug!("layering include {child_location} under {location}");
                    layer = settle(deep_merge(layer, child));
                }
                Ok(settle(deep_merge(layer, parent)))
            }
            RefKind::Overrides => {
                let mut merged = parent;
                for reference in refs {
                    let (child, child_location) = self.load_ref(&reference, location)?;
                    debug!("applying override {child_location} to {location}");
                    let child = self.filter_override(child, &child_location);
                    merged = settle(deep_merge(merged, child));
                }
                Ok(merged)
            }
        }
    }

    fn load_ref(
        &mut self,
        reference: &IncludeRef,
        includer: &Location,
    ) -> Result<(Value, Location), CoreError> {
        let (text, child_location) = self.locate(reference, includer)?;
        let (child, _) = self.load(&text, &child_location)?;
        Ok((child, child_location))
    }

    fn filter_override(&self, child: Value, location: &Location) -> Value {
        let policy = &self.resolver.config.override_policy;
        if *policy == OverridePolicy::All {
            return child;
        }
        let Value::Mapping(entries) = child else {
            return child;
        };
        let allowed: Mapping = entries
            .into_iter()
            .filter(|(key, _)| {
                let key = key_to_string(key);
                let allowed = policy.allows(&key);
                if !allowed {
                    warn!("override {location} may not change '{key}'; keeping the original value");
                }
                allowed
            })
            .collect();
        Value::Mapping(allowed)
    }

    fn locate(
        &mut self,
        reference: &IncludeRef,
        includer: &Location,
    ) -> Result<(String, Location), CoreError> {
        match reference {
            IncludeRef::VcsFetch {
                repo_manifest_path,
                vcs,
            } => {
                if !is_safe_path(repo_manifest_path) {
                    return Err(CoreError::UnsafeInclude(reference.to_string()));
                }
                let dest = self.staging.next_path()?;
                let root = self
                    .resolver
                    .fetcher
                    .checkout(vcs, &dest)
                    .map_err(|e| fetch_failed(&reference.to_string(), e))?;
                let path = root.join(repo_manifest_path);
                match self.read_local(&path, reference)? {
                    Some(found) => Ok(found),
                    None => Err(CoreError::MissingInclude(reference.to_string())),
                }
            }
            IncludeRef::Path(path) => self.locate_path(path, reference, includer),
        }
    }

    fn locate_path(
        &self,
        path: &str,
        reference: &IncludeRef,
        includer: &Location,
    ) -> Result<(String, Location), CoreError> {
        if let Some(url) = parse_remote(path) {
            return match self.read_remote(url, reference)? {
                Some(found) => Ok(found),
                None => Err(CoreError::MissingInclude(path.to_owned())),
            };
        }

        let relative = match includer {
            Location::File(file) => {
                let dir = file.parent().unwrap_or_else(|| Path::new("."));
                self.read_local(&dir.join(path), reference)?
            }
            Location::Remote(base) => match base.join(path) {
                Ok(url) => self.read_remote(url, reference)?,
                Err(e) => {
                    debug!("cannot join '{path}' onto {base}: {e}");
                    None
                }
            },
            Location::Stdin => None,
        };
        if let Some(found) = relative {
            return Ok(found);
        }

        match self.read_local(Path::new(path), reference)? {
            Some(found) => Ok(found),
            None => Err(CoreError::MissingInclude(path.to_owned())),
        }
    }

    /// Read a candidate file; `None` when it does not exist.
    fn read_local(
        &self,
        path: &Path,
        reference: &IncludeRef,
    ) -> Result<Option<(String, Location)>, CoreError> {
        match self.resolver.fetcher.read_local(path) {
            Ok(text) => Ok(Some((text, Location::file(path)))),
            Err(e) if e.is_not_found() => {
                debug!("{} not found for '{reference}'", path.display());
                Ok(None)
            }
            Err(e) => Err(fetch_failed(&reference.to_string(), e)),
        }
    }

    fn read_remote(
        &self,
        url: url::Url,
        reference: &IncludeRef,
    ) -> Result<Option<(String, Location)>, CoreError> {
        match self.resolver.fetcher.read_remote(&url) {
            Ok(text) => Ok(Some((text, Location::Remote(url)))),
            Err(e) if e.is_not_found() => {
                debug!("{url} not found for '{reference}'");
                Ok(None)
            }
            Err(e) => Err(fetch_failed(&reference.to_string(), e)),
        }
    }
}
