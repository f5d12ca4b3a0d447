//! Manifest validation.
//!
//! Every violation is collected before failing, so a single run reports all
//! problems in a manifest. Defaults are applied first, so defaulted paths are
//! checked like any other.

use crate::defaults::apply_defaults;
use crate::manifest::{Manifest, SectionKind};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Manifest API version this resolver understands.
pub const SUPPORTED_API_VERSION: u32 = 2;

static CORE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(\.(x|\d+(-[a-z0-9]+)?))?$").expect("valid core version pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required attribute '{attribute}'")]
    MissingAttribute { attribute: String },
    #[error("invalid core version '{value}': expected MAJOR, MAJOR.x or MAJOR.MINOR[-suffix]")]
    BadVersionGrammar { value: String },
    #[error("api version {found} is not supported (expected {supported})")]
    ApiVersionMismatch { found: u32, supported: u32 },
    #[error("duplicate {} '{name}' in {section}", .section.singular())]
    DuplicateName { section: SectionKind, name: String },
    #[error("unsafe path in {section} entry '{name}': {attribute} = '{value}'")]
    UnsafePath {
        section: SectionKind,
        name: String,
        attribute: String,
        value: String,
    },
    #[error("no projects or libraries left after pruning")]
    EmptyAfterPrune,
    #[error("validation hook '{hook}' failed: {message}")]
    ExternalHookFailed { hook: String, message: String },
}

/// Whether a path fragment stays inside its install root.
///
/// Rejects absolute paths, a leading `..`, and any `..` segment.
pub fn is_safe_path(value: &str) -> bool {
    !(value.starts_with('/')
        || value.starts_with("..")
        || value.contains("/../")
        || value.ends_with("/.."))
}

/// Split a core version into its `MAJOR.x` form and the exact point release.
///
/// `8`, `8.x` and `8.2-rc1` all normalize to `8.x`; the release is `None`
/// unless a minor version was given.
pub fn normalize_core_version(value: &str) -> Result<(String, Option<String>), ValidationError> {
    let captures = CORE_VERSION
        .captures(value)
        .ok_or_else(|| ValidationError::BadVersionGrammar {
            value: value.to_owned(),
        })?;
    let major = &captures[1];
    let release = match captures.get(3).map(|m| m.as_str()) {
        None | Some("x") => None,
        Some(_) => Some(value.to_owned()),
    };
    Ok((format!("{major}.x"), release))
}

/// Knobs that change how strictly a manifest is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    pub api_version: u32,
    /// Downgrade api mismatches and empty prunes to warnings.
    pub force: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            api_version: SUPPORTED_API_VERSION,
            force: false,
        }
    }
}

/// A caller-supplied check run after the built-in validation.
///
/// A hook either returns a (possibly modified) manifest, which replaces the
/// current one, or a failure message.
pub trait ExternalValidationHook: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, manifest: &Manifest) -> Result<Manifest, String>;
}

/// Adapts a closure into an [`ExternalValidationHook`].
pub struct FnHook<F> {
    name: String,
    check: F,
}

impl<F> FnHook<F>
where
    F: Fn(&Manifest) -> Result<Manifest, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> ExternalValidationHook for FnHook<F>
where
    F: Fn(&Manifest) -> Result<Manifest, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, manifest: &Manifest) -> Result<Manifest, String> {
        (self.check)(manifest)
    }
}

#[derive(Default)]
pub struct Validator {
    options: ValidationOptions,
    hooks: Vec<Box<dyn ExternalValidationHook>>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("options", &self.options)
            .field(
                "hooks",
                &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            options,
            hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_hook(mut self, hook: impl ExternalValidationHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    /// Check `manifest` and return its validated, normalized copy.
    pub fn validate(&self, manifest: &Manifest) -> Result<Manifest, Vec<ValidationError>> {
        let mut manifest = manifest.clone();
        let mut errors = Vec::new();

        match manifest.core_version.as_deref() {
            None => errors.push(ValidationError::MissingAttribute {
                attribute: "core".to_owned(),
            }),
            Some(core) => match normalize_core_version(core) {
                Ok((major, release)) => {
                    manifest.core_version = Some(major);
                    if release.is_some() {
                        manifest.core_release = release;
                    }
                }
                Err(e) => errors.push(e),
            },
        }

        let supported = self.options.api_version;
        match manifest.api_version {
            None => {
                warn!("no api version given, assuming {supported}");
                manifest.api_version = Some(supported);
            }
            Some(found) if found != supported => {
                if self.options.force {
                    warn!(
                        "api version {found} is not supported (expected {supported}); \
                         continuing because force is set"
                    );
                } else {
                    errors.push(ValidationError::ApiVersionMismatch { found, supported });
                }
            }
            Some(_) => {}
        }

        apply_defaults(&mut manifest);

        for (name, spec) in manifest.libraries.iter_mut() {
            if spec.contrib_destination.take().is_some() {
                debug!("dropping contrib_destination from library '{name}'");
            }
        }

        for kind in SectionKind::ALL {
            check_section(&manifest, kind, &mut errors);
        }

        for hook in &self.hooks {
            debug!("running validation hook '{}'", hook.name());
            match hook.check(&manifest) {
                Ok(updated) => manifest = updated,
                Err(message) => errors.push(ValidationError::ExternalHookFailed {
                    hook: hook.name().to_owned(),
                    message,
                }),
            }
        }

        if errors.is_empty() {
            Ok(manifest)
        } else {
            Err(errors)
        }
    }
}

fn check_section(manifest: &Manifest, kind: SectionKind, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for (name, spec) in manifest.section(kind).iter() {
        if !seen.insert(name.as_str()) && reported.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                section: kind,
                name: name.to_string(),
            });
        }
        for (attribute, value) in spec.path_attributes() {
            if !is_safe_path(value) {
                errors.push(ValidationError::UnsafePath {
                    section: kind,
                    name: name.to_string(),
                    attribute: attribute.to_owned(),
                    value: value.to_owned(),
                });
            }
        }
    }
}

/// Validate with default options and no hooks.
pub fn validate(manifest: &Manifest) -> Result<Manifest, Vec<ValidationError>> {
    Validator::default().validate(manifest)
}
