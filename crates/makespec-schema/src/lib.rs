//! Manifest dialects, normalization, validation and pruning for makespec.
//!
//! This crate is the schema layer: it detects and parses the two manifest
//! dialects into an untyped tree (`dialect`, `ini`), rewrites shorthand entries
//! into their canonical shape (`normalize`), converts the tree into the typed
//! [`Manifest`], and provides the checks and transforms applied to a resolved
//! manifest (`defaults`, `validate`, `prune`). It does no I/O beyond reading a
//! single local file; include resolution lives in `makespec-core`.

pub mod defaults;
pub mod dialect;
pub mod ini;
pub mod manifest;
pub mod normalize;
pub mod prune;
pub mod tree;
pub mod types;
pub mod validate;

pub use defaults::apply_defaults;
pub use dialect::{detect, parse, parse_detected, Dialect, ParseError};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, DownloadKind, DownloadSpec, EntrySection, EntrySpec,
    IncludeRef, Manifest, ManifestError, PatchSpec, SectionKind,
};
pub use normalize::normalize;
pub use prune::{prune, PruneSet, WILDCARD};
pub use tree::{deep_merge, move_core_first, PLATFORM_CORE_PROJECT};
pub use types::{AttributeName, EntryName};
pub use validate::{
    is_safe_path, normalize_core_version, validate, ExternalValidationHook, FnHook,
    ValidationError, ValidationOptions, Validator, SUPPORTED_API_VERSION,
};
