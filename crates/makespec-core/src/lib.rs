//! Resolution pipeline for makespec build manifests.
//!
//! This crate ties the schema layer and the fetch layer together into the
//! [`Resolver`]: it reads a manifest from a file, standard input or a URL,
//! recursively merges its includes and overrides (staging version-control
//! checkouts in a temporary directory), prunes and validates the result. The
//! [`convert`] module turns a resolved manifest into a composer-style
//! dependency manifest.

pub mod convert;
pub mod resolver;
pub mod source;
pub mod staging;

pub use convert::{convert, to_json_pretty, DependencyManifest, InstallCategory};
pub use resolver::{OverridePolicy, Resolution, Resolver, ResolverConfig};
pub use source::{read_input, Location, ManifestSource, STDIN_SENTINEL};
pub use staging::{SystemTempDir, TempDirProvider};

use makespec_remote::FetchError;
use makespec_schema::{ManifestError, ValidationError};
use thiserror::Error;

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error in {origin}: {source}")]
    Manifest {
        origin: String,
        source: ManifestError,
    },
    #[error("failed to fetch '{reference}': {source}")]
    FetchFailed {
        reference: String,
        source: FetchError,
    },
    #[error("include not found: {0}")]
    MissingInclude(String),
    #[error("include path escapes its checkout: {0}")]
    UnsafeInclude(String),
    #[error("cyclic include: {0}")]
    CyclicInclude(String),
    #[error("no input: standard input was empty")]
    NoInput,
    #[error("invalid manifest {context}: {}", join_errors(.errors))]
    Invalid {
        context: String,
        errors: Vec<ValidationError>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
