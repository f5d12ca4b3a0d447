//! Fetching of manifests for makespec.
//!
//! Include resolution reads manifests from three places: the local
//! filesystem, absolute URLs (HTTP(S) and `file:`), and version-control
//! checkouts. This crate puts all three behind the [`ManifestFetcher`] trait
//! so the resolver can be driven by a stub in tests, and provides
//! [`DefaultFetcher`], which uses `ureq` for HTTP and the `git` binary for
//! checkouts.

pub mod config;
pub mod fetcher;
pub mod git;
pub mod http;

pub use config::FetchConfig;
pub use fetcher::DefaultFetcher;

use makespec_schema::DownloadSpec;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("checkout of {url} failed: {message}")]
    Checkout { url: String, message: String },
    #[error("unsupported version control system '{0}'")]
    UnsupportedVcs(String),
    #[error("download has no url")]
    MissingUrl,
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("refusing download {field} '{value}': looks like a command-line option")]
    OptionLike { field: &'static str, value: String },
}

impl FetchError {
    /// Whether the source simply does not exist, as opposed to failing.
    pub fn is_not_found(&self) -> bool {
        match self {
            FetchError::NotFound(_) => true,
            FetchError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Source of manifest text and version-control checkouts.
pub trait ManifestFetcher: Send + Sync {
    /// Read a manifest from the local filesystem.
    fn read_local(&self, path: &Path) -> Result<String, FetchError>;

    /// Read a manifest named by an absolute URL.
    fn read_remote(&self, url: &Url) -> Result<String, FetchError>;

    /// Check out `download` into `dest` and return the checkout root.
    fn checkout(&self, download: &DownloadSpec, dest: &Path) -> Result<PathBuf, FetchError>;
}

/// Parse `reference` as an absolute URL, if it is one.
///
/// Any scheme is accepted as long as the URL can serve as a base for
/// relative includes. Single-letter schemes are left alone so Windows drive
/// paths stay paths.
pub fn parse_remote(reference: &str) -> Option<Url> {
    let url = Url::parse(reference).ok()?;
    (url.scheme().len() > 1 && !url.cannot_be_a_base()).then_some(url)
}
