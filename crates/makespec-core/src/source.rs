use crate::CoreError;
use makespec_remote::parse_remote;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// Source argument meaning "read the manifest from standard input".
pub const STDIN_SENTINEL: &str = "-";

/// Where the top-level manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Path(PathBuf),
    Stdin,
    /// A remote manifest; `payload` holds its text when already fetched.
    Remote { url: Url, payload: Option<String> },
}

impl ManifestSource {
    /// Interpret a command-line source argument.
    pub fn from_arg(arg: &str) -> Self {
        if arg == STDIN_SENTINEL {
            return ManifestSource::Stdin;
        }
        match parse_remote(arg) {
            Some(url) => ManifestSource::Remote { url, payload: None },
            None => ManifestSource::Path(PathBuf::from(arg)),
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::Path(path) => write!(f, "{}", path.display()),
            ManifestSource::Stdin => f.write_str("<stdin>"),
            ManifestSource::Remote { url, .. } => write!(f, "{url}"),
        }
    }
}

/// Canonical location of a loaded manifest, used to resolve relative
/// includes and to detect include cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    File(PathBuf),
    Remote(Url),
    Stdin,
}

impl Location {
    pub fn file(path: &Path) -> Self {
        Location::File(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{url}"),
            Location::Stdin => f.write_str("<stdin>"),
        }
    }
}

/// Read a whole manifest from `reader`; zero bytes is [`CoreError::NoInput`].
pub fn read_input(mut reader: impl Read) -> Result<String, CoreError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    if text.is_empty() {
        return Err(CoreError::NoInput);
    }
    Ok(text)
}
