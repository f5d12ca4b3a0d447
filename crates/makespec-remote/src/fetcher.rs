use crate::http::HttpClient;
use crate::{git, FetchConfig, FetchError, ManifestFetcher};
use makespec_schema::DownloadSpec;
use std::path::{Path, PathBuf};
use url::Url;

/// Fetcher backed by the filesystem, `ureq` and the `git` executable.
pub struct DefaultFetcher {
    config: FetchConfig,
    http: HttpClient,
}

impl DefaultFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let http = HttpClient::new(&config);
        Self { config, http }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new(FetchConfig::default())
    }
}

impl ManifestFetcher for DefaultFetcher {
    fn read_local(&self, path: &Path) -> Result<String, FetchError> {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(path.display().to_string())
            } else {
                FetchError::Io(e)
            }
        })
    }

    fn read_remote(&self, url: &Url) -> Result<String, FetchError> {
        match url.scheme() {
            "http" | "https" => self.http.get_text(url),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| FetchError::UnsupportedScheme(url.to_string()))?;
                self.read_local(&path)
            }
            other => Err(FetchError::UnsupportedScheme(other.to_owned())),
        }
    }

    fn checkout(&self, download: &DownloadSpec, dest: &Path) -> Result<PathBuf, FetchError> {
        git::checkout(&self.config.git_binary, download, dest)
    }
}
