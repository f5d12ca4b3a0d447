use std::io;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Supplies the scratch directory that version-control includes are
/// checked out into.
pub trait TempDirProvider: Send + Sync {
    fn acquire(&self) -> io::Result<TempDir>;
}

/// Creates `makespec-*` directories under the system temp dir.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTempDir;

impl TempDirProvider for SystemTempDir {
    fn acquire(&self) -> io::Result<TempDir> {
        tempfile::Builder::new().prefix("makespec-").tempdir()
    }
}

/// One resolve call's staging area, created on first use.
pub(crate) struct Staging<'a> {
    provider: &'a dyn TempDirProvider,
    dir: Option<TempDir>,
    next: usize,
}

impl<'a> Staging<'a> {
    pub(crate) fn new(provider: &'a dyn TempDirProvider) -> Self {
        Self {
            provider,
            dir: None,
            next: 0,
        }
    }

    /// A fresh, not yet existing path inside the staging directory.
    pub(crate) fn next_path(&mut self) -> io::Result<PathBuf> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                let dir = self.provider.acquire()?;
                debug!("staging includes in {}", dir.path().display());
                dir
            }
        };
        let path = dir.path().join(format!("include-{}", self.next));
        self.dir = Some(dir);
        self.next += 1;
        Ok(path)
    }

    /// Remove the staging directory, or keep it and return its path.
    pub(crate) fn finish(self, keep: bool) -> Option<PathBuf> {
        let dir = self.dir?;
        if keep {
            let path = dir.keep();
            warn!("keeping temporary directory {}", path.display());
            Some(path)
        } else {
            debug!("removing temporary directory {}", dir.path().display());
            None
        }
    }
}
