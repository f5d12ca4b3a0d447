//! Version-control checkouts through the `git` executable.

use crate::FetchError;
use makespec_schema::{DownloadKind, DownloadSpec};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

fn run(binary: &str, args: &[&str], cwd: Option<&Path>, url: &str) -> Result<(), FetchError> {
    let mut cmd = Command::new(binary);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().map_err(|e| FetchError::Checkout {
        url: url.to_owned(),
        message: format!("failed to run {binary}: {e}"),
    })?;
    if !output.status.success() {
        return Err(FetchError::Checkout {
            url: url.to_owned(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(())
}

/// Manifest-supplied values must never reach git as options.
fn reject_option_like(field: &'static str, value: &str) -> Result<(), FetchError> {
    if value.starts_with('-') {
        return Err(FetchError::OptionLike {
            field,
            value: value.to_owned(),
        });
    }
    Ok(())
}

/// Clone `download` into `dest`, which must not exist yet.
///
/// A branch or tag is passed to `git clone --branch`; a revision is checked
/// out afterwards. An untyped download is treated as git.
pub fn checkout(binary: &str, download: &DownloadSpec, dest: &Path) -> Result<PathBuf, FetchError> {
    match &download.kind {
        None => {}
        Some(DownloadKind::Vcs { system }) if system == "git" => {}
        Some(DownloadKind::Vcs { system }) => {
            return Err(FetchError::UnsupportedVcs(system.clone()));
        }
        Some(DownloadKind::Url) => return Err(FetchError::UnsupportedVcs("file".to_owned())),
    }
    let url = download.url.as_deref().ok_or(FetchError::MissingUrl)?;
    reject_option_like("url", url)?;
    for (field, value) in [
        ("branch", &download.branch),
        ("tag", &download.tag),
        ("revision", &download.revision),
    ] {
        if let Some(value) = value {
            reject_option_like(field, value)?;
        }
    }
    let dest_arg = dest.to_string_lossy();

    let mut args = vec!["clone", "--quiet"];
    if let Some(reference) = download.branch.as_deref().or(download.tag.as_deref()) {
        args.extend(["--branch", reference]);
    }
    args.extend(["--", url, &*dest_arg]);
    debug!("git clone {url} into {}", dest.display());
    run(binary, &args, None, url)?;

    if let Some(revision) = download.revision.as_deref() {
        debug!("git checkout {revision}");
        run(binary, &["checkout", "--quiet", "--detach", revision], Some(dest), url)?;
    }
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_git_systems() {
        let download = DownloadSpec {
            kind: Some(DownloadKind::Vcs {
                system: "svn".to_owned(),
            }),
            url: Some("svn://example.com/repo".to_owned()),
            ..DownloadSpec::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = checkout("git", &download, &dir.path().join("co")).unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedVcs(ref s) if s == "svn"));
    }

    #[test]
    fn requires_a_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = checkout("git", &DownloadSpec::default(), &dir.path().join("co")).unwrap_err();
        assert!(matches!(err, FetchError::MissingUrl));
    }

    #[test]
    fn option_like_url_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = checkout("git", &DownloadSpec::from_url("--version"), &dir.path().join("co"))
            .unwrap_err();
        assert!(
            matches!(err, FetchError::OptionLike { field: "url", ref value } if value == "--version"),
            "{err}"
        );
    }

    #[test]
    fn option_like_refs_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut download = DownloadSpec::from_url("https://example.com/repo.git");
        download.revision = Some("--upload-pack=touch /tmp/x".to_owned());
        // The binary is never spawned, so a missing one proves the early refusal.
        let err = checkout("/nonexistent/makespec-test-git", &download, &dir.path().join("co"))
            .unwrap_err();
        assert!(matches!(err, FetchError::OptionLike { field: "revision", .. }), "{err}");

        download.revision = None;
        download.branch = Some("-b".to_owned());
        let err = checkout("/nonexistent/makespec-test-git", &download, &dir.path().join("co"))
            .unwrap_err();
        assert!(matches!(err, FetchError::OptionLike { field: "branch", .. }), "{err}");
    }

    #[test]
    fn missing_binary_is_a_checkout_error() {
        let dir = tempfile::tempdir().unwrap();
        let download = DownloadSpec::from_url("https://example.com/repo.git");
        let err = checkout(
            "/nonexistent/makespec-test-git",
            &download,
            &dir.path().join("co"),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Checkout { .. }));
    }
}
