//! Fetcher tests against a real HTTP server and a real git repository.

use makespec_remote::{DefaultFetcher, FetchConfig, FetchError, ManifestFetcher};
use makespec_schema::{DownloadKind, DownloadSpec};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tiny_http::{Response, Server};
use url::Url;

struct ManifestServer {
    url: String,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ManifestServer {
    fn start(files: &[(&str, &str)]) -> Self {
        let files: HashMap<String, String> = files
            .iter()
            .map(|(path, body)| ((*path).to_owned(), (*body).to_owned()))
            .collect();
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                let response = match files.get(request.url()) {
                    Some(body) => Response::from_string(body.clone()),
                    None if request.url() == "/broken" => {
                        Response::from_string("boom").with_status_code(500)
                    }
                    None => Response::from_string("not found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        Self {
            url: format!("http://127.0.0.1:{port}"),
            server,
            handle: Some(handle),
        }
    }

    fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{path}", self.url)).unwrap()
    }
}

impl Drop for ManifestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn fetcher() -> DefaultFetcher {
    DefaultFetcher::new(FetchConfig::default().with_timeout(5))
}

#[test]
fn reads_remote_manifest() {
    let server = ManifestServer::start(&[("/base.make.yml", "core: 8.x\napi: 2\n")]);
    let body = fetcher().read_remote(&server.url("/base.make.yml")).unwrap();
    assert_eq!(body, "core: 8.x\napi: 2\n");
}

#[test]
fn remote_404_is_not_found() {
    let server = ManifestServer::start(&[]);
    let err = fetcher().read_remote(&server.url("/missing.make")).unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[test]
fn remote_500_is_http_error() {
    let server = ManifestServer::start(&[]);
    let err = fetcher().read_remote(&server.url("/broken")).unwrap_err();
    assert!(matches!(err, FetchError::Http(ref m) if m.contains("500")), "{err}");
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=makespec", "-c", "user.email=makespec@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// Repository with `site.make.yml` on a `release` branch only.
fn make_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    std::fs::write(dir.join("README"), "base\n").unwrap();
    git(dir, &["add", "README"]);
    git(dir, &["commit", "-q", "-m", "base"]);
    git(dir, &["checkout", "-q", "-b", "release"]);
    std::fs::write(dir.join("site.make.yml"), "core: 8.x\n").unwrap();
    git(dir, &["add", "site.make.yml"]);
    git(dir, &["commit", "-q", "-m", "site"]);
}

#[test]
fn checks_out_git_branch() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = tempfile::tempdir().unwrap();
    make_repo(repo.path());

    let staging = tempfile::tempdir().unwrap();
    let download = DownloadSpec {
        kind: Some(DownloadKind::Vcs {
            system: "git".to_owned(),
        }),
        url: Some(repo.path().to_string_lossy().into_owned()),
        branch: Some("release".to_owned()),
        ..DownloadSpec::default()
    };
    let root = fetcher()
        .checkout(&download, &staging.path().join("checkout"))
        .unwrap();
    let text = std::fs::read_to_string(root.join("site.make.yml")).unwrap();
    assert_eq!(text, "core: 8.x\n");
}

#[test]
fn unknown_branch_fails_checkout() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = tempfile::tempdir().unwrap();
    make_repo(repo.path());

    let staging = tempfile::tempdir().unwrap();
    let mut download = DownloadSpec::from_url(repo.path().to_string_lossy());
    download.branch = Some("no-such-branch".to_owned());
    let err = fetcher()
        .checkout(&download, &staging.path().join("checkout"))
        .unwrap_err();
    assert!(matches!(err, FetchError::Checkout { .. }), "{err}");
}
