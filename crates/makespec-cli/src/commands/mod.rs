pub mod completions;
pub mod convert;
pub mod resolve;
pub mod validate;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use makespec_core::{ManifestSource, OverridePolicy, Resolution, Resolver, ResolverConfig};
use makespec_remote::DefaultFetcher;
use makespec_schema::PruneSet;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::CliConfig;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_FETCH_ERROR: u8 = 3;

/// Options shared by every command that resolves a manifest.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Manifest path, absolute URL, or `-` for standard input.
    pub source: String,
    /// Keep only these projects (comma-separated, `*` for all).
    #[arg(long, value_delimiter = ',')]
    pub projects: Vec<String>,
    /// Keep only these libraries (comma-separated, `*` for all).
    #[arg(long, value_delimiter = ',')]
    pub libraries: Vec<String>,
    /// Downgrade version and pruning failures to warnings.
    #[arg(long, default_value_t = false)]
    pub force: bool,
    /// Keep the temporary checkout directory and print its path.
    #[arg(long, default_value_t = false)]
    pub keep_temp: bool,
    /// Top-level keys overrides may replace: `all`, `none` or a list.
    #[arg(long)]
    pub allow_override: Option<String>,
}

impl SourceArgs {
    pub fn manifest_source(&self) -> ManifestSource {
        ManifestSource::from_arg(&self.source)
    }

    /// `None` unless a project or library filter was given.
    pub fn prune_set(&self) -> Option<PruneSet> {
        if self.projects.is_empty() && self.libraries.is_empty() {
            return None;
        }
        Some(PruneSet::new(
            self.projects.iter().map(|s| s.trim().to_owned()),
            self.libraries.iter().map(|s| s.trim().to_owned()),
        ))
    }

    /// Layer these flags over the configured resolver settings.
    pub fn resolver_config(&self, config: &CliConfig) -> Result<ResolverConfig, String> {
        let mut resolver = config.resolver_config()?;
        resolver.force |= self.force;
        resolver.keep_temp |= self.keep_temp;
        if let Some(policy) = &self.allow_override {
            resolver.override_policy = policy.parse::<OverridePolicy>()?;
        }
        Ok(resolver)
    }

    pub fn resolver(&self, config: &CliConfig) -> Result<Resolver, String> {
        let settings = self.resolver_config(config)?;
        debug!(
            "resolver: api {}, force {}, keep_temp {}, overrides {}",
            settings.api_version, settings.force, settings.keep_temp, settings.override_policy
        );
        Ok(Resolver::new(
            settings,
            DefaultFetcher::new(config.fetch.clone()),
        ))
    }

    /// Resolve behind a spinner, reporting a kept staging directory.
    pub fn resolve(&self, config: &CliConfig) -> Result<Resolution, String> {
        let resolver = self.resolver(config)?;
        let source = self.manifest_source();
        let pb = spinner(&format!("resolving {source}…"));
        let resolution = resolver
            .resolve(&source, self.prune_set().as_ref())
            .map_err(|e| {
                spin_fail(&pb, "resolution failed");
                e.to_string()
            })?;
        spin_ok(&pb, "manifest resolved");
        report_kept_dir(&resolution);
        Ok(resolution)
    }
}

pub fn report_kept_dir(resolution: &Resolution) {
    if let Some(dir) = &resolution.kept_temp_dir {
        eprintln!("kept temporary directory: {}", dir.display());
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Write `text` to `path`, or to stdout when no path is given.
pub fn write_output(path: Option<&Path>, text: &str) -> Result<(), String> {
    let mut text = text.to_owned();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    match path {
        Some(path) => std::fs::write(path, text)
            .map_err(|e| format!("failed to write {}: {e}", path.display())),
        None => std::io::stdout()
            .write_all(text.as_bytes())
            .map_err(|e| format!("failed to write output: {e}")),
    }
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "ok" => Style::new().green().apply_to(status).to_string(),
        "invalid" => Style::new().red().bold().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(source: &str) -> SourceArgs {
        SourceArgs {
            source: source.to_owned(),
            projects: Vec::new(),
            libraries: Vec::new(),
            force: false,
            keep_temp: false,
            allow_override: None,
        }
    }

    #[test]
    fn json_pretty_serializes_map() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn no_filters_means_no_pruning() {
        assert!(args("site.make").prune_set().is_none());
    }

    #[test]
    fn filters_build_a_prune_set() {
        let mut a = args("site.make");
        a.projects = vec!["views".to_owned(), " token".to_owned()];
        let set = a.prune_set().unwrap();
        assert!(set.projects.contains("token"));
        assert!(set.libraries.is_empty());
    }

    #[test]
    fn flags_layer_over_config() {
        let mut config = CliConfig::default();
        config.resolver.keep_temp = true;
        let mut a = args("site.make");
        a.force = true;
        a.allow_override = Some("none".to_owned());
        let resolver = a.resolver_config(&config).unwrap();
        assert!(resolver.force);
        assert!(resolver.keep_temp);
        assert_eq!(resolver.override_policy, OverridePolicy::None);
    }

    #[test]
    fn dash_reads_stdin() {
        assert_eq!(args("-").manifest_source(), ManifestSource::Stdin);
    }

    #[test]
    fn write_output_appends_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_output(Some(&path), "{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn colorize_status_keeps_text() {
        assert!(colorize_status("ok").contains("ok"));
        assert!(colorize_status("invalid").contains("invalid"));
        assert_eq!(colorize_status("other"), "other");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_MANIFEST_ERROR);
        assert_ne!(EXIT_MANIFEST_ERROR, EXIT_FETCH_ERROR);
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        assert!(pb.is_finished());
    }
}
