use makespec_core::{OverridePolicy, ResolverConfig};
use makespec_remote::FetchConfig;
use makespec_schema::SUPPORTED_API_VERSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings read from `~/.config/makespec/config.toml`.
///
/// Every field is optional in the file; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub resolver: ResolverSettings,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub api_version: u32,
    pub force: bool,
    pub keep_temp: bool,
    /// `all`, `none` or a comma-separated list of top-level keys.
    pub allow_override: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            api_version: SUPPORTED_API_VERSION,
            force: false,
            keep_temp: false,
            allow_override: OverridePolicy::All.to_string(),
        }
    }
}

impl CliConfig {
    /// Load the per-user file, falling back to defaults when it is absent.
    pub fn load_default() -> Result<Self, String> {
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| format!("invalid config {}: {e}", path.display()))
    }

    pub fn resolver_config(&self) -> Result<ResolverConfig, String> {
        Ok(ResolverConfig {
            api_version: self.resolver.api_version,
            force: self.resolver.force,
            keep_temp: self.resolver.keep_temp,
            override_policy: self.resolver.allow_override.parse()?,
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/makespec/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.resolver_config().unwrap(), ResolverConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[resolver]\nforce = true\nallow_override = \"core,projects\"\n\n[fetch]\ntimeout_secs = 5\n",
        )
        .unwrap();
        let config = CliConfig::load(&path).unwrap();
        assert!(config.resolver.force);
        assert_eq!(config.resolver.api_version, SUPPORTED_API_VERSION);
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.git_binary, "git");

        let resolver = config.resolver_config().unwrap();
        assert!(resolver.override_policy.allows("core"));
        assert!(!resolver.override_policy.allows("libraries"));
    }

    #[test]
    fn serialized_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml::to_string_pretty(&CliConfig::default()).unwrap()).unwrap();
        assert_eq!(CliConfig::load(&path).unwrap(), CliConfig::default());
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resolver\n").unwrap();
        let err = CliConfig::load(&path).unwrap_err();
        assert!(err.starts_with("invalid config"), "{err}");
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.starts_with("failed to read config"), "{err}");
    }
}
