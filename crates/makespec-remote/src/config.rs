use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for HTTP reads and version-control checkouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout for HTTP reads, in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Executable used for `git` checkouts.
    pub git_binary: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("makespec/{}", env!("CARGO_PKG_VERSION")),
            git_binary: "git".to_owned(),
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_git_binary(mut self, binary: &str) -> Self {
        binary.clone_into(&mut self.git_binary);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: FetchConfig = toml::from_str("timeout_secs = 5").unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.git_binary, "git");
        assert!(config.user_agent.starts_with("makespec/"));
    }

    #[test]
    fn builders_override_defaults() {
        let config = FetchConfig::default()
            .with_timeout(1)
            .with_git_binary("/usr/local/bin/git");
        assert_eq!(config.timeout_secs, 1);
        assert_eq!(config.git_binary, "/usr/local/bin/git");
    }
}
