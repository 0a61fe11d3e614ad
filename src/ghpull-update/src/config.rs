//! Updater configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{UpdateError, UpdateResult};
use crate::{DEFAULT_API_BASE, DEFAULT_WEB_BASE};

/// Which release API to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    /// REST without a token, GraphQL with one (default)
    #[default]
    Auto,
    /// Always the REST `releases/latest` endpoint
    Rest,
    /// Always the GraphQL endpoint (requires a token)
    Graphql,
}

impl ResolveStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Rest => "rest",
            Self::Graphql => "graphql",
        }
    }
}

impl std::fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration shared by the fetcher, resolver, acquirer and orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Base URL of the GitHub API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL of the GitHub web host (used for source archives)
    #[serde(default = "default_web_base")]
    pub web_base: String,

    /// Seconds a successful GET body stays cached (default: 300)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached bodies
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Branch used for source archives when no tag is known
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Release API selection
    #[serde(default)]
    pub strategy: ResolveStrategy,

    /// Accept plain `http` URLs (local mirrors and test servers only)
    #[serde(default)]
    pub allow_insecure_http: bool,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Directory archives are staged in before installation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    /// Token used for repositories that don't carry their own
    #[serde(default, skip_serializing)]
    pub default_token: Option<String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_web_base() -> String {
    DEFAULT_WEB_BASE.to_string()
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_cache_capacity() -> usize {
    64
}

fn default_request_timeout() -> u64 {
    30
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_user_agent() -> String {
    concat!("ghpull/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            web_base: default_web_base(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            request_timeout_secs: default_request_timeout(),
            default_branch: default_branch(),
            strategy: ResolveStrategy::Auto,
            allow_insecure_http: false,
            user_agent: default_user_agent(),
            work_dir: None,
            default_token: None,
        }
    }
}

impl UpdaterConfig {
    /// Path of the user config file (~/.ghpull/config.json).
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".ghpull").join("config.json"))
    }

    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config = Self::config_path()
            .filter(|p| p.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Ignoring config at {}: {}", path.display(), e);
                    None
                }
            });

        config.unwrap_or_default()
    }

    /// Load config from an explicit file.
    pub fn load_from(path: impl AsRef<Path>) -> UpdateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| UpdateError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| UpdateError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from environment variables.
    pub fn apply_env(mut self) -> Self {
        if let Ok(token) = std::env::var("GITHUB_ACCESS_TOKEN")
            && !token.trim().is_empty()
        {
            self.default_token = Some(token.trim().to_string());
        }

        if let Ok(base) = std::env::var("GHPULL_API_BASE") {
            self.api_base = base;
        }

        if let Ok(dir) = std::env::var("GHPULL_WORK_DIR") {
            self.work_dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Check that the configured base URLs parse.
    pub fn validate(&self) -> UpdateResult<()> {
        for (name, value) in [("api_base", &self.api_base), ("web_base", &self.web_base)] {
            url::Url::parse(value).map_err(|e| UpdateError::Config {
                message: format!("{name} '{value}' is not a valid URL: {e}"),
            })?;
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory archives are staged in.
    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ghpull"))
    }

    /// API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    /// Web base without a trailing slash.
    pub fn web_base(&self) -> &str {
        self.web_base.trim_end_matches('/')
    }
}
