//! What gets updated, and the host capabilities the orchestrator needs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UpdateResult;

/// Kind of installable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Plugin,
    Theme,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Theme => "theme",
        }
    }

    /// Capitalized name for messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Plugin => "Plugin",
            Self::Theme => "Theme",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plugin" => Ok(Self::Plugin),
            "theme" => Ok(Self::Theme),
            other => Err(format!("unknown artifact kind '{other}'")),
        }
    }
}

/// An installed plugin or theme as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledArtifact {
    pub slug: String,
    pub name: String,
    pub version: String,
}

/// Host capabilities for one artifact kind.
#[async_trait]
pub trait ArtifactHost: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    /// Look up an installed artifact by slug.
    fn installed(&self, slug: &str) -> Option<InstalledArtifact>;

    /// Location of the artifact's README, if the host knows one.
    fn readme_path(&self, slug: &str) -> Option<PathBuf>;

    /// Install the staged archive at `archive`.
    async fn install(&self, archive: &Path) -> UpdateResult<()>;
}
