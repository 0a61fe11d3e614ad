//! Artifact host that installs archives by copying them into a directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ghpull_update::{ArtifactHost, ArtifactKind, InstalledArtifact, UpdateError, UpdateResult};
use tracing::info;

pub struct DirectoryHost {
    kind: ArtifactKind,
    dest: PathBuf,
    installed: Option<InstalledArtifact>,
}

impl DirectoryHost {
    pub fn new(kind: ArtifactKind, dest: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            dest: dest.into(),
            installed: None,
        }
    }

    /// Report `artifact` as installed.
    pub fn with_installed(mut self, artifact: InstalledArtifact) -> Self {
        self.installed = Some(artifact);
        self
    }
}

#[async_trait]
impl ArtifactHost for DirectoryHost {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn installed(&self, slug: &str) -> Option<InstalledArtifact> {
        self.installed.clone().filter(|a| a.slug == slug)
    }

    fn readme_path(&self, slug: &str) -> Option<PathBuf> {
        // Plugin slugs are `<dir>/<main file>`, theme slugs are the directory.
        let dir = match self.kind {
            ArtifactKind::Plugin => Path::new(slug).parent()?,
            ArtifactKind::Theme => Path::new(slug),
        };
        Some(self.dest.join(dir).join("README.md"))
    }

    async fn install(&self, archive: &Path) -> UpdateResult<()> {
        let file_name = archive.file_name().ok_or_else(|| UpdateError::InstallFailed {
            message: format!("{} has no file name", archive.display()),
        })?;

        tokio::fs::create_dir_all(&self.dest)
            .await
            .map_err(|e| UpdateError::fs(&self.dest, e))?;

        let target = self.dest.join(file_name);
        tokio::fs::copy(archive, &target)
            .await
            .map_err(|e| UpdateError::fs(&target, e))?;

        info!("Copied {} {} to {}", self.kind, file_name.to_string_lossy(), target.display());
        Ok(())
    }
}
