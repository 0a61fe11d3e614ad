//! Staged archives and post-download file handling.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{UpdateError, UpdateResult};

/// An archive written to the working directory, ready for the host installer.
#[derive(Debug)]
pub struct StagedArchive {
    path: PathBuf,
}

impl StagedArchive {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Absolute path of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the archive, and its staging directory if that leaves it empty.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn cleanup(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }

        if let Some(parent) = self.path.parent() {
            remove_dir_if_empty(parent).await;
        }
    }
}

/// Remove `dir` if it has no entries. Failures are logged and ignored.
pub(crate) async fn remove_dir_if_empty(dir: &Path) {
    let is_empty = match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    };
    if !is_empty {
        return;
    }

    match tokio::fs::remove_dir(dir).await {
        Ok(()) => debug!("Removed empty directory {}", dir.display()),
        Err(e) => warn!("Failed to remove directory {}: {}", dir.display(), e),
    }
}

/// Give an unpacked source directory a stable name.
///
/// GitHub archives unpack into `<repo>-<ref>`; when the directory name
/// contains `repo` it is renamed to `<parent>/<repo>`. Anything else is
/// returned unchanged.
pub async fn normalize_source_dir(source: &Path, repo: &str) -> UpdateResult<PathBuf> {
    let Some(dir_name) = source.file_name().and_then(|n| n.to_str()) else {
        return Ok(source.to_path_buf());
    };
    if repo.is_empty() || !dir_name.contains(repo) || dir_name == repo {
        return Ok(source.to_path_buf());
    }

    let Some(parent) = source.parent() else {
        return Ok(source.to_path_buf());
    };
    let target = parent.join(repo);

    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        return Err(UpdateError::fs(
            &target,
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "destination directory already exists",
            ),
        ));
    }

    tokio::fs::rename(source, &target)
        .await
        .map_err(|e| UpdateError::fs(source, e))?;
    debug!("Renamed {} to {}", source.display(), target.display());
    Ok(target)
}
