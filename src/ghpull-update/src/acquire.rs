//! Archive download and staging.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::UpdaterConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::fetch::{Fetcher, redact_url};
use crate::install::{StagedArchive, remove_dir_if_empty};
use crate::release::{Release, default_file_name, file_name_from_url};

/// Permission bits of staged archives.
#[cfg(unix)]
const ARCHIVE_MODE: u32 = 0o644;

/// Downloads release archives into a working directory.
#[derive(Clone)]
pub struct ArchiveAcquirer {
    fetcher: Arc<dyn Fetcher>,
    web_base: String,
    default_branch: String,
}

impl ArchiveAcquirer {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &UpdaterConfig) -> Self {
        Self {
            fetcher,
            web_base: config.web_base().to_string(),
            default_branch: config.default_branch.clone(),
        }
    }

    /// The URL the archive of `release` is downloaded from.
    ///
    /// The attached asset wins; otherwise the source archive of the release
    /// tag, or of the default branch when no tag is known.
    pub fn download_url(&self, release: &Release) -> String {
        if let Some(url) = release.download_asset_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }

        let git_ref = if release.tag_name.is_empty() {
            self.default_branch.as_str()
        } else {
            release.tag_name.as_str()
        };
        format!(
            "{}/{}/{}/archive/{}.zip",
            self.web_base, release.owner, release.repo, git_ref
        )
    }

    /// Download the archive of `release` into its own directory under
    /// `work_dir`.
    ///
    /// The archive is always fetched fresh. Each call stages into a fresh
    /// subdirectory, so concurrent downloads never share files. Nothing is
    /// left behind when this fails.
    pub async fn fetch_archive(&self, release: &Release, work_dir: &Path) -> UpdateResult<StagedArchive> {
        let url = self.download_url(release);
        let file_name = staged_file_name(release, &url);

        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| UpdateError::fs(work_dir, e))?;
        let work_dir = tokio::fs::canonicalize(work_dir)
            .await
            .map_err(|e| UpdateError::fs(work_dir, e))?;

        let staging_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", release.repo))
            .tempdir_in(&work_dir)
            .map_err(|e| UpdateError::fs(&work_dir, e))?
            .keep();

        info!("Downloading {}", redact_url(&url));
        let body = match self.fetcher.get(&url, false).await {
            Ok(body) => body,
            Err(e) => {
                remove_dir_if_empty(&staging_dir).await;
                return Err(e);
            }
        };

        let dest = staging_dir.join(&file_name);
        let partial = staging_dir.join(format!(".{file_name}.part"));

        if let Err(e) = write_archive(&partial, &dest, &body).await {
            remove_quietly(&partial).await;
            remove_dir_if_empty(&staging_dir).await;
            return Err(e);
        }

        debug!("Staged {} bytes at {}", body.len(), dest.display());
        Ok(StagedArchive::new(dest))
    }
}

async fn write_archive(partial: &Path, dest: &Path, body: &[u8]) -> UpdateResult<()> {
    tokio::fs::write(partial, body)
        .await
        .map_err(|e| UpdateError::fs(partial, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(partial, std::fs::Permissions::from_mode(ARCHIVE_MODE))
            .await
            .map_err(|e| UpdateError::fs(partial, e))?;
    }

    tokio::fs::rename(partial, dest)
        .await
        .map_err(|e| UpdateError::fs(dest, e))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("Failed to remove partial download {}: {}", path.display(), e);
    }
}

/// File name the archive is written under: the release's file name reduced
/// to a single path component, then the URL basename, then `<repo>.zip`.
fn staged_file_name(release: &Release, url: &str) -> String {
    let from_release = Path::new(&release.download_file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| is_plain_file_name(n))
        .map(str::to_string);

    from_release
        .or_else(|| file_name_from_url(url).filter(|n| is_plain_file_name(n)))
        .unwrap_or_else(|| default_file_name(&release.repo))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpFetcher;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Notify;

    /// Fetcher whose GET waits until released.
    #[derive(Default)]
    struct GatedFetcher {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn get(&self, _url: &str, _use_cache: bool) -> UpdateResult<Bytes> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Bytes::from_static(b"gated"))
        }

        async fn post(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _body: &serde_json::Value,
        ) -> UpdateResult<Bytes> {
            unreachable!("archives are never posted")
        }
    }

    struct InstantFetcher;

    #[async_trait]
    impl Fetcher for InstantFetcher {
        async fn get(&self, _url: &str, _use_cache: bool) -> UpdateResult<Bytes> {
            Ok(Bytes::from_static(b"instant"))
        }

        async fn post(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _body: &serde_json::Value,
        ) -> UpdateResult<Bytes> {
            unreachable!("archives are never posted")
        }
    }

    fn acquirer() -> ArchiveAcquirer {
        let config = UpdaterConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        ArchiveAcquirer::new(fetcher, &config)
    }

    fn release() -> Release {
        Release {
            owner: "acme".to_string(),
            repo: "widget".to_string(),
            download_file_name: "widget.zip".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_asset_url_wins() {
        let release = Release {
            tag_name: "1.1.0".to_string(),
            download_asset_url: Some(
                "https://github.com/acme/widget/releases/download/1.1.0/widget-1.1.0.zip".to_string(),
            ),
            ..release()
        };
        assert_eq!(
            acquirer().download_url(&release),
            "https://github.com/acme/widget/releases/download/1.1.0/widget-1.1.0.zip"
        );
    }

    #[test]
    fn test_fallback_uses_tag() {
        let release = Release {
            tag_name: "v2.0.0".to_string(),
            ..release()
        };
        assert_eq!(
            acquirer().download_url(&release),
            "https://github.com/acme/widget/archive/v2.0.0.zip"
        );
    }

    #[test]
    fn test_fallback_uses_default_branch_without_tag() {
        assert_eq!(
            acquirer().download_url(&release()),
            "https://github.com/acme/widget/archive/master.zip"
        );
    }

    #[test]
    fn test_staged_file_name_strips_directories() {
        let release = Release {
            download_file_name: "../../etc/passwd".to_string(),
            ..release()
        };
        assert_eq!(staged_file_name(&release, "https://x/y.zip"), "passwd");

        let release = Release {
            download_file_name: "..".to_string(),
            ..self::release()
        };
        assert_eq!(staged_file_name(&release, "https://x/y.zip?sig=1"), "y.zip");

        let release = Release {
            download_file_name: String::new(),
            ..self::release()
        };
        assert_eq!(staged_file_name(&release, "https://x/"), "widget.zip");
    }

    #[tokio::test]
    async fn test_concurrent_downloads_do_not_share_staging() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("ghpull");
        let config = UpdaterConfig::default();

        let gated = Arc::new(GatedFetcher::default());
        let slow = ArchiveAcquirer::new(gated.clone(), &config);
        let slow_task = tokio::spawn({
            let work_dir = work_dir.clone();
            async move { slow.fetch_archive(&release(), &work_dir).await }
        });
        gated.entered.notified().await;

        let fast = ArchiveAcquirer::new(Arc::new(InstantFetcher), &config);
        let first = fast.fetch_archive(&release(), &work_dir).await.unwrap();
        assert_eq!(std::fs::read(first.path()).unwrap(), b"instant");
        first.cleanup().await;
        assert!(work_dir.exists());

        gated.release.notify_one();
        let second = slow_task.await.unwrap().unwrap();

        assert_eq!(second.path().file_name().unwrap(), "widget.zip");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"gated");

        let staging_dir = second.path().parent().unwrap().to_path_buf();
        second.cleanup().await;
        assert!(!staging_dir.exists());
        assert_eq!(std::fs::read_dir(&work_dir).unwrap().count(), 0);
    }
}
