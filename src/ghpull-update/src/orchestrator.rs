//! Update orchestrator - check, stage and install for one artifact kind.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::acquire::ArchiveAcquirer;
use crate::config::UpdaterConfig;
use crate::details::ArtifactDetails;
use crate::error::{UpdateError, UpdateResult};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::kind::{ArtifactHost, InstalledArtifact};
use crate::release::Release;
use crate::resolver::ReleaseResolver;
use crate::source::RepositoryRef;
use crate::version::is_update_available;

/// Where the orchestrator is in its most recent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Comparing,
    /// Installed version is current
    NoUpdate,
    Staging,
    Staged,
    Failed,
}

/// An available update, in the shape a host's update list expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDecision {
    pub slug: String,
    pub available: bool,
    pub new_version: String,
    /// Archive URL; resolved but not fetched
    pub package_url: String,
    /// Release page
    pub info_url: String,
}

/// Drives resolution, comparison and installation for one host.
///
/// Plugins and themes use the same type with different hosts.
pub struct UpdateOrchestrator<H: ArtifactHost> {
    host: H,
    resolver: ReleaseResolver,
    acquirer: ArchiveAcquirer,
    config: UpdaterConfig,
    phase: Mutex<Phase>,
}

impl<H: ArtifactHost> UpdateOrchestrator<H> {
    pub fn new(
        host: H,
        resolver: ReleaseResolver,
        acquirer: ArchiveAcquirer,
        config: UpdaterConfig,
    ) -> Self {
        Self {
            host,
            resolver,
            acquirer,
            config,
            phase: Mutex::new(Phase::Idle),
        }
    }

    /// Build an orchestrator with an [`HttpFetcher`] shared by the resolver
    /// and the acquirer.
    pub fn from_config(host: H, config: UpdaterConfig) -> UpdateResult<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::with_fetcher(host, fetcher, config))
    }

    /// Build an orchestrator around an existing fetcher.
    pub fn with_fetcher(host: H, fetcher: Arc<dyn Fetcher>, config: UpdaterConfig) -> Self {
        let resolver = ReleaseResolver::new(Arc::clone(&fetcher), &config);
        let acquirer = ArchiveAcquirer::new(fetcher, &config);
        Self::new(host, resolver, acquirer, config)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: Phase) {
        let mut current = self.phase.lock();
        if *current != phase {
            debug!("{} updater: {:?} -> {:?}", self.host.kind(), *current, phase);
            *current = phase;
        }
    }

    /// `repo` with the configured default token attached when it has none.
    pub fn effective_ref(&self, repo: &RepositoryRef) -> RepositoryRef {
        if repo.has_token() {
            return repo.clone();
        }
        repo.clone().with_token(self.config.default_token.as_deref())
    }

    /// Resolve the latest release of `repo`.
    pub async fn resolve_latest(&self, repo: &RepositoryRef) -> UpdateResult<Release> {
        self.set_phase(Phase::Resolving);
        match self.resolver.resolve(&self.effective_ref(repo)).await {
            Ok(release) => Ok(release),
            Err(e) => {
                self.set_phase(Phase::Failed);
                Err(e)
            }
        }
    }

    /// Decide whether `installed` should be updated from `repo`.
    ///
    /// Returns `Ok(None)` when there is no release or nothing newer. Never
    /// touches host state, so repeated calls give the same answer.
    pub async fn check_update(
        &self,
        repo: &RepositoryRef,
        installed: &InstalledArtifact,
    ) -> UpdateResult<Option<UpdateDecision>> {
        let release = self.resolve_latest(repo).await?;

        self.set_phase(Phase::Comparing);
        if release.is_empty() || !is_update_available(&installed.version, &release.tag_name) {
            self.set_phase(Phase::NoUpdate);
            return Ok(None);
        }

        self.set_phase(Phase::Staging);
        let decision = UpdateDecision {
            slug: installed.slug.clone(),
            available: true,
            new_version: release.tag_name.clone(),
            package_url: self.acquirer.download_url(&release),
            info_url: release.html_url.clone(),
        };
        info!(
            "{} {} can be updated from {} to {}",
            self.host.kind().label(),
            installed.slug,
            installed.version,
            decision.new_version
        );
        self.set_phase(Phase::Staged);
        Ok(Some(decision))
    }

    /// [`check_update`](Self::check_update) for a slug the host reports as
    /// installed. Unknown slugs have no update.
    pub async fn check_slug(
        &self,
        repo: &RepositoryRef,
        slug: &str,
    ) -> UpdateResult<Option<UpdateDecision>> {
        let Some(installed) = self.host.installed(slug) else {
            debug!("{} {} is not installed", self.host.kind().label(), slug);
            return Ok(None);
        };
        self.check_update(repo, &installed).await
    }

    /// Download the latest archive of `repo` and hand it to the host.
    ///
    /// The staged archive is removed afterwards whether or not the host
    /// installed it; the host's result is returned unchanged.
    pub async fn acquire_and_install(&self, repo: &RepositoryRef) -> UpdateResult<()> {
        let release = self.resolve_latest(repo).await?;

        self.set_phase(Phase::Staging);
        let work_dir = self.config.staging_dir();
        let archive = match self.acquirer.fetch_archive(&release, &work_dir).await {
            Ok(archive) => archive,
            Err(e) => {
                self.set_phase(Phase::Failed);
                return Err(e);
            }
        };
        info!("Staged {} at {}", repo, archive.path().display());

        let result = self.host.install(archive.path()).await;
        archive.cleanup().await;

        match &result {
            Ok(()) => self.set_phase(Phase::Staged),
            Err(e) => {
                warn!("Installing {} failed: {}", repo, e);
                self.set_phase(Phase::Failed);
            }
        }
        result
    }

    /// Information card for `slug`, backed by the latest release of `repo`.
    pub async fn details(&self, repo: &RepositoryRef, slug: &str) -> UpdateResult<ArtifactDetails> {
        let release = self.resolve_latest(repo).await?;
        let installed = self.host.installed(slug);

        let mut details = ArtifactDetails::new(
            self.host.kind(),
            slug,
            installed.as_ref(),
            repo,
            &release,
            self.config.web_base(),
            self.acquirer.download_url(&release),
        );
        details.readme = self.read_readme(slug).await;

        self.set_phase(Phase::Idle);
        Ok(details)
    }

    async fn read_readme(&self, slug: &str) -> Option<String> {
        let path = self.host.readme_path(slug)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                let err = UpdateError::fs(&path, e);
                warn!("Ignoring README: {}", err);
                None
            }
        }
    }
}
